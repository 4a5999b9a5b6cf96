//! Historical rate series for charting

use crate::core::currency::CurrencyPair;
use crate::core::error::RateError;
use crate::core::history::percent_change;
use crate::core::quote::{DateRange, HistoricalPoint, RateClient};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Default)]
pub enum ChartPeriod {
    #[default]
    SevenDays,
    FifteenDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
}

impl Display for ChartPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ChartPeriod::SevenDays => "7D",
                ChartPeriod::FifteenDays => "15D",
                ChartPeriod::OneMonth => "1M",
                ChartPeriod::ThreeMonths => "3M",
                ChartPeriod::SixMonths => "6M",
            }
        )
    }
}

impl ChartPeriod {
    pub fn days(&self) -> i64 {
        match self {
            ChartPeriod::SevenDays => 7,
            ChartPeriod::FifteenDays => 15,
            ChartPeriod::OneMonth => 30,
            ChartPeriod::ThreeMonths => 90,
            ChartPeriod::SixMonths => 180,
        }
    }

    /// The range ending at `today` and reaching back `days()` days.
    pub fn range_ending(&self, today: NaiveDate) -> DateRange {
        DateRange {
            start: today - Duration::days(self.days()),
            end: today,
        }
    }
}

impl FromStr for ChartPeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "7D" | "7" => Ok(ChartPeriod::SevenDays),
            "15D" | "15" => Ok(ChartPeriod::FifteenDays),
            "1M" | "30" => Ok(ChartPeriod::OneMonth),
            "3M" | "90" => Ok(ChartPeriod::ThreeMonths),
            "6M" | "180" => Ok(ChartPeriod::SixMonths),
            _ => Err(anyhow::anyhow!("Invalid chart period: {}", s)),
        }
    }
}

/// A series sorted ascending by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSeries {
    pub pair: CurrencyPair,
    points: Vec<HistoricalPoint>,
}

impl RateSeries {
    /// Providers do not guarantee order, so points are sorted here.
    pub fn new(pair: CurrencyPair, mut points: Vec<HistoricalPoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self { pair, points }
    }

    pub fn points(&self) -> &[HistoricalPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&HistoricalPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&HistoricalPoint> {
        self.points.last()
    }

    pub fn min(&self) -> Option<Decimal> {
        self.points.iter().map(|p| p.bid).min()
    }

    pub fn max(&self) -> Option<Decimal> {
        self.points.iter().map(|p| p.bid).max()
    }

    /// Percent change of the last point against the first.
    pub fn change_pct(&self) -> Option<Decimal> {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) if self.points.len() > 1 => {
                Some(percent_change(first.bid, last.bid))
            }
            _ => None,
        }
    }
}

pub async fn fetch_series(
    client: &dyn RateClient,
    pair: &CurrencyPair,
    period: ChartPeriod,
    today: NaiveDate,
) -> Result<RateSeries, RateError> {
    if pair.is_identity() {
        return Err(RateError::Validation(
            "Select two different currencies to compare".to_string(),
        ));
    }
    let points = client.fetch_history(pair, period.range_ending(today)).await?;
    Ok(RateSeries::new(pair.clone(), points))
}
