//! Most-traded currencies against a single quote currency, refreshed periodically

use crate::core::config::AppConfig;
use crate::core::currency::{CurrencyCode, CurrencyPair};
use crate::core::error::RateError;
use crate::core::history::QuoteHistory;
use crate::core::quote::RateClient;
use crate::core::state::Phase;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankingOrder {
    /// Configured order.
    #[default]
    Fixed,
    /// Largest percent change first.
    Change,
    /// Highest value first.
    Value,
}

impl Display for RankingOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RankingOrder::Fixed => "fixed",
            RankingOrder::Change => "change",
            RankingOrder::Value => "value",
        })
    }
}

impl FromStr for RankingOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(RankingOrder::Fixed),
            "change" => Ok(RankingOrder::Change),
            "value" => Ok(RankingOrder::Value),
            _ => Err(anyhow::anyhow!("Invalid ranking order: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingSettings {
    pub quote_currency: CurrencyCode,
    pub currencies: Vec<CurrencyCode>,
    pub refresh: Duration,
    pub order: RankingOrder,
    pub history_capacity: usize,
}

impl RankingSettings {
    pub fn from_config(config: &AppConfig, order: RankingOrder) -> Self {
        Self {
            quote_currency: config.ranking.quote_currency.clone(),
            currencies: config.ranking.currencies.clone(),
            refresh: config.ranking_refresh(),
            order,
            history_capacity: config.converter.history_capacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingRow {
    pub position: usize,
    pub currency: CurrencyCode,
    /// Ask price in the quote currency, or the bid when no ask is quoted.
    pub value: Option<Decimal>,
    pub percent_change: Option<Decimal>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingSnapshot {
    pub quote_currency: CurrencyCode,
    pub rows: Vec<RankingRow>,
    pub last_updated: Option<DateTime<Utc>>,
}

pub type RankingState = Phase<RankingSnapshot>;

pub struct RankingBoard {
    client: Arc<dyn RateClient>,
    settings: RankingSettings,
    history: QuoteHistory,
}

impl RankingBoard {
    pub fn new(client: Arc<dyn RateClient>, settings: RankingSettings) -> Self {
        let history = QuoteHistory::new(settings.history_capacity);
        Self {
            client,
            settings,
            history,
        }
    }

    pub fn settings(&self) -> &RankingSettings {
        &self.settings
    }

    /// Fetches every ranked currency in one request and rebuilds the rows.
    pub async fn refresh(&mut self) -> Result<RankingSnapshot, RateError> {
        let quote_currency = &self.settings.quote_currency;
        let pairs: Vec<CurrencyPair> = self
            .settings
            .currencies
            .iter()
            .filter(|c| *c != quote_currency)
            .map(|c| CurrencyPair::new(c.clone(), quote_currency.clone()))
            .collect();

        let quotes = self.client.fetch_pairs(&pairs).await?;

        let mut rows: Vec<RankingRow> = pairs
            .iter()
            .map(|pair| match quotes.get(pair) {
                Some(quote) => {
                    let value = quote.ask.unwrap_or(quote.bid);
                    let computed = self.history.record(&pair.key(), value, quote.timestamp);
                    RankingRow {
                        position: 0,
                        currency: pair.base.clone(),
                        value: Some(value),
                        percent_change: Some(quote.pct_change.unwrap_or(computed)),
                        updated_at: Some(quote.timestamp),
                    }
                }
                None => RankingRow {
                    position: 0,
                    currency: pair.base.clone(),
                    value: None,
                    percent_change: None,
                    updated_at: None,
                },
            })
            .collect();

        sort_rows(&mut rows, self.settings.order);
        for (i, row) in rows.iter_mut().enumerate() {
            row.position = i + 1;
        }

        let last_updated = rows.iter().filter_map(|r| r.updated_at).max();
        debug!(rows = rows.len(), quoted = quotes.len(), "Refreshed ranking");
        Ok(RankingSnapshot {
            quote_currency: quote_currency.clone(),
            rows,
            last_updated,
        })
    }
}

/// Descending by the chosen key; rows without a value go last. Stable for ties.
fn sort_rows(rows: &mut [RankingRow], order: RankingOrder) {
    if order == RankingOrder::Fixed {
        return;
    }
    let key = |row: &RankingRow| match order {
        RankingOrder::Fixed => None,
        RankingOrder::Change => row.percent_change,
        RankingOrder::Value => row.value,
    };
    rows.sort_by(|a, b| match (key(a), key(b)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Refreshes a board on its interval in a background task and publishes each outcome.
pub struct RankingFeed {
    state: watch::Receiver<RankingState>,
    task: JoinHandle<()>,
}

impl RankingFeed {
    /// Starts refreshing immediately, then once per `refresh` interval.
    pub fn spawn(mut board: RankingBoard) -> Self {
        let (tx, rx) = watch::channel(Phase::Idle);
        let refresh = board.settings().refresh;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(refresh);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tx.send_replace(Phase::Loading);
                let next = match board.refresh().await {
                    Ok(snapshot) => Phase::Ready(snapshot),
                    Err(e) => {
                        warn!(error = %e, "Ranking refresh failed");
                        Phase::Failed(e)
                    }
                };
                tx.send_replace(next);
            }
        });
        info!(every = ?refresh, "Ranking feed started");

        Self { state: rx, task }
    }

    pub fn subscribe(&self) -> watch::Receiver<RankingState> {
        self.state.clone()
    }

    pub fn state(&self) -> RankingState {
        self.state.borrow().clone()
    }

    pub fn dispose(&self) {
        self.task.abort();
    }
}

impl Drop for RankingFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}
