//! Rates of one base currency against every other supported currency

use crate::core::catalog;
use crate::core::currency::{CurrencyCode, CurrencySet};
use crate::core::error::RateError;
use crate::core::quote::RateClient;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct LookupRow {
    pub currency: CurrencyCode,
    pub name: String,
    pub bid: Decimal,
    pub pct_change: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyOverview {
    pub base: CurrencyCode,
    pub name: String,
    pub summary: Option<String>,
    pub rows: Vec<LookupRow>,
}

/// Fetches `base` against the rest of `supported` in one request.
/// Rows follow the set order; pairs the provider omitted are skipped.
pub async fn lookup(
    client: &dyn RateClient,
    base: &CurrencyCode,
    supported: &CurrencySet,
) -> Result<CurrencyOverview, RateError> {
    let targets = supported.others(base);
    let mut quotes = client.fetch_quotes(base, &targets).await?;

    let rows: Vec<LookupRow> = targets
        .iter()
        .filter_map(|target| {
            quotes.remove(target).map(|quote| LookupRow {
                currency: target.clone(),
                name: catalog::display_name(target),
                bid: quote.bid,
                pct_change: quote.pct_change,
                updated_at: quote.timestamp,
            })
        })
        .collect();
    debug!(base = %base, rows = rows.len(), requested = targets.len(), "Built overview");

    let info = catalog::describe(base);
    Ok(CurrencyOverview {
        base: base.clone(),
        name: catalog::display_name(base),
        summary: info.map(|i| i.summary.to_string()),
        rows,
    })
}
