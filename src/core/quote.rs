//! Quote types and the rate client abstraction

use crate::core::currency::{CurrencyCode, CurrencyPair};
use crate::core::error::RateError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A normalized provider quote. Immutable once built by a `RateClient`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub pair: CurrencyPair,
    pub bid: Decimal,
    pub ask: Option<Decimal>,
    /// Percent change computed by the provider, when it supplies one.
    pub pct_change: Option<Decimal>,
    pub name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// The quote for converting a currency into itself.
    pub fn identity(pair: CurrencyPair, timestamp: DateTime<Utc>) -> Self {
        Self {
            pair,
            bid: Decimal::ONE,
            ask: Some(Decimal::ONE),
            pct_change: Some(Decimal::ZERO),
            name: None,
            timestamp,
        }
    }
}

/// One point of a historical series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub timestamp: DateTime<Utc>,
    pub bid: Decimal,
}

/// Inclusive date range for historical requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[async_trait]
pub trait RateClient: Send + Sync {
    /// Fetches every pair in one request. Pairs the provider did not return are absent.
    async fn fetch_pairs(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<HashMap<CurrencyPair, Quote>, RateError>;

    /// Fetches the series for `pair` in `range`, sorted ascending by timestamp.
    async fn fetch_history(
        &self,
        pair: &CurrencyPair,
        range: DateRange,
    ) -> Result<Vec<HistoricalPoint>, RateError>;

    async fn fetch_quote(
        &self,
        base: &CurrencyCode,
        target: &CurrencyCode,
    ) -> Result<Quote, RateError> {
        let pair = CurrencyPair::new(base.clone(), target.clone());
        let mut quotes = self.fetch_pairs(std::slice::from_ref(&pair)).await?;
        quotes
            .remove(&pair)
            .ok_or_else(|| RateError::Parse(format!("Response is missing pair {}", pair.key())))
    }

    /// Fetches `base` against each of `targets`, keyed by target. Identity targets are skipped.
    async fn fetch_quotes(
        &self,
        base: &CurrencyCode,
        targets: &[CurrencyCode],
    ) -> Result<HashMap<CurrencyCode, Quote>, RateError> {
        let pairs: Vec<CurrencyPair> = targets
            .iter()
            .filter(|t| *t != base)
            .map(|t| CurrencyPair::new(base.clone(), t.clone()))
            .collect();
        if pairs.is_empty() {
            return Ok(HashMap::new());
        }
        let quotes = self.fetch_pairs(&pairs).await?;
        Ok(quotes
            .into_iter()
            .map(|(pair, quote)| (pair.target, quote))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::code;
    use std::sync::Mutex;

    /// Answers from a fixed table and records the requested batches.
    struct TableClient {
        rates: HashMap<String, Decimal>,
        requests: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl RateClient for TableClient {
        async fn fetch_pairs(
            &self,
            pairs: &[CurrencyPair],
        ) -> Result<HashMap<CurrencyPair, Quote>, RateError> {
            self.requests
                .lock()
                .unwrap()
                .push(pairs.iter().map(|p| p.key()).collect());
            Ok(pairs
                .iter()
                .filter_map(|p| {
                    self.rates.get(&p.key()).map(|bid| {
                        (
                            p.clone(),
                            Quote {
                                pair: p.clone(),
                                bid: *bid,
                                ask: None,
                                pct_change: None,
                                name: None,
                                timestamp: Utc::now(),
                            },
                        )
                    })
                })
                .collect())
        }

        async fn fetch_history(
            &self,
            _pair: &CurrencyPair,
            _range: DateRange,
        ) -> Result<Vec<HistoricalPoint>, RateError> {
            Ok(Vec::new())
        }
    }

    fn table_client() -> TableClient {
        TableClient {
            rates: HashMap::from([
                ("USDBRL".to_string(), Decimal::new(50, 1)),
                ("USDEUR".to_string(), Decimal::new(92, 2)),
            ]),
            requests: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_fetch_quote_reports_missing_pair_as_parse_error() {
        let client = table_client();
        let quote = client.fetch_quote(&code("USD"), &code("BRL")).await.unwrap();
        assert_eq!(quote.bid, Decimal::new(5, 0));

        let err = client
            .fetch_quote(&code("USD"), &code("JPY"))
            .await
            .unwrap_err();
        assert_eq!(err, RateError::Parse("Response is missing pair USDJPY".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_quotes_skips_base_and_batches() {
        let client = table_client();
        let quotes = client
            .fetch_quotes(&code("USD"), &[code("USD"), code("BRL"), code("EUR"), code("JPY")])
            .await
            .unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[&code("EUR")].bid, Decimal::new(92, 2));
        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0], vec!["USDBRL", "USDEUR", "USDJPY"]);
    }

    #[tokio::test]
    async fn test_fetch_quotes_with_only_base_makes_no_request() {
        let client = table_client();
        let quotes = client.fetch_quotes(&code("USD"), &[code("USD")]).await.unwrap();
        assert!(quotes.is_empty());
        assert!(client.requests.lock().unwrap().is_empty());
    }
}
