use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::core::config::{AwesomeApiConfig, SameCurrencyPolicy};
use crate::core::currency::CurrencyPair;
use crate::core::error::RateError;
use crate::core::quote::{DateRange, HistoricalPoint, Quote, RateClient};

/// Fields arrive as decimal strings on most endpoints and as numbers on some.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Number(serde_json::Number),
}

impl StringOrNumber {
    fn to_decimal(&self) -> Option<Decimal> {
        let raw = match self {
            StringOrNumber::Text(s) => s.trim().to_string(),
            StringOrNumber::Number(n) => n.to_string(),
        };
        Decimal::from_str(&raw)
            .or_else(|_| Decimal::from_scientific(&raw))
            .ok()
    }

    fn to_epoch(&self) -> Option<DateTime<Utc>> {
        let secs = match self {
            StringOrNumber::Text(s) => s.trim().parse::<i64>().ok()?,
            StringOrNumber::Number(n) => n.as_i64()?,
        };
        Utc.timestamp_opt(secs, 0).single()
    }
}

#[derive(Deserialize, Debug)]
struct RawQuote {
    bid: StringOrNumber,
    ask: Option<StringOrNumber>,
    #[serde(rename = "pctChange")]
    pct_change: Option<StringOrNumber>,
    name: Option<String>,
    timestamp: Option<StringOrNumber>,
    create_date: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawPoint {
    bid: StringOrNumber,
    timestamp: StringOrNumber,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    message: Option<String>,
}

fn normalize_quote(pair: &CurrencyPair, raw: RawQuote) -> Result<Quote, RateError> {
    let key = pair.key();
    let bid = raw
        .bid
        .to_decimal()
        .ok_or_else(|| RateError::Parse(format!("Invalid bid for {key}")))?;
    let timestamp = raw
        .timestamp
        .as_ref()
        .and_then(StringOrNumber::to_epoch)
        .or_else(|| {
            raw.create_date.as_deref().and_then(|date| {
                NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            })
        })
        .ok_or_else(|| RateError::Parse(format!("Missing timestamp for {key}")))?;

    Ok(Quote {
        pair: pair.clone(),
        bid,
        ask: raw.ask.as_ref().and_then(StringOrNumber::to_decimal),
        pct_change: raw.pct_change.as_ref().and_then(StringOrNumber::to_decimal),
        name: raw.name,
        timestamp,
    })
}

fn normalize_point(pair: &CurrencyPair, raw: RawPoint) -> Result<HistoricalPoint, RateError> {
    let bid = raw
        .bid
        .to_decimal()
        .ok_or_else(|| RateError::Parse(format!("Invalid historical bid for {}", pair.key())))?;
    let timestamp = raw.timestamp.to_epoch().ok_or_else(|| {
        RateError::Parse(format!("Invalid historical timestamp for {}", pair.key()))
    })?;
    Ok(HistoricalPoint { timestamp, bid })
}

/// Client for the AwesomeAPI quote service (`/json/last` and `/json/daily`).
pub struct AwesomeApiClient {
    base_url: String,
    token: Option<String>,
    same_currency: SameCurrencyPolicy,
    http: reqwest::Client,
}

impl AwesomeApiClient {
    pub fn new(
        config: &AwesomeApiConfig,
        same_currency: SameCurrencyPolicy,
    ) -> Result<Self, RateError> {
        let http = reqwest::Client::builder()
            .user_agent("cambio/1.0")
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RateError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(AwesomeApiClient {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
            same_currency,
            http,
        })
    }

    /// Appends the token, if any, to an endpoint that may already carry a query.
    fn url(&self, endpoint: &str) -> String {
        let url = format!("{}{}", self.base_url, endpoint);
        match &self.token {
            Some(token) if endpoint.contains('?') => format!("{url}&token={token}"),
            Some(token) => format!("{url}?token={token}"),
            None => url,
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, RateError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        debug!(%status, "Received AwesomeAPI response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
            return Err(RateError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl RateClient for AwesomeApiClient {
    #[instrument(
        name = "AwesomeQuoteFetch",
        skip(self, pairs),
        fields(pairs = pairs.len())
    )]
    async fn fetch_pairs(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<HashMap<CurrencyPair, Quote>, RateError> {
        let mut quotes = HashMap::new();
        let mut requested: Vec<&CurrencyPair> = Vec::new();
        for pair in pairs {
            if pair.is_identity() && self.same_currency == SameCurrencyPolicy::ShortCircuit {
                quotes.insert(pair.clone(), Quote::identity(pair.clone(), Utc::now()));
            } else if !requested.contains(&pair) {
                requested.push(pair);
            }
        }
        if requested.is_empty() {
            return Ok(quotes);
        }

        let query = requested
            .iter()
            .map(|p| p.query())
            .collect::<Vec<_>>()
            .join(",");
        let url = self.url(&format!("/json/last/{query}"));
        debug!("Requesting quotes for {}", query);

        let text = self.get_text(&url).await?;
        let body: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| RateError::Parse(format!("Failed to parse JSON response for {query}: {e}")))?;
        let mut entries = match body {
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(RateError::Parse(format!(
                    "Expected an object of quotes for {query}"
                )));
            }
        };

        for pair in requested {
            let key = pair.key();
            match entries.remove(&key) {
                Some(value) => {
                    let raw: RawQuote = serde_json::from_value(value)
                        .map_err(|e| RateError::Parse(format!("Malformed quote for {key}: {e}")))?;
                    quotes.insert(pair.clone(), normalize_quote(pair, raw)?);
                }
                None => warn!(pair = %pair, "Provider response is missing pair"),
            }
        }
        Ok(quotes)
    }

    #[instrument(
        name = "AwesomeHistoryFetch",
        skip(self, range),
        fields(pair = %pair, start = %range.start, end = %range.end)
    )]
    async fn fetch_history(
        &self,
        pair: &CurrencyPair,
        range: DateRange,
    ) -> Result<Vec<HistoricalPoint>, RateError> {
        let url = self.url(&format!(
            "/json/daily/{}?start_date={}&end_date={}",
            pair.query(),
            range.start.format("%Y%m%d"),
            range.end.format("%Y%m%d")
        ));
        debug!("Requesting history for {}", pair.query());

        let text = self.get_text(&url).await?;
        let raw: Vec<RawPoint> = serde_json::from_str(&text).map_err(|e| {
            RateError::Parse(format!("Failed to parse history for {}: {e}", pair.key()))
        })?;

        let mut points = raw
            .into_iter()
            .map(|p| normalize_point(pair, p))
            .collect::<Result<Vec<_>, _>>()?;
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }
}
