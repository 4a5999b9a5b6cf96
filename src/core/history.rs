//! Rolling per-pair history used to derive period-over-period change

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub value: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// Fixed-capacity buffers keyed by pair-key, newest entry first.
#[derive(Debug)]
pub struct QuoteHistory {
    capacity: usize,
    entries: HashMap<String, VecDeque<HistoryEntry>>,
}

impl QuoteHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    /// Records `value` for `pair_key` and returns the percent change against
    /// the previous head entry, or zero when there is none.
    pub fn record(&mut self, pair_key: &str, value: Decimal, observed_at: DateTime<Utc>) -> Decimal {
        let buffer = self.entries.entry(pair_key.to_string()).or_default();

        let change = buffer
            .front()
            .map(|prior| percent_change(prior.value, value))
            .unwrap_or(Decimal::ZERO);

        buffer.push_front(HistoryEntry { value, observed_at });
        buffer.truncate(self.capacity);
        debug!(pair_key, %value, %change, size = buffer.len(), "Recorded quote");
        change
    }

    /// Entries for `pair_key`, newest first.
    pub fn entries(&self, pair_key: &str) -> Vec<&HistoryEntry> {
        self.entries
            .get(pair_key)
            .map(|buffer| buffer.iter().collect())
            .unwrap_or_default()
    }

    pub fn latest(&self, pair_key: &str) -> Option<&HistoryEntry> {
        self.entries.get(pair_key).and_then(|buffer| buffer.front())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every buffer.
    pub fn reset(&mut self) {
        if !self.entries.is_empty() {
            debug!(keys = self.entries.len(), "Resetting quote history");
        }
        self.entries.clear();
    }
}

impl Default for QuoteHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// `(current - prior) / prior * 100`; zero when `prior` is zero.
pub fn percent_change(prior: Decimal, current: Decimal) -> Decimal {
    (current - prior)
        .checked_div(prior)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
}
