//! Core business logic abstractions

pub mod catalog;
pub mod config;
pub mod currency;
pub mod debounce;
pub mod error;
pub mod history;
pub mod log;
pub mod lookup;
pub mod pipeline;
pub mod quote;
pub mod ranking;
pub mod series;
pub mod state;
pub mod timer;

// Re-export main types for cleaner imports
pub use currency::{CurrencyCode, CurrencyPair, CurrencySet};
pub use error::RateError;
pub use pipeline::{ConversionPipeline, PipelineSettings, PipelineState};
pub use quote::{DateRange, HistoricalPoint, Quote, RateClient};
pub use state::Phase;
