use crate::core::currency::{CurrencyCode, CurrencySet};
use crate::core::error::RateError;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

const DEFAULT_CURRENCIES: [&str; 10] = [
    "BRL", "USD", "EUR", "JPY", "GBP", "ARS", "CAD", "AUD", "CHF", "CNY",
];
const DEFAULT_RANKING: [&str; 10] = [
    "USD", "EUR", "ARS", "GBP", "CAD", "PYG", "CLP", "AUD", "JPY", "COP",
];

fn codes(list: &[&'static str]) -> Vec<CurrencyCode> {
    list.iter().map(|c| CurrencyCode::from_static(c)).collect()
}

fn default_code(s: &'static str) -> CurrencyCode {
    CurrencyCode::from_static(s)
}

/// Whether converting a currency into itself goes to the provider.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SameCurrencyPolicy {
    /// Answer with rate 1 without a network call.
    #[default]
    ShortCircuit,
    /// Ask the provider, which may quote a spread.
    Fetch,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ConverterConfig {
    pub debounce_ms: u64,
    pub history_capacity: usize,
    pub same_currency: SameCurrencyPolicy,
    pub default_from: CurrencyCode,
    pub default_to: CurrencyCode,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        ConverterConfig {
            debounce_ms: 500,
            history_capacity: 5,
            same_currency: SameCurrencyPolicy::ShortCircuit,
            default_from: default_code("BRL"),
            default_to: default_code("USD"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LookupConfig {
    pub default_base: CurrencyCode,
}

impl Default for LookupConfig {
    fn default() -> Self {
        LookupConfig {
            default_base: default_code("USD"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RankingConfig {
    pub quote_currency: CurrencyCode,
    pub currencies: Vec<CurrencyCode>,
    pub refresh_secs: u64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        RankingConfig {
            quote_currency: default_code("BRL"),
            currencies: codes(&DEFAULT_RANKING),
            refresh_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AwesomeApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AwesomeApiConfig {
    fn default() -> Self {
        AwesomeApiConfig {
            base_url: "https://economia.awesomeapi.com.br".to_string(),
            token: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub awesomeapi: Option<AwesomeApiConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            awesomeapi: Some(AwesomeApiConfig::default()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub currencies: Vec<CurrencyCode>,
    pub converter: ConverterConfig,
    pub lookup: LookupConfig,
    pub ranking: RankingConfig,
    pub providers: ProvidersConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            currencies: codes(&DEFAULT_CURRENCIES),
            converter: ConverterConfig::default(),
            lookup: LookupConfig::default(),
            ranking: RankingConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the default config file, or built-in defaults when there is none.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "cambio", "cambio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = if config_str.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&config_str).with_context(|| {
                format!("Failed to parse config file: {}", path.as_ref().display())
            })?
        };
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RateError> {
        if self.currencies.is_empty() {
            return Err(RateError::Configuration(
                "At least one supported currency is required".to_string(),
            ));
        }
        if self.converter.debounce_ms == 0 {
            return Err(RateError::Configuration(
                "converter.debounce_ms must be greater than zero".to_string(),
            ));
        }
        if self.converter.history_capacity == 0 {
            return Err(RateError::Configuration(
                "converter.history_capacity must be greater than zero".to_string(),
            ));
        }
        let supported = self.supported();
        for (field, code) in [
            ("converter.default_from", &self.converter.default_from),
            ("converter.default_to", &self.converter.default_to),
            ("lookup.default_base", &self.lookup.default_base),
        ] {
            if !supported.contains(code) {
                return Err(RateError::Configuration(format!(
                    "{field} uses unsupported currency {code}"
                )));
            }
        }
        if self.ranking.currencies.is_empty() {
            return Err(RateError::Configuration(
                "ranking.currencies must not be empty".to_string(),
            ));
        }
        if self.ranking.refresh_secs == 0 {
            return Err(RateError::Configuration(
                "ranking.refresh_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn supported(&self) -> CurrencySet {
        CurrencySet::new(self.currencies.clone())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.converter.debounce_ms)
    }

    pub fn ranking_refresh(&self) -> Duration {
        Duration::from_secs(self.ranking.refresh_secs)
    }

    pub fn awesomeapi(&self) -> AwesomeApiConfig {
        self.providers.awesomeapi.clone().unwrap_or_default()
    }
}
