//! Error taxonomy for rate fetching and conversion

use thiserror::Error;

/// Failure kinds surfaced by rate clients and the conversion pipeline.
///
/// The type is `Clone` so a failure can sit inside the observable pipeline
/// state; transport errors are therefore flattened to their message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateError {
    /// No response was obtained (timeout, DNS, connection refused).
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered with a non-success HTTP status.
    #[error("Provider error: HTTP {status}: {message}")]
    Provider { status: u16, message: String },

    /// A response arrived but the expected pair or field was missing or malformed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// User input failed basic shape checks.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid settings or an unsupported currency format.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Provider,
    Parse,
    Validation,
    Configuration,
}

impl RateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RateError::Network(_) => ErrorKind::Network,
            RateError::Provider { .. } => ErrorKind::Provider,
            RateError::Parse(_) => ErrorKind::Parse,
            RateError::Validation(_) => ErrorKind::Validation,
            RateError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Generic text shown to end users; the variant detail stays internal.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "Please enter a valid amount and currency.",
            ErrorKind::Configuration => "The application is not configured correctly.",
            _ => "Could not fetch exchange rates. Please try again.",
        }
    }
}

/// Status failures never reach this conversion: the provider client reads
/// the status itself and builds `RateError::Provider` with the body's message.
impl From<reqwest::Error> for RateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RateError::Parse(err.to_string())
        } else {
            RateError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_display() {
        let err = RateError::Provider {
            status: 500,
            message: "Internal Server Error".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(err.to_string(), "Provider error: HTTP 500: Internal Server Error");

        let err = RateError::Parse("missing pair USDBRL".to_string());
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.to_string(), "Parse error: missing pair USDBRL");
    }

    #[test]
    fn test_fetch_failures_share_user_message() {
        let network = RateError::Network("connection refused".to_string());
        let parse = RateError::Parse("bad json".to_string());
        assert_eq!(network.user_message(), parse.user_message());
        assert_ne!(
            network.user_message(),
            RateError::Validation("abc".to_string()).user_message()
        );
    }

    #[test]
    fn test_transport_failure_is_network_error() {
        let err = reqwest::Client::new()
            .get("http://exa mple.com/json/last/USD-BRL")
            .build()
            .unwrap_err();
        assert!(matches!(RateError::from(err), RateError::Network(_)));
    }
}
