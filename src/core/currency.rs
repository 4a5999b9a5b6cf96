//! Currency codes, pairs and the supported set

use crate::core::error::RateError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// A three-letter currency identifier such as `USD`, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// For compile-time constants known to be valid codes.
    pub(crate) fn from_static(code: &'static str) -> Self {
        debug_assert!(code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()));
        CurrencyCode(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(RateError::Validation(format!(
                "Invalid currency code: '{s}'"
            )));
        }
        Ok(CurrencyCode(trimmed.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = RateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A (base, target) combination. One unit of `base` buys `bid` units of `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: CurrencyCode,
    pub target: CurrencyCode,
}

impl CurrencyPair {
    pub fn new(base: CurrencyCode, target: CurrencyCode) -> Self {
        Self { base, target }
    }

    /// Key used by the provider in responses and by `QuoteHistory`, e.g. `USDBRL`.
    pub fn key(&self) -> String {
        format!("{}{}", self.base, self.target)
    }

    /// Path segment used in provider requests, e.g. `USD-BRL`.
    pub fn query(&self) -> String {
        format!("{}-{}", self.base, self.target)
    }

    pub fn swapped(&self) -> Self {
        Self {
            base: self.target.clone(),
            target: self.base.clone(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.base == self.target
    }
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.target)
    }
}

/// The fixed list of codes the application accepts from users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencySet {
    codes: Vec<CurrencyCode>,
}

impl CurrencySet {
    pub fn new(codes: Vec<CurrencyCode>) -> Self {
        let mut unique: Vec<CurrencyCode> = Vec::with_capacity(codes.len());
        for code in codes {
            if !unique.contains(&code) {
                unique.push(code);
            }
        }
        Self { codes: unique }
    }

    pub fn contains(&self, code: &CurrencyCode) -> bool {
        self.codes.contains(code)
    }

    /// Parses user input and checks membership in the set.
    pub fn parse(&self, input: &str) -> Result<CurrencyCode, RateError> {
        let code: CurrencyCode = input.parse()?;
        if !self.contains(&code) {
            return Err(RateError::Validation(format!(
                "Unsupported currency: {code}"
            )));
        }
        Ok(code)
    }

    pub fn codes(&self) -> &[CurrencyCode] {
        &self.codes
    }

    /// Every supported code except `base`, in set order.
    pub fn others(&self, base: &CurrencyCode) -> Vec<CurrencyCode> {
        self.codes.iter().filter(|c| *c != base).cloned().collect()
    }
}

#[cfg(test)]
pub(crate) fn code(s: &str) -> CurrencyCode {
    s.parse().expect("valid currency code")
}
