//! Value objects for the storefront domain

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// SKU (Stock Keeping Unit) value object, always stored uppercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SkuError {
    #[error("SKU is required")]
    Empty,
    #[error("SKU must be at most 50 characters")]
    TooLong,
}

/// Normalised (trimmed, lowercase) email address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Parse an email address.
    ///
    /// Only the structural shape is checked here; request payloads go through
    /// `validator`'s email rule first.
    pub fn parse(value: &str) -> Result<Self, EmailError> {
        let value = value.trim().to_lowercase();
        let (local, domain) = value.split_once('@').ok_or(EmailError::MissingAt)?;
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(EmailError::Malformed);
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("email must contain '@'")]
    MissingAt,
    #[error("email is malformed")]
    Malformed,
}

/// Human-facing order number: `ORD-<unix millis>-<9 base-36 chars>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct OrderNumber(String);

const ORDER_SUFFIX_LEN: usize = 9;

impl OrderNumber {
    pub fn generate(at: DateTime<Utc>) -> Self {
        let mut rng = rand::rng();
        let suffix: String = (0..ORDER_SUFFIX_LEN)
            .map(|_| {
                char::from_digit(rng.random_range(0..36), 36)
                    .unwrap_or('0')
                    .to_ascii_uppercase()
            })
            .collect();
        Self(format!("ORD-{}-{}", at.timestamp_millis(), suffix))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sku() {
        let sku = Sku::new(" prod-001 ").unwrap();
        assert_eq!(sku.as_str(), "PROD-001");
        assert_eq!(Sku::new("   "), Err(SkuError::Empty));
    }

    #[test]
    fn test_email() {
        assert_eq!(Email::parse(" Jane@Example.COM ").unwrap().as_str(), "jane@example.com");
        assert!(Email::parse("nope").is_err());
        assert!(Email::parse("@example.com").is_err());
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc::now();
        let number = OrderNumber::generate(now);
        let parts: Vec<&str> = number.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1], now.timestamp_millis().to_string());
        assert_eq!(parts[2].len(), ORDER_SUFFIX_LEN);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_order_numbers_unique() {
        let now = Utc::now();
        let numbers: HashSet<_> = (0..1000).map(|_| OrderNumber::generate(now)).collect();
        assert_eq!(numbers.len(), 1000);
    }
}
