//! Payment gateway bridge.
//!
//! The gateway owns all payment state. This module only forwards order
//! creation, lookups and refunds, and checks callback signatures locally.

mod razorpay;
mod signature;

pub use razorpay::RazorpayGateway;
pub use signature::SignatureVerifier;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse gateway response: {0}")]
    Parse(String),

    #[error("Gateway credentials are not configured")]
    NotConfigured,

    #[error("Amount {0} cannot be expressed in minor units")]
    InvalidAmount(Decimal),
}

/// Order creation request in the gateway's wire format.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayOrderRequest {
    /// Amount in minor units (paise, cents).
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub payment_capture: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key id handed to the checkout widget.
    fn key_id(&self) -> &str;
    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder, GatewayError>;
    async fn fetch_payment(&self, payment_id: &str) -> Result<serde_json::Value, GatewayError>;
    /// Refund a payment, fully when `amount` is `None`.
    async fn refund(&self, payment_id: &str, amount: Option<i64>) -> Result<serde_json::Value, GatewayError>;
}

/// Convert a major-unit amount to minor units (×100, half away from zero).
pub fn to_minor_units(amount: Decimal) -> Result<i64, GatewayError> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|minor| minor.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|minor| minor.to_i64())
        .ok_or(GatewayError::InvalidAmount(amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(Decimal::from(25)).unwrap(), 2500);
        assert_eq!(to_minor_units(Decimal::from_str("499.99").unwrap()).unwrap(), 49999);
        assert_eq!(to_minor_units(Decimal::from_str("0.005").unwrap()).unwrap(), 1);
        assert!(to_minor_units(Decimal::MAX).is_err());
    }
}
