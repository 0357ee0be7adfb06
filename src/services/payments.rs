//! Payment bridge: gateway order creation, signature checks, lookups and
//! refunds. Nothing is stored locally.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{AppError, Result};
use crate::payment::{to_minor_units, GatewayOrderRequest, PaymentGateway, SignatureVerifier};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    #[serde(rename = "INR")]
    Inr,
    #[serde(rename = "USD")]
    Usd,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self { Self::Inr => "INR", Self::Usd => "USD" }
    }
}

/// What the checkout widget needs to open a payment.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub order_id: String,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPayment {
    pub order_id: String,
    pub payment_id: String,
}

pub struct PaymentService<'a> {
    gateway: &'a dyn PaymentGateway,
    verifier: &'a SignatureVerifier,
}

impl<'a> PaymentService<'a> {
    pub fn new(gateway: &'a dyn PaymentGateway, verifier: &'a SignatureVerifier) -> Self { Self { gateway, verifier } }

    #[instrument(skip(self))]
    pub async fn create_order(&self, amount: Decimal, currency: Currency) -> Result<CheckoutSession> {
        const FAILED: &str = "Failed to create payment order";
        let request = GatewayOrderRequest {
            amount: to_minor_units(amount).map_err(AppError::gateway(FAILED))?,
            currency: currency.code().to_string(),
            receipt: format!("receipt_{}", Utc::now().timestamp_millis()),
            payment_capture: 1,
        };
        let order = self.gateway.create_order(&request).await.map_err(AppError::gateway(FAILED))?;
        Ok(CheckoutSession {
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            key: self.gateway.key_id().to_string(),
        })
    }

    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<VerifiedPayment> {
        if !self.verifier.verify(order_id, payment_id, signature) {
            warn!(order_id, payment_id, "payment signature mismatch");
            return Err(AppError::bad_request("Invalid payment signature"));
        }
        info!(order_id, payment_id, "payment verified");
        Ok(VerifiedPayment { order_id: order_id.to_string(), payment_id: payment_id.to_string() })
    }

    pub async fn payment(&self, payment_id: &str) -> Result<serde_json::Value> {
        check_payment_id(payment_id)?;
        self.gateway.fetch_payment(payment_id).await.map_err(AppError::gateway("Failed to fetch payment details"))
    }

    /// Refund a payment; `amount` in major units, full refund when `None`.
    #[instrument(skip(self))]
    pub async fn refund(&self, payment_id: &str, amount: Option<Decimal>) -> Result<serde_json::Value> {
        const FAILED: &str = "Failed to initiate refund";
        check_payment_id(payment_id)?;
        let amount = amount.map(to_minor_units).transpose().map_err(AppError::gateway(FAILED))?;
        let refund = self.gateway.refund(payment_id, amount).await.map_err(AppError::gateway(FAILED))?;
        info!(payment_id, ?amount, "refund initiated");
        Ok(refund)
    }
}

/// Gateway ids are spliced into request paths, so only `[A-Za-z0-9_]+` passes.
fn check_payment_id(payment_id: &str) -> Result<()> {
    let valid = !payment_id.is_empty() && payment_id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if !valid {
        warn!(payment_id, "rejected malformed payment id");
        return Err(AppError::bad_request("Invalid payment ID"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::{GatewayError, GatewayOrder};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use secrecy::SecretString;
    use std::str::FromStr;
    use std::sync::Mutex;

    /// Gateway double that records requests.
    #[derive(Default)]
    struct FakeGateway {
        orders: Mutex<Vec<GatewayOrderRequest>>,
        refunds: Mutex<Vec<(String, Option<i64>)>>,
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        fn key_id(&self) -> &str { "rzp_test_key" }

        async fn create_order(&self, request: &GatewayOrderRequest) -> std::result::Result<GatewayOrder, GatewayError> {
            self.orders.lock().unwrap().push(request.clone());
            Ok(GatewayOrder { id: "order_test_1".into(), amount: request.amount, currency: request.currency.clone() })
        }

        async fn fetch_payment(&self, payment_id: &str) -> std::result::Result<serde_json::Value, GatewayError> {
            if payment_id == "missing" {
                return Err(GatewayError::Api { status: 400, message: "The id provided does not exist".into() });
            }
            Ok(serde_json::json!({ "id": payment_id, "status": "captured" }))
        }

        async fn refund(&self, payment_id: &str, amount: Option<i64>) -> std::result::Result<serde_json::Value, GatewayError> {
            self.refunds.lock().unwrap().push((payment_id.to_string(), amount));
            Ok(serde_json::json!({ "id": "rfnd_1", "payment_id": payment_id, "amount": amount }))
        }
    }

    fn verifier() -> SignatureVerifier { SignatureVerifier::new(SecretString::from("gateway-secret")) }

    #[tokio::test]
    async fn test_create_order_converts_to_minor_units() {
        let gateway = FakeGateway::default();
        let verifier = verifier();
        let payments = PaymentService::new(&gateway, &verifier);
        let session = payments.create_order(Decimal::from_str("499.50").unwrap(), Currency::Inr).await.unwrap();
        assert_eq!(session.amount, 49950);
        assert_eq!(session.currency, "INR");
        assert_eq!(session.key, "rzp_test_key");

        let sent = gateway.orders.lock().unwrap();
        assert_eq!(sent[0].payment_capture, 1);
        assert!(sent[0].receipt.starts_with("receipt_"));
    }

    #[test]
    fn test_verify_signature() {
        let gateway = FakeGateway::default();
        let verifier = verifier();
        let payments = PaymentService::new(&gateway, &verifier);
        let signature = verifier.sign("order_1", "pay_1");

        let verified = payments.verify("order_1", "pay_1", &signature).unwrap();
        assert_eq!(verified.payment_id, "pay_1");
        let err = payments.verify("order_1", "pay_2", &signature).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Invalid payment signature");
    }

    #[tokio::test]
    async fn test_refund_and_lookup_pass_through() {
        let gateway = FakeGateway::default();
        let verifier = verifier();
        let payments = PaymentService::new(&gateway, &verifier);
        payments.refund("pay_1", Some(Decimal::from(10))).await.unwrap();
        payments.refund("pay_2", None).await.unwrap();
        assert_eq!(*gateway.refunds.lock().unwrap(), vec![("pay_1".to_string(), Some(1000)), ("pay_2".to_string(), None)]);

        assert_eq!(payments.payment("pay_1").await.unwrap()["status"], "captured");
        let err = payments.payment("missing").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_currency_codes() {
        assert_eq!(serde_json::from_str::<Currency>("\"USD\"").unwrap(), Currency::Usd);
        assert!(serde_json::from_str::<Currency>("\"EUR\"").is_err());
    }

    #[tokio::test]
    async fn test_malformed_payment_ids_never_reach_gateway() {
        let gateway = FakeGateway::default();
        let verifier = verifier();
        let payments = PaymentService::new(&gateway, &verifier);
        for id in ["", ".", "..", "../orders", "pay_1/refund", "pay 1", "pay_1?x=1"] {
            let err = payments.payment(id).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{id:?}");
            assert_eq!(err.to_string(), "Invalid payment ID");
            assert_eq!(payments.refund(id, None).await.unwrap_err().status(), StatusCode::BAD_REQUEST);
        }
        assert!(gateway.refunds.lock().unwrap().is_empty());
        assert!(payments.payment("pay_ABC123xyz").await.is_ok());
    }
}
