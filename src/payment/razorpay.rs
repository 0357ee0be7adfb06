//! Razorpay REST client.
//!
//! - Base URL: `https://api.razorpay.com/v1` (overridable for tests)
//! - Authentication: HTTP basic with key id and key secret

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, error, instrument};

use super::{GatewayError, GatewayOrder, GatewayOrderRequest, PaymentGateway};
use crate::config::GatewayConfig;

#[derive(Clone)]
pub struct RazorpayGateway {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: SecretString,
}

impl std::fmt::Debug for RazorpayGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayGateway")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct RefundRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<i64>,
}

impl RazorpayGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(std::time::Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.key_id.is_empty() || self.key_secret.expose_secret().is_empty() {
            return Err(GatewayError::NotConfigured);
        }
        Ok(())
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| GatewayError::Parse(e.to_string()));
        }
        let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        error!(status = status.as_u16(), %message, "Razorpay API error");
        Err(GatewayError::Api { status: status.as_u16(), message })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str { &self.key_id }

    #[instrument(skip(self), fields(amount = request.amount, currency = %request.currency))]
    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        self.ensure_configured()?;
        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(request)
            .send()
            .await?;
        let order: GatewayOrder = Self::handle_response(response).await?;
        debug!(order_id = %order.id, "gateway order created");
        Ok(order)
    }

    #[instrument(skip(self))]
    async fn fetch_payment(&self, payment_id: &str) -> Result<serde_json::Value, GatewayError> {
        self.ensure_configured()?;
        let response = self
            .client
            .get(format!("{}/payments/{payment_id}", self.base_url))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    #[instrument(skip(self))]
    async fn refund(&self, payment_id: &str, amount: Option<i64>) -> Result<serde_json::Value, GatewayError> {
        self.ensure_configured()?;
        let response = self
            .client
            .post(format!("{}/payments/{payment_id}/refund", self.base_url))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&RefundRequest { amount })
            .send()
            .await?;
        Self::handle_response(response).await
    }
}
