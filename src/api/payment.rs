use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use super::extract::{AdminUser, ApiPath, AuthUser, ValidatedJson};
use super::response::ApiResponse;
use crate::error::Result;
use crate::services::{CheckoutSession, Currency, VerifiedPayment};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(create_order))
        .route("/verify", post(verify))
        .route("/payment/:payment_id", get(payment))
        .route("/refund", post(refund))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(custom = "at_least_one")]
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
}

/// Fields as posted back by the checkout widget.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    #[validate(length(min = 1, message = "Order ID is required"))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1, message = "Payment ID is required"))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1, message = "Signature is required"))]
    pub razorpay_signature: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    #[validate(length(min = 1, message = "Payment ID is required"))]
    pub payment_id: String,
    #[validate(custom = "at_least_one")]
    pub amount: Option<Decimal>,
}

fn at_least_one(amount: &Decimal) -> std::result::Result<(), ValidationError> {
    if *amount < Decimal::ONE {
        let mut err = ValidationError::new("range");
        err.message = Some("Amount must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

async fn create_order(
    State(state): State<AppState>,
    _user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateOrderRequest>,
) -> Result<Json<ApiResponse<CheckoutSession>>> {
    Ok(Json(ApiResponse::ok(state.payments().create_order(req.amount, req.currency).await?)))
}

async fn verify(
    State(state): State<AppState>,
    _user: AuthUser,
    ValidatedJson(req): ValidatedJson<VerifyRequest>,
) -> Result<Json<ApiResponse<VerifiedPayment>>> {
    let verified = state.payments().verify(&req.razorpay_order_id, &req.razorpay_payment_id, &req.razorpay_signature)?;
    Ok(Json(ApiResponse::with_message("Payment verified successfully", verified)))
}

async fn payment(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(payment_id): ApiPath<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(ApiResponse::ok(state.payments().payment(&payment_id).await?)))
}

async fn refund(
    State(state): State<AppState>,
    _admin: AdminUser,
    ValidatedJson(req): ValidatedJson<RefundRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>> {
    let refund = state.payments().refund(&req.payment_id, req.amount).await?;
    Ok(Json(ApiResponse::with_message("Refund initiated successfully", refund)))
}
