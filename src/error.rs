//! HTTP-facing error type.
//!
//! Every handler returns `Result<T, AppError>`. The error renders the standard
//! envelope `{success: false, message, errors?, error?}`. Server errors also
//! carry an [`ErrorDetail`] response extension; the router copies it into the
//! `error` field in development.

use axum::{
    extract::rejection::{PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::api::response::ApiResponse;
use crate::auth::{PasswordError, TokenError};
use crate::domain::aggregates::{CartError, OrderError};
use crate::payment::GatewayError;
use crate::store::StoreError;

/// Underlying cause of a server error, attached to the response extensions.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub message: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Request body failed validation.
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Storage failed. The message is what the client sees.
    #[error("{message}: {source}")]
    Store { message: &'static str, source: StoreError },

    /// Payment gateway call failed.
    #[error("{message}: {source}")]
    Gateway { message: &'static str, source: GatewayError },

    #[error("{message}: {detail}")]
    Internal { message: &'static str, detail: String },
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self { Self::BadRequest(message.into()) }
    pub fn not_found(message: impl Into<String>) -> Self { Self::NotFound(message.into()) }
    pub fn unauthorized(message: impl Into<String>) -> Self { Self::Unauthorized(message.into()) }
    pub fn forbidden(message: impl Into<String>) -> Self { Self::Forbidden(message.into()) }

    /// Map a store failure, replacing the generic server error message.
    pub fn store(message: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| match Self::from(source) {
            Self::Store { source, .. } => Self::Store { message, source },
            other => other,
        }
    }

    pub fn gateway(message: &'static str) -> impl FnOnce(GatewayError) -> Self {
        move |source| Self::Gateway { message, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store { .. } | Self::Gateway { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Store { message, .. } | Self::Gateway { message, .. } | Self::Internal { message, .. } => {
                (*message).to_string()
            }
            other => other.to_string(),
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            Self::Store { source, .. } => Some(source.to_string()),
            Self::Gateway { source, .. } => Some(source.to_string()),
            Self::Internal { detail, .. } => Some(detail.clone()),
            _ => None,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => Self::BadRequest(message),
            StoreError::InsufficientStock { available, .. } => {
                Self::BadRequest(format!("Only {available} items available in stock"))
            }
            other => Self::Store { message: "Server error", source: other },
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ProductUnavailable | CartError::ItemNotFound => Self::NotFound(err.to_string()),
            CartError::InvalidQuantity | CartError::InsufficientStock { .. } => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::ProductUnavailable(_) => Self::NotFound(err.to_string()),
            _ => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid(_) => Self::Unauthorized("Invalid token.".into()),
            TokenError::Encode(e) => Self::Internal { message: "Server error", detail: e.to_string() },
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self { Self::Internal { message: "Server error", detail: err.to_string() } }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request error");
        }

        let message = self.client_message();
        let detail = self.detail();
        let mut body = ApiResponse::<()>::failure(message.clone());
        if let Self::Validation(errors) = self {
            body.errors = Some(errors);
        }

        let mut response = (status, Json(body)).into_response();
        if let Some(detail) = detail {
            response.extensions_mut().insert(ErrorDetail { message, detail });
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_app_error_display() {
        let err = AppError::not_found("Order not found");
        assert_eq!(err.to_string(), "Order not found");

        let err = AppError::Store { message: "Server error", source: StoreError::Stale("gone".into()) };
        assert_eq!(err.to_string(), "Server error: Stale write: gone");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode { err.into_response().status() }

        assert_eq!(get_status(AppError::Validation(vec![])), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(AppError::not_found("x")), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::unauthorized("x")), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AppError::forbidden("x")), StatusCode::FORBIDDEN);
        assert_eq!(
            get_status(AppError::Internal { message: "Server error", detail: "boom".into() }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let gateway = AppError::gateway("Failed to fetch payment details")(GatewayError::NotConfigured);
        assert_eq!(gateway.to_string(), "Failed to fetch payment details: Gateway credentials are not configured");
        assert_eq!(get_status(gateway), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_domain_error_mapping() {
        assert_eq!(AppError::from(CartError::ProductUnavailable).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(CartError::InsufficientStock { available: 3 }).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::from(OrderError::EmptyCart).to_string(), "Cart is empty");
        let stock = StoreError::InsufficientStock { product_id: Uuid::now_v7(), available: 2 };
        assert_eq!(AppError::from(stock).to_string(), "Only 2 items available in stock");
    }

    #[test]
    fn test_detail_travels_as_extension() {
        let response = AppError::Internal { message: "Server error", detail: "boom".into() }.into_response();
        let detail = response.extensions().get::<ErrorDetail>().unwrap();
        assert_eq!(detail.message, "Server error");
        assert_eq!(detail.detail, "boom");

        let response = AppError::not_found("Order not found").into_response();
        assert!(response.extensions().get::<ErrorDetail>().is_none());
    }
}
