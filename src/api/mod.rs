//! HTTP surface: route tables, extractors and the response envelope.

pub mod auth;
pub mod cart;
pub mod categories;
pub mod extract;
pub mod orders;
pub mod payment;
pub mod products;
pub mod response;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::response::ApiResponse;
use crate::error::{AppError, ErrorDetail};
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Build the application router with all routes under `/api`.
pub fn router(state: AppState, allowed_origin: HeaderValue) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::routes())
        .nest("/categories", categories::routes())
        .nest("/products", products::routes())
        .nest("/cart", cart::routes())
        .nest("/orders", orders::routes())
        .nest("/payment", payment::routes());

    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        .nest("/api", api)
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), expose_error_detail))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "message": "Server is running",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.environment.as_str(),
    }))
}

async fn not_found() -> AppError { AppError::not_found("Route not found") }

/// Development builds show the cause of server errors in the `error` field.
async fn expose_error_detail(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if !state.environment.is_development() {
        return response;
    }
    match response.extensions().get::<ErrorDetail>().cloned() {
        Some(ErrorDetail { message, detail }) => {
            let mut body = ApiResponse::<()>::failure(message);
            body.error = Some(detail);
            (response.status(), Json(body)).into_response()
        }
        None => response,
    }
}
