use axum::{
    extract::State,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::extract::{ApiPath, AuthUser, ValidatedJson};
use super::response::ApiResponse;
use crate::error::Result;
use crate::services::CartView;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(show))
        .route("/add", post(add))
        .route("/update", put(update))
        .route("/remove/:product_id", delete(remove))
        .route("/clear", delete(clear))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Quantity zero removes the line.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 0, message = "Quantity must be non-negative"))]
    pub quantity: i32,
}

async fn show(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<ApiResponse<CartView>>> {
    Ok(Json(ApiResponse::ok(state.carts().get(user.id).await?)))
}

async fn add(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<AddItemRequest>,
) -> Result<Json<ApiResponse<CartView>>> {
    let cart = state.carts().add(user.id, req.product_id, req.quantity).await?;
    Ok(Json(ApiResponse::with_message("Item added to cart successfully", cart)))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateItemRequest>,
) -> Result<Json<ApiResponse<CartView>>> {
    let cart = state.carts().update(user.id, req.product_id, req.quantity).await?;
    Ok(Json(ApiResponse::with_message("Cart updated successfully", cart)))
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(product_id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<CartView>>> {
    let cart = state.carts().remove(user.id, product_id).await?;
    Ok(Json(ApiResponse::with_message("Item removed from cart successfully", cart)))
}

async fn clear(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<ApiResponse<CartView>>> {
    let cart = state.carts().clear(user.id).await?;
    Ok(Json(ApiResponse::with_message("Cart cleared successfully", cart)))
}
