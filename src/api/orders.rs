use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::extract::{field_errors, AdminUser, ApiPath, ApiQuery, AuthUser, ValidatedJson};
use super::response::{ApiResponse, Pagination};
use crate::domain::aggregates::{Checkout, Order, OrderStatus, PaymentMethod, ShippingAddress};
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::store::PageRequest;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_mine).post(create))
        .route("/admin/all", get(list_all))
        .route("/:id", get(show))
        .route("/:id/cancel", put(cancel))
        .route("/:id/status", put(update_status))
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct OrderQuery {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,
    pub status: Option<OrderStatus>,
}

impl OrderQuery {
    fn page_request(&self, default_limit: u32) -> Result<PageRequest> {
        self.validate().map_err(|e| AppError::Validation(field_errors(&e)))?;
        Ok(PageRequest::new(self.page.unwrap_or(1), self.limit.unwrap_or(default_limit)))
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
    #[validate]
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}

async fn list_mine(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<OrderQuery>,
) -> Result<Json<ApiResponse<OrderPage>>> {
    let page = query.page_request(10)?;
    let (orders, total) = state.orders().list_for_user(user.id, page).await?;
    Ok(Json(ApiResponse::ok(OrderPage { orders, pagination: Pagination::new(page, total) })))
}

async fn list_all(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<OrderQuery>,
) -> Result<Json<ApiResponse<OrderPage>>> {
    let page = query.page_request(20)?;
    let (orders, total) = state.orders().list_all(query.status, page).await?;
    Ok(Json(ApiResponse::ok(OrderPage { orders, pagination: Pagination::new(page, total) })))
}

async fn show(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<Order>>> {
    Ok(Json(ApiResponse::ok(state.orders().get(&user, id).await?)))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>)> {
    let checkout = Checkout {
        payment_method: req.payment_method,
        payment_id: req.payment_id.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
        shipping_address: req.shipping_address.trimmed(),
    };
    let order = state.orders().place(user.id, checkout).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::with_message("Order created successfully", order))))
}

async fn cancel(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<Order>>> {
    let order = state.orders().cancel(user.id, id).await?;
    Ok(Json(ApiResponse::with_message("Order cancelled successfully", order)))
}

async fn update_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<StatusRequest>,
) -> Result<Json<ApiResponse<Order>>> {
    let order = state.orders().update_status(id, req.status).await?;
    Ok(Json(ApiResponse::with_message("Order status updated successfully", order)))
}
