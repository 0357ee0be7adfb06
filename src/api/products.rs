use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::extract::{field_errors, AdminUser, ApiPath, ApiQuery, ValidatedJson};
use super::response::{ApiResponse, Pagination};
use crate::domain::aggregates::{NewProduct, Product, ProductChanges};
use crate::domain::value_objects::Sku;
use crate::error::{AppError, FieldError, Result};
use crate::state::AppState;
use crate::store::{PageRequest, ProductFilter, ProductSort};

const DEFAULT_LIMIT: u32 = 12;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).put(update).delete(remove))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,
    pub category: Option<Uuid>,
    #[validate(custom = "valid_min_price")]
    pub min_price: Option<Decimal>,
    #[validate(custom = "valid_max_price")]
    pub max_price: Option<Decimal>,
    #[validate(length(min = 1, message = "Search term cannot be empty"))]
    pub search: Option<String>,
    pub featured: Option<bool>,
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 2, message = "Product name must be at least 2 characters"))]
    pub name: String,
    #[validate(length(min = 10, message = "Description must be at least 10 characters"))]
    pub description: String,
    #[validate(custom = "valid_price")]
    pub price: Decimal,
    #[validate(custom = "valid_price")]
    pub original_price: Option<Decimal>,
    pub category: Uuid,
    #[serde(default)]
    pub images: Vec<String>,
    #[validate(range(min = 0, message = "Stock must be a non-negative integer"))]
    pub stock: i32,
    #[validate(length(min = 1, message = "SKU is required"))]
    pub sku: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[validate(length(min = 2, message = "Product name must be at least 2 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 10, message = "Description must be at least 10 characters"))]
    pub description: Option<String>,
    #[validate(custom = "valid_price")]
    pub price: Option<Decimal>,
    #[validate(custom = "valid_price")]
    pub original_price: Option<Decimal>,
    pub category: Option<Uuid>,
    pub images: Option<Vec<String>>,
    #[validate(range(min = 0, message = "Stock must be a non-negative integer"))]
    pub stock: Option<i32>,
    #[validate(length(min = 1, message = "SKU is required"))]
    pub sku: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub featured: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

fn non_negative(value: &Decimal, message: &'static str) -> std::result::Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("range");
        err.message = Some(message.into());
        return Err(err);
    }
    Ok(())
}

fn valid_price(value: &Decimal) -> std::result::Result<(), ValidationError> {
    non_negative(value, "Price must be a positive number")
}

fn valid_min_price(value: &Decimal) -> std::result::Result<(), ValidationError> {
    non_negative(value, "Min price must be a positive number")
}

fn valid_max_price(value: &Decimal) -> std::result::Result<(), ValidationError> {
    non_negative(value, "Max price must be a positive number")
}

fn parse_sku(raw: &str) -> Result<Sku> {
    Sku::new(raw).map_err(|e| AppError::Validation(vec![FieldError::new("sku", e.to_string())]))
}

async fn list(State(state): State<AppState>, ApiQuery(query): ApiQuery<ProductQuery>) -> Result<Json<ApiResponse<ProductPage>>> {
    query.validate().map_err(|e| AppError::Validation(field_errors(&e)))?;
    let sort = match query.sort.as_deref() {
        None => ProductSort::default(),
        Some(raw) => raw.parse::<ProductSort>().map_err(|e| AppError::Validation(vec![FieldError::new("sort", e)]))?,
    };
    let filter = ProductFilter {
        category_id: query.category,
        min_price: query.min_price,
        max_price: query.max_price,
        search: query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        featured_only: query.featured.unwrap_or(false),
        sort,
    };
    let page = PageRequest::new(query.page.unwrap_or(1), query.limit.unwrap_or(DEFAULT_LIMIT));
    let (products, total) = state.catalog().products(&filter, page).await?;
    Ok(Json(ApiResponse::ok(ProductPage { products, pagination: Pagination::new(page, total) })))
}

async fn show(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> Result<Json<ApiResponse<Product>>> {
    Ok(Json(ApiResponse::ok(state.catalog().product(id).await?)))
}

async fn create(
    State(state): State<AppState>,
    _admin: AdminUser,
    ValidatedJson(req): ValidatedJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>)> {
    let new = NewProduct {
        name: req.name.trim().to_string(),
        description: req.description.trim().to_string(),
        price: req.price,
        original_price: req.original_price,
        category_id: req.category,
        images: req.images,
        stock: req.stock,
        sku: parse_sku(&req.sku)?,
        tags: req.tags,
        featured: req.featured,
    };
    let product = state.catalog().create_product(new).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::with_message("Product created successfully", product))))
}

async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateProductRequest>,
) -> Result<Json<ApiResponse<Product>>> {
    let changes = ProductChanges {
        name: req.name.map(|v| v.trim().to_string()),
        description: req.description.map(|v| v.trim().to_string()),
        price: req.price,
        original_price: req.original_price,
        category_id: req.category,
        images: req.images,
        stock: req.stock,
        sku: req.sku.as_deref().map(parse_sku).transpose()?,
        tags: req.tags,
        is_active: req.is_active,
        featured: req.featured,
    };
    let product = state.catalog().update_product(id, changes).await?;
    Ok(Json(ApiResponse::with_message("Product updated successfully", product)))
}

async fn remove(State(state): State<AppState>, _admin: AdminUser, ApiPath(id): ApiPath<Uuid>) -> Result<Json<ApiResponse<()>>> {
    state.catalog().delete_product(id).await?;
    Ok(Json(ApiResponse::message("Product deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_query_validation() {
        let query = ProductQuery { limit: Some(101), min_price: Some(Decimal::from(-1)), ..Default::default() };
        let errors = field_errors(&query.validate().unwrap_err());
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["limit", "minPrice"]);
        assert_eq!(errors[1].message, "Min price must be a positive number");
    }

    #[test]
    fn test_zero_price_allowed() {
        assert!(valid_price(&Decimal::ZERO).is_ok());
        assert!(valid_price(&Decimal::from_str("-0.01").unwrap()).is_err());
    }
}
