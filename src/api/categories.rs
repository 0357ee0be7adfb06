use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::extract::{AdminUser, ApiPath, ValidatedJson};
use super::response::ApiResponse;
use crate::domain::aggregates::{Category, CategoryChanges};
use crate::error::Result;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).put(update).delete(remove))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 2, message = "Category name must be at least 2 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 2, message = "Category name must be at least 2 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
}

async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Category>>>> {
    Ok(Json(ApiResponse::ok(state.catalog().categories().await?)))
}

async fn show(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> Result<Json<ApiResponse<Category>>> {
    Ok(Json(ApiResponse::ok(state.catalog().category(id).await?)))
}

async fn create(
    State(state): State<AppState>,
    _admin: AdminUser,
    ValidatedJson(req): ValidatedJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Category>>)> {
    let category = state.catalog().create_category(&req.name, req.description, req.image).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::with_message("Category created successfully", category))))
}

async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateCategoryRequest>,
) -> Result<Json<ApiResponse<Category>>> {
    let changes = CategoryChanges { name: req.name, description: req.description, image: req.image, is_active: req.is_active };
    let category = state.catalog().update_category(id, changes).await?;
    Ok(Json(ApiResponse::with_message("Category updated successfully", category)))
}

async fn remove(State(state): State<AppState>, _admin: AdminUser, ApiPath(id): ApiPath<Uuid>) -> Result<Json<ApiResponse<()>>> {
    state.catalog().delete_category(id).await?;
    Ok(Json(ApiResponse::message("Category deleted successfully")))
}
