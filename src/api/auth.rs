use axum::{extract::State, http::StatusCode, routing::{get, post, put}, Json, Router};
use serde::Deserialize;
use validator::Validate;

use super::extract::{AuthUser, ValidatedJson};
use super::response::ApiResponse;
use crate::domain::aggregates::{Address, ProfileChanges, User};
use crate::error::Result;
use crate::services::Session;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileRequest {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 7, max = 20, message = "Please provide a valid phone number"))]
    pub phone: Option<String>,
    #[validate]
    pub address: Option<Address>,
}

async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Session>>)> {
    let session = state.accounts().register(req.name.trim(), &req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::with_message("User registered successfully", session))))
}

async fn login(State(state): State<AppState>, ValidatedJson(req): ValidatedJson<LoginRequest>) -> Result<Json<ApiResponse<Session>>> {
    let session = state.accounts().login(&req.email, &req.password).await?;
    Ok(Json(ApiResponse::with_message("Login successful", session)))
}

async fn me(AuthUser(user): AuthUser) -> Json<ApiResponse<User>> { Json(ApiResponse::ok(user)) }

async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<ProfileRequest>,
) -> Result<Json<ApiResponse<User>>> {
    let changes = ProfileChanges {
        name: req.name.map(|n| n.trim().to_string()),
        phone: req.phone.map(|p| p.trim().to_string()),
        address: req.address,
    };
    let user = state.accounts().update_profile(user.id, changes).await?;
    Ok(Json(ApiResponse::with_message("Profile updated successfully", user)))
}
