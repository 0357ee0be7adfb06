//! Registration, login and bearer-token authentication.

use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{hash_password, verify_password, TokenKeys};
use crate::config::AdminBootstrap;
use crate::domain::aggregates::{ProfileChanges, Role, User};
use crate::domain::value_objects::Email;
use crate::error::{AppError, FieldError, Result};
use crate::store::{Store, StoreError};

const DUPLICATE_EMAIL: &str = "User already exists with this email";
const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// An authenticated user together with a freshly issued token.
#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

pub struct AccountService<'a> {
    store: &'a dyn Store,
    tokens: &'a TokenKeys,
}

impl<'a> AccountService<'a> {
    pub fn new(store: &'a dyn Store, tokens: &'a TokenKeys) -> Self { Self { store, tokens } }

    #[instrument(skip(self, password))]
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<Session> {
        let email = Email::parse(email)
            .map_err(|_| AppError::Validation(vec![FieldError::new("email", "Please provide a valid email")]))?;
        if self.store.user_by_email(email.as_str()).await?.is_some() {
            return Err(AppError::bad_request(DUPLICATE_EMAIL));
        }

        let user = User::register(name.trim(), email.as_str(), hash_password(password)?, Role::User);
        self.store.insert_user(&user).await.map_err(|e| match e {
            StoreError::Conflict(_) => AppError::bad_request(DUPLICATE_EMAIL),
            other => AppError::store("Server error during registration")(other),
        })?;
        info!(user_id = %user.id, "user registered");

        let token = self.tokens.issue(user.id)?;
        Ok(Session { token, user })
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let invalid = || AppError::unauthorized(INVALID_CREDENTIALS);
        let email = Email::parse(email).map_err(|_| invalid())?;
        let user = self
            .store
            .user_by_email(email.as_str())
            .await
            .map_err(AppError::store("Server error during login"))?
            .filter(|u| u.is_active)
            .ok_or_else(invalid)?;
        if !verify_password(password, &user.password_hash) {
            return Err(invalid());
        }
        let token = self.tokens.issue(user.id)?;
        Ok(Session { token, user })
    }

    /// Resolve a bearer token to an active user.
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.tokens.verify(token)?;
        self.store
            .user_by_id(claims.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::unauthorized("Invalid token or user not found."))
    }

    #[instrument(skip(self, changes))]
    pub async fn update_profile(&self, user_id: Uuid, changes: ProfileChanges) -> Result<User> {
        let mut user = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        user.apply_profile(changes);
        self.store.update_user(&user).await.map_err(AppError::store("Server error during profile update"))?;
        Ok(user)
    }

    /// Create the configured admin account, or promote it if it already
    /// exists as a regular user.
    pub async fn ensure_admin(&self, admin: &AdminBootstrap) -> Result<User> {
        let email = Email::parse(&admin.email).map_err(|e| AppError::bad_request(format!("ADMIN_EMAIL: {e}")))?;
        if let Some(mut user) = self.store.user_by_email(email.as_str()).await? {
            if !user.is_admin() {
                warn!(user_id = %user.id, "promoting existing user to admin");
                user.role = Role::Admin;
                self.store.update_user(&user).await?;
            }
            return Ok(user);
        }
        let hash = hash_password(admin.password.expose_secret())?;
        let user = User::register(admin.name.as_str(), email.as_str(), hash, Role::Admin);
        self.store.insert_user(&user).await?;
        info!(user_id = %user.id, "admin account created");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, UserStore};
    use axum::http::StatusCode;
    use chrono::Duration;
    use secrecy::SecretString;

    fn keys() -> TokenKeys { TokenKeys::new(&SecretString::from("account-tests-signing-key"), Duration::days(7)) }

    #[tokio::test]
    async fn test_register_then_login() {
        let store = MemoryStore::new();
        let keys = keys();
        let accounts = AccountService::new(&store, &keys);

        let session = accounts.register("Jane Doe", "Jane@Example.com", "hunter22").await.unwrap();
        assert_eq!(session.user.email, "jane@example.com");
        assert_eq!(session.user.role, Role::User);

        let login = accounts.login("jane@example.com", "hunter22").await.unwrap();
        assert_eq!(login.user.id, session.user.id);
        let me = accounts.authenticate(&login.token).await.unwrap();
        assert_eq!(me.id, session.user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        let keys = keys();
        let accounts = AccountService::new(&store, &keys);
        accounts.register("Jane", "jane@example.com", "hunter22").await.unwrap();
        let err = accounts.register("Jane Again", "JANE@example.com", "hunter22").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), DUPLICATE_EMAIL);
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let store = MemoryStore::new();
        let keys = keys();
        let accounts = AccountService::new(&store, &keys);
        accounts.register("Jane", "jane@example.com", "hunter22").await.unwrap();

        let err = accounts.login("jane@example.com", "wrong-password").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        let err = accounts.login("nobody@example.com", "hunter22").await.unwrap_err();
        assert_eq!(err.to_string(), INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_authenticate() {
        let store = MemoryStore::new();
        let keys = keys();
        let accounts = AccountService::new(&store, &keys);
        let session = accounts.register("Jane", "jane@example.com", "hunter22").await.unwrap();

        let mut user = session.user.clone();
        user.is_active = false;
        store.update_user(&user).await.unwrap();

        assert_eq!(accounts.authenticate(&session.token).await.unwrap_err().status(), StatusCode::UNAUTHORIZED);
        assert!(accounts.login("jane@example.com", "hunter22").await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let store = MemoryStore::new();
        let keys = keys();
        let accounts = AccountService::new(&store, &keys);
        let admin = AdminBootstrap {
            name: "Root".into(),
            email: "admin@example.com".into(),
            password: SecretString::from("admin-password"),
        };
        let first = accounts.ensure_admin(&admin).await.unwrap();
        let second = accounts.ensure_admin(&admin).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.is_admin());
        assert!(accounts.login("admin@example.com", "admin-password").await.is_ok());
    }
}
