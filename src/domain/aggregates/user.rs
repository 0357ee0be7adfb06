//! User Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    #[sqlx(json)]
    pub address: Option<Address>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Zip code is required"))]
    pub zip_code: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
}

/// Fields a user may change on their own profile.
#[derive(Clone, Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
}

impl User {
    pub fn register(name: impl Into<String>, email: impl Into<String>, password_hash: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), name: name.into(), email: email.into(), password_hash, role,
            address: None, phone: None, is_active: true, created_at: now, updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool { self.role == Role::Admin }

    pub fn apply_profile(&mut self, changes: ProfileChanges) {
        if let Some(name) = changes.name { self.name = name; }
        if let Some(phone) = changes.phone { self.phone = Some(phone); }
        if let Some(address) = changes.address { self.address = Some(address); }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_defaults() {
        let user = User::register("Jane", "jane@example.com", "hash".into(), Role::User);
        assert!(user.is_active);
        assert!(!user.is_admin());
        assert!(user.address.is_none());
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User::register("Jane", "jane@example.com", "secret-hash".into(), Role::Admin);
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "admin");
        assert_eq!(json["isActive"], true);
    }

    #[test]
    fn test_apply_profile_keeps_unset_fields() {
        let mut user = User::register("Jane", "jane@example.com", "h".into(), Role::User);
        user.apply_profile(ProfileChanges { phone: Some("5550001111".into()), ..Default::default() });
        assert_eq!(user.name, "Jane");
        assert_eq!(user.phone.as_deref(), Some("5550001111"));
    }
}
