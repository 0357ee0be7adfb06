//! Category Aggregate

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
}

impl Category {
    pub fn create(name: impl Into<String>, description: Option<String>, image: Option<String>) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), name: name.into(), description, image, is_active: true, created_at: now, updated_at: now }
    }

    pub fn apply(&mut self, changes: CategoryChanges) {
        if let Some(v) = changes.name { self.name = v; }
        if let Some(v) = changes.description { self.description = Some(v); }
        if let Some(v) = changes.image { self.image = Some(v); }
        if let Some(v) = changes.is_active { self.is_active = v; }
        self.touch();
    }

    pub fn deactivate(&mut self) { self.is_active = false; self.touch(); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_and_deactivate() {
        let mut category = Category::create("Shoes", None, None);
        category.apply(CategoryChanges { description: Some("Footwear".into()), ..Default::default() });
        assert_eq!(category.name, "Shoes");
        assert_eq!(category.description.as_deref(), Some("Footwear"));
        category.deactivate();
        assert!(!category.is_active);
    }
}
