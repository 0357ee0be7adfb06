//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::Sku;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub category_id: Uuid,
    pub images: Vec<String>,
    pub stock: i32,
    pub sku: String,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`Product::create`].
#[derive(Clone, Debug)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub category_id: Uuid,
    pub images: Vec<String>,
    pub stock: i32,
    pub sku: Sku,
    pub tags: Vec<String>,
    pub featured: bool,
}

/// Partial update applied by admins; `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub original_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub images: Option<Vec<String>>,
    pub stock: Option<i32>,
    pub sku: Option<Sku>,
    pub tags: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub featured: Option<bool>,
}

impl Product {
    pub fn create(new: NewProduct) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), name: new.name, description: new.description, price: new.price,
            original_price: new.original_price, category_id: new.category_id, images: new.images,
            stock: new.stock.max(0), sku: new.sku.into_inner(), tags: new.tags, is_active: true,
            featured: new.featured, created_at: now, updated_at: now,
        }
    }

    pub fn primary_image(&self) -> &str { self.images.first().map(String::as_str).unwrap_or("") }

    /// Whether `quantity` units can currently be sold.
    pub fn covers(&self, quantity: i32) -> bool { self.stock >= quantity }

    pub fn remove_stock(&mut self, quantity: i32) -> Result<(), ProductError> {
        if !self.covers(quantity) {
            return Err(ProductError::InsufficientStock { available: self.stock });
        }
        self.stock -= quantity;
        self.touch();
        Ok(())
    }

    pub fn add_stock(&mut self, quantity: i32) { self.stock = self.stock.saturating_add(quantity); self.touch(); }

    pub fn apply(&mut self, changes: ProductChanges) {
        if let Some(v) = changes.name { self.name = v; }
        if let Some(v) = changes.description { self.description = v; }
        if let Some(v) = changes.price { self.price = v; }
        if let Some(v) = changes.original_price { self.original_price = Some(v); }
        if let Some(v) = changes.category_id { self.category_id = v; }
        if let Some(v) = changes.images { self.images = v; }
        if let Some(v) = changes.stock { self.stock = v.max(0); }
        if let Some(v) = changes.sku { self.sku = v.into_inner(); }
        if let Some(v) = changes.tags { self.tags = v; }
        if let Some(v) = changes.is_active { self.is_active = v; }
        if let Some(v) = changes.featured { self.featured = v; }
        self.touch();
    }

    pub fn deactivate(&mut self) { self.is_active = false; self.touch(); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProductError {
    #[error("Only {available} items available in stock")]
    InsufficientStock { available: i32 },
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn product(name: &str, price: i64, stock: i32) -> Product {
        Product::create(NewProduct {
            name: name.into(),
            description: format!("{name} description"),
            price: Decimal::from(price),
            original_price: None,
            category_id: Uuid::now_v7(),
            images: vec![format!("https://img.example.com/{name}.png")],
            stock,
            sku: Sku::new(format!("sku-{name}")).unwrap(),
            tags: vec![],
            featured: false,
        })
    }

    #[test]
    fn test_product_create() {
        let p = product("Widget", 10, 5);
        assert_eq!(p.sku, "SKU-WIDGET");
        assert!(p.is_active);
        assert_eq!(p.primary_image(), "https://img.example.com/Widget.png");
    }

    #[test]
    fn test_stock() {
        let mut p = product("Widget", 10, 5);
        p.remove_stock(3).unwrap();
        assert_eq!(p.stock, 2);
        assert_eq!(p.remove_stock(3), Err(ProductError::InsufficientStock { available: 2 }));
        assert_eq!(p.stock, 2);
        p.add_stock(3);
        assert_eq!(p.stock, 5);
    }

    #[test]
    fn test_apply_partial_changes() {
        let mut p = product("Widget", 10, 5);
        p.apply(ProductChanges { price: Some(Decimal::from(12)), stock: Some(-4), ..Default::default() });
        assert_eq!(p.price, Decimal::from(12));
        assert_eq!(p.stock, 0);
        assert_eq!(p.name, "Widget");
    }
}
