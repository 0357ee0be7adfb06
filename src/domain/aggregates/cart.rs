//! Cart Aggregate
//!
//! One cart per user. Each line captures the product price at the time it was
//! added; `total_amount` is recomputed after every mutation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::Product;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    id: Uuid,
    user_id: Uuid,
    #[sqlx(json)]
    items: Vec<CartItem>,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal { self.price * Decimal::from(self.quantity) }
}

impl Cart {
    pub fn for_user(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), user_id, items: vec![], total_amount: Decimal::ZERO, created_at: now, updated_at: now }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn total_amount(&self) -> Decimal { self.total_amount }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Add `quantity` of `product`, merging into an existing line.
    ///
    /// The merged quantity is checked against live stock; on error the cart is
    /// left untouched.
    pub fn add_item(&mut self, product: &Product, quantity: i32) -> Result<(), CartError> {
        if !product.is_active { return Err(CartError::ProductUnavailable); }
        if quantity < 1 { return Err(CartError::InvalidQuantity); }
        let existing = self.items.iter().position(|i| i.product_id == product.id);
        let wanted = existing
            .and_then(|idx| self.items.get(idx))
            .map_or(quantity, |line| line.quantity.saturating_add(quantity));
        if !product.covers(wanted) {
            return Err(CartError::InsufficientStock { available: product.stock });
        }
        match existing.and_then(|idx| self.items.get_mut(idx)) {
            Some(line) => line.quantity = wanted,
            None => self.items.push(CartItem { product_id: product.id, quantity, price: product.price }),
        }
        self.recalculate();
        Ok(())
    }

    /// Set a line's quantity; zero removes the line.
    pub fn set_quantity(&mut self, product_id: Uuid, quantity: i32, available: i32) -> Result<(), CartError> {
        if quantity < 0 { return Err(CartError::InvalidQuantity); }
        let idx = self.items.iter().position(|i| i.product_id == product_id).ok_or(CartError::ItemNotFound)?;
        if quantity == 0 {
            self.items.remove(idx);
        } else {
            if available < quantity { return Err(CartError::InsufficientStock { available: available.max(0) }); }
            if let Some(line) = self.items.get_mut(idx) { line.quantity = quantity; }
        }
        self.recalculate();
        Ok(())
    }

    /// Remove a line. Returns whether a line was removed.
    pub fn remove_item(&mut self, product_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        self.recalculate();
        self.items.len() != before
    }

    pub fn clear(&mut self) { self.items.clear(); self.recalculate(); }

    /// Drop lines whose product is no longer purchasable. Returns how many
    /// lines were dropped.
    pub fn prune(&mut self, is_live: impl Fn(Uuid) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|i| is_live(i.product_id));
        let pruned = before - self.items.len();
        if pruned > 0 { self.recalculate(); }
        pruned
    }

    fn recalculate(&mut self) {
        self.total_amount = self.items.iter().map(CartItem::line_total).sum();
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Product not found or inactive")]
    ProductUnavailable,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Only {available} items available in stock")]
    InsufficientStock { available: i32 },
    #[error("Item not found in cart")]
    ItemNotFound,
}
