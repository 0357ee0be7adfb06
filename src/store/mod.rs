//! Persistence for users, the catalog, carts and orders.
//!
//! The traits are split by aggregate; [`Store`] is the union every backend
//! implements. Two backends exist:
//!
//! - [`PgStore`] - `PostgreSQL` via sqlx, used whenever `DATABASE_URL` is set
//! - [`MemoryStore`] - process-local maps, used by tests and local runs
//!
//! Stock adjustments are conditional: a decrement only succeeds when the
//! product still has enough stock, and an order placement (decrement every
//! line, insert the order, empty the cart) either fully applies or not at all.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Category, Order, OrderStatus, Product, User};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A conditional stock decrement failed.
    #[error("Insufficient stock for product {product_id} ({available} available)")]
    InsufficientStock { product_id: Uuid, available: i32 },

    /// The row changed underneath a conditional update.
    #[error("Stale write: {0}")]
    Stale(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// One-based page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self { Self { page: page.max(1), limit: limit.max(1) } }
    pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.limit) }
}

#[derive(Clone, Debug, Default)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Case-insensitive match against name, description and tags.
    pub search: Option<String>,
    pub featured_only: bool,
    pub sort: ProductSort,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProductSort {
    #[default]
    NewestFirst,
    OldestFirst,
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
}

impl FromStr for ProductSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-createdAt" => Ok(Self::NewestFirst),
            "createdAt" => Ok(Self::OldestFirst),
            "price" => Ok(Self::PriceAsc),
            "-price" => Ok(Self::PriceDesc),
            "name" => Ok(Self::NameAsc),
            "-name" => Ok(Self::NameDesc),
            other => Err(format!("unsupported sort '{other}'")),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError>;
    async fn category_by_id(&self, id: Uuid) -> Result<Option<Category>, StoreError>;
    /// Case-insensitive lookup, active or not.
    async fn category_by_name(&self, name: &str) -> Result<Option<Category>, StoreError>;
    /// Active categories ordered by name.
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;
    async fn update_category(&self, category: &Category) -> Result<(), StoreError>;

    /// Fails with [`StoreError::Conflict`] when the SKU is taken.
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;
    async fn product_by_id(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
    async fn product_by_sku(&self, sku: &str) -> Result<Option<Product>, StoreError>;
    async fn products_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError>;
    /// Active products matching `filter`, plus the total match count.
    async fn list_products(&self, filter: &ProductFilter, page: PageRequest) -> Result<(Vec<Product>, u64), StoreError>;
    /// Write every column except `stock`, which only moves through
    /// [`CatalogStore::set_stock`] and the order operations.
    async fn update_product(&self, product: &Product) -> Result<(), StoreError>;
    /// Overwrite the stock level of one product.
    async fn set_stock(&self, id: Uuid, stock: i32) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn cart_for_user(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError>;
    /// Insert or replace the user's cart.
    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Decrement stock for every line, insert the order and drop the ordered
    /// products from the owner's cart as one unit.
    async fn place_order(&self, order: &Order) -> Result<(), StoreError>;
    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    /// Matching orders, newest first, plus the total match count.
    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> Result<(Vec<Order>, u64), StoreError>;
    /// Persist a non-cancelling status change. Cancelled orders are never
    /// overwritten.
    async fn update_order_status(&self, order: &Order) -> Result<(), StoreError>;
    /// Mark the order cancelled, provided it is still pending or confirmed,
    /// and restore stock for every line.
    async fn cancel_order(&self, order: &Order) -> Result<(), StoreError>;
}

pub trait Store: UserStore + CatalogStore + CartStore + OrderStore {}

impl<T> Store for T where T: UserStore + CatalogStore + CartStore + OrderStore {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request() {
        assert_eq!(PageRequest::new(0, 0), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
    }

    #[test]
    fn test_product_sort_parse() {
        assert_eq!("-price".parse::<ProductSort>(), Ok(ProductSort::PriceDesc));
        assert_eq!("createdAt".parse::<ProductSort>(), Ok(ProductSort::OldestFirst));
        assert!("rating".parse::<ProductSort>().is_err());
    }
}
