//! In-memory store.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    CartStore, CatalogStore, OrderFilter, OrderStore, PageRequest, ProductFilter, ProductSort, StoreError, UserStore,
};
use crate::domain::aggregates::{Cart, Category, Order, OrderStatus, Product, User};

/// Store backed by hash maps behind a single lock.
///
/// Every multi-row operation runs under one write guard, which gives the same
/// all-or-nothing behaviour as a database transaction.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    categories: HashMap<Uuid, Category>,
    products: HashMap<Uuid, Product>,
    carts: HashMap<Uuid, Cart>,
    orders: HashMap<Uuid, Order>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

fn paginate<T>(rows: Vec<T>, page: PageRequest) -> (Vec<T>, u64) {
    let total = rows.len() as u64;
    let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let rows = rows.into_iter().skip(skip).take(page.limit as usize).collect();
    (rows, total)
}

fn compare_products(sort: ProductSort, a: &Product, b: &Product) -> Ordering {
    match sort {
        ProductSort::NewestFirst => (b.created_at, b.id).cmp(&(a.created_at, a.id)),
        ProductSort::OldestFirst => (a.created_at, a.id).cmp(&(b.created_at, b.id)),
        ProductSort::PriceAsc => a.price.cmp(&b.price),
        ProductSort::PriceDesc => b.price.cmp(&a.price),
        ProductSort::NameAsc => a.name.cmp(&b.name),
        ProductSort::NameDesc => b.name.cmp(&a.name),
    }
}

fn matches_filter(filter: &ProductFilter, p: &Product) -> bool {
    let needle = filter.search.as_deref().map(str::to_lowercase);
    p.is_active
        && filter.category_id.map_or(true, |c| p.category_id == c)
        && filter.min_price.map_or(true, |min| p.price >= min)
        && filter.max_price.map_or(true, |max| p.price <= max)
        && (!filter.featured_only || p.featured)
        && needle.map_or(true, |n| {
            p.name.to_lowercase().contains(&n)
                || p.description.to_lowercase().contains(&n)
                || p.tags.iter().any(|t| t.to_lowercase().contains(&n))
        })
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email already exists".into()));
        }
        t.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        self.tables.write().await.users.insert(user.id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.categories.values().any(|c| c.name.eq_ignore_ascii_case(&category.name)) {
            return Err(StoreError::Conflict("category name already exists".into()));
        }
        t.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn category_by_id(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn category_by_name(&self, name: &str) -> Result<Option<Category>, StoreError> {
        Ok(self.tables.read().await.categories.values().find(|c| c.name.eq_ignore_ascii_case(name)).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let t = self.tables.read().await;
        let mut rows: Vec<Category> = t.categories.values().filter(|c| c.is_active).cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn update_category(&self, category: &Category) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.categories.values().any(|c| c.id != category.id && c.name.eq_ignore_ascii_case(&category.name)) {
            return Err(StoreError::Conflict("category name already exists".into()));
        }
        t.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.products.values().any(|p| p.sku == product.sku) {
            return Err(StoreError::Conflict("sku already exists".into()));
        }
        t.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn product_by_id(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn product_by_sku(&self, sku: &str) -> Result<Option<Product>, StoreError> {
        Ok(self.tables.read().await.products.values().find(|p| p.sku == sku).cloned())
    }

    async fn products_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError> {
        let t = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| t.products.get(id).cloned()).collect())
    }

    async fn list_products(&self, filter: &ProductFilter, page: PageRequest) -> Result<(Vec<Product>, u64), StoreError> {
        let t = self.tables.read().await;
        let mut rows: Vec<Product> = t.products.values().filter(|p| matches_filter(filter, p)).cloned().collect();
        rows.sort_by(|a, b| compare_products(filter.sort, a, b));
        Ok(paginate(rows, page))
    }

    async fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.products.values().any(|p| p.id != product.id && p.sku == product.sku) {
            return Err(StoreError::Conflict("sku already exists".into()));
        }
        let mut row = product.clone();
        if let Some(current) = t.products.get(&product.id) {
            row.stock = current.stock;
        }
        t.products.insert(product.id, row);
        Ok(())
    }

    async fn set_stock(&self, id: Uuid, stock: i32) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let product = t.products.get_mut(&id).ok_or_else(|| StoreError::Stale(format!("product {id} does not exist")))?;
        product.stock = stock.max(0);
        Ok(())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn cart_for_user(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        Ok(self.tables.read().await.carts.get(&user_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        self.tables.write().await.carts.insert(cart.user_id(), cart.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn place_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.orders.values().any(|o| o.order_number() == order.order_number()) {
            return Err(StoreError::Conflict("order number already exists".into()));
        }
        // Check every line before touching anything.
        for item in order.items() {
            let available = t.products.get(&item.product_id).map_or(0, |p| p.stock);
            if available < item.quantity {
                return Err(StoreError::InsufficientStock { product_id: item.product_id, available });
            }
        }
        for item in order.items() {
            if let Some(product) = t.products.get_mut(&item.product_id) {
                product
                    .remove_stock(item.quantity)
                    .map_err(|_| StoreError::InsufficientStock { product_id: item.product_id, available: product.stock })?;
            }
        }
        t.orders.insert(order.id(), order.clone());
        if let Some(cart) = t.carts.get_mut(&order.user_id()) {
            cart.prune(|id| !order.contains_product(id));
        }
        Ok(())
    }

    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> Result<(Vec<Order>, u64), StoreError> {
        let t = self.tables.read().await;
        let mut rows: Vec<Order> = t
            .orders
            .values()
            .filter(|o| filter.user_id.map_or(true, |u| o.user_id() == u))
            .filter(|o| filter.status.map_or(true, |s| o.status() == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at(), b.id()).cmp(&(a.created_at(), a.id())));
        Ok(paginate(rows, page))
    }

    async fn update_order_status(&self, order: &Order) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        match t.orders.get(&order.id()) {
            Some(current) if current.status() == OrderStatus::Cancelled => {
                Err(StoreError::Stale(format!("order {} is cancelled", order.id())))
            }
            Some(_) => {
                t.orders.insert(order.id(), order.clone());
                Ok(())
            }
            None => Err(StoreError::Stale(format!("order {} does not exist", order.id()))),
        }
    }

    async fn cancel_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let cancellable = t.orders.get(&order.id()).is_some_and(|o| o.status().is_cancellable());
        if !cancellable {
            return Err(StoreError::Stale(format!("order {} can no longer be cancelled", order.id())));
        }
        for item in order.items() {
            if let Some(product) = t.products.get_mut(&item.product_id) {
                product.add_stock(item.quantity);
            }
        }
        t.orders.insert(order.id(), order.clone());
        Ok(())
    }
}
