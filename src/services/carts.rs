//! Per-user shopping carts.
//!
//! Every read prunes lines whose product was deleted or deactivated, and every
//! mutation is validated against live stock before the cart is persisted. A
//! rejected mutation never reaches the store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartError, Product};
use crate::error::{AppError, Result};
use crate::store::Store;

const CART_NOT_FOUND: &str = "Cart not found";

/// Cart as returned to clients, with each line's product populated.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartLineView>,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub product: ProductSummary,
    pub quantity: i32,
    /// Price captured when the line was added.
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub images: Vec<String>,
    pub stock: i32,
    pub is_active: bool,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        Self { id: p.id, name: p.name.clone(), price: p.price, images: p.images.clone(), stock: p.stock, is_active: p.is_active }
    }
}

impl CartView {
    fn build(cart: &Cart, products: &HashMap<Uuid, Product>) -> Self {
        let items = cart
            .items()
            .iter()
            .filter_map(|line| {
                products.get(&line.product_id).map(|p| CartLineView {
                    product: ProductSummary::from(p),
                    quantity: line.quantity,
                    price: line.price,
                })
            })
            .collect();
        Self {
            id: cart.id(),
            user_id: cart.user_id(),
            items,
            total_amount: cart.total_amount(),
            created_at: cart.created_at(),
            updated_at: cart.updated_at(),
        }
    }
}

pub struct CartService<'a> {
    store: &'a dyn Store,
}

impl<'a> CartService<'a> {
    pub fn new(store: &'a dyn Store) -> Self { Self { store } }

    /// Get the user's cart, creating an empty one on first access.
    pub async fn get(&self, user_id: Uuid) -> Result<CartView> {
        let (cart, products) = self.load_or_create(user_id).await?;
        Ok(CartView::build(&cart, &products))
    }

    #[instrument(skip(self))]
    pub async fn add(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<CartView> {
        let product = self
            .store
            .product_by_id(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(CartError::ProductUnavailable)?;
        let (mut cart, mut products) = self.load_or_create(user_id).await?;
        cart.add_item(&product, quantity)?;
        self.store.save_cart(&cart).await.map_err(AppError::store("Server error while adding item to cart"))?;
        products.insert(product.id, product);
        Ok(CartView::build(&cart, &products))
    }

    /// Set a line's quantity; zero removes the line.
    #[instrument(skip(self))]
    pub async fn update(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<CartView> {
        let (mut cart, products) = self.load_existing(user_id).await?;
        let available = products.get(&product_id).map_or(0, |p| p.stock);
        cart.set_quantity(product_id, quantity, available)?;
        self.store.save_cart(&cart).await.map_err(AppError::store("Server error while updating cart"))?;
        Ok(CartView::build(&cart, &products))
    }

    /// Remove a line. Removing a product that is not in the cart is a no-op.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: Uuid, product_id: Uuid) -> Result<CartView> {
        let (mut cart, products) = self.load_existing(user_id).await?;
        if cart.remove_item(product_id) {
            self.store.save_cart(&cart).await.map_err(AppError::store("Server error while removing item from cart"))?;
        }
        Ok(CartView::build(&cart, &products))
    }

    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<CartView> {
        let (mut cart, products) = self.load_existing(user_id).await?;
        cart.clear();
        self.store.save_cart(&cart).await.map_err(AppError::store("Server error while clearing cart"))?;
        Ok(CartView::build(&cart, &products))
    }

    async fn load_or_create(&self, user_id: Uuid) -> Result<(Cart, HashMap<Uuid, Product>)> {
        if let Some(loaded) = self.load(user_id).await? {
            return Ok(loaded);
        }
        let cart = Cart::for_user(user_id);
        self.store.save_cart(&cart).await.map_err(AppError::store("Server error while fetching cart"))?;
        Ok((cart, HashMap::new()))
    }

    async fn load_existing(&self, user_id: Uuid) -> Result<(Cart, HashMap<Uuid, Product>)> {
        self.load(user_id).await?.ok_or_else(|| AppError::not_found(CART_NOT_FOUND))
    }

    async fn load(&self, user_id: Uuid) -> Result<Option<(Cart, HashMap<Uuid, Product>)>> {
        let Some(cart) = self.store.cart_for_user(user_id).await? else {
            return Ok(None);
        };
        let (cart, products) = prune_cart(self.store, cart).await?;
        Ok(Some((cart, products)))
    }
}

/// Drop lines whose product is gone or inactive, persisting the cart when
/// anything was dropped. Returns the live products keyed by id.
pub(crate) async fn prune_cart(store: &dyn Store, mut cart: Cart) -> Result<(Cart, HashMap<Uuid, Product>)> {
    let ids: Vec<Uuid> = cart.items().iter().map(|i| i.product_id).collect();
    let products: HashMap<Uuid, Product> = store
        .products_by_ids(&ids)
        .await?
        .into_iter()
        .filter(|p| p.is_active)
        .map(|p| (p.id, p))
        .collect();
    let pruned = cart.prune(|id| products.contains_key(&id));
    if pruned > 0 {
        debug!(cart_id = %cart.id(), pruned, "dropped unavailable cart lines");
        store.save_cart(&cart).await?;
    }
    Ok((cart, products))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::NewProduct;
    use crate::domain::value_objects::Sku;
    use crate::store::{CartStore, CatalogStore, MemoryStore};
    use axum::http::StatusCode;

    async fn seed(store: &MemoryStore, name: &str, price: i64, stock: i32) -> Product {
        let product = Product::create(NewProduct {
            name: name.into(),
            description: format!("{name} description text"),
            price: Decimal::from(price),
            original_price: None,
            category_id: Uuid::now_v7(),
            images: vec![],
            stock,
            sku: Sku::new(format!("SKU-{name}")).unwrap(),
            tags: vec![],
            featured: false,
        });
        store.insert_product(&product).await.unwrap();
        product
    }

    #[tokio::test]
    async fn test_get_creates_empty_cart() {
        let store = MemoryStore::new();
        let user = Uuid::now_v7();
        let view = CartService::new(&store).get(user).await.unwrap();
        assert!(view.items.is_empty());
        assert_eq!(view.total_amount, Decimal::ZERO);
        assert!(store.cart_for_user(user).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_over_stock_add_leaves_cart_unchanged() {
        let store = MemoryStore::new();
        let carts = CartService::new(&store);
        let user = Uuid::now_v7();
        let a = seed(&store, "A", 10, 5).await;

        let view = carts.add(user, a.id, 2).await.unwrap();
        assert_eq!(view.total_amount, Decimal::from(20));

        let err = carts.add(user, a.id, 10).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Only 5 items available in stock");

        let stored = store.cart_for_user(user).await.unwrap().unwrap();
        assert_eq!(stored.total_amount(), Decimal::from(20));
        assert_eq!(stored.items()[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_update_remove_and_clear() {
        let store = MemoryStore::new();
        let carts = CartService::new(&store);
        let user = Uuid::now_v7();
        let a = seed(&store, "A", 10, 5).await;
        let b = seed(&store, "B", 5, 3).await;

        assert_eq!(carts.update(user, a.id, 1).await.unwrap_err().to_string(), CART_NOT_FOUND);

        carts.add(user, a.id, 1).await.unwrap();
        carts.add(user, b.id, 1).await.unwrap();
        let view = carts.update(user, b.id, 3).await.unwrap();
        assert_eq!(view.total_amount, Decimal::from(25));
        assert!(carts.update(user, b.id, 4).await.is_err());

        let view = carts.update(user, b.id, 0).await.unwrap();
        assert_eq!(view.items.len(), 1);
        let view = carts.remove(user, Uuid::now_v7()).await.unwrap();
        assert_eq!(view.items.len(), 1);
        let view = carts.clear(user).await.unwrap();
        assert!(view.items.is_empty());
        assert_eq!(view.total_amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_inactive_products_pruned_on_read() {
        let store = MemoryStore::new();
        let carts = CartService::new(&store);
        let user = Uuid::now_v7();
        let a = seed(&store, "A", 10, 5).await;
        let mut b = seed(&store, "B", 5, 3).await;
        carts.add(user, a.id, 1).await.unwrap();
        carts.add(user, b.id, 2).await.unwrap();

        b.deactivate();
        store.update_product(&b).await.unwrap();

        let view = carts.get(user).await.unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.total_amount, Decimal::from(10));
        let stored = store.cart_for_user(user).await.unwrap().unwrap();
        assert_eq!(stored.items().len(), 1);

        let err = carts.add(user, b.id, 1).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
