//! Checkout and order lifecycle.

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Checkout, Order, OrderError, OrderStatus, User};
use crate::error::{AppError, Result};
use crate::messaging::EventPublisher;
use crate::services::carts::prune_cart;
use crate::store::{OrderFilter, PageRequest, Store, StoreError};

const ORDER_NOT_FOUND: &str = "Order not found";

pub struct OrderService<'a> {
    store: &'a dyn Store,
    events: &'a EventPublisher,
}

impl<'a> OrderService<'a> {
    pub fn new(store: &'a dyn Store, events: &'a EventPublisher) -> Self { Self { store, events } }

    /// Turn the user's cart into an order.
    ///
    /// Stock is decremented for every line, the order inserted and the
    /// ordered lines removed from the cart as one store operation; if any
    /// line has run out in the meantime nothing is written.
    #[instrument(skip(self, checkout), fields(payment_method = ?checkout.payment_method))]
    pub async fn place(&self, user_id: Uuid, checkout: Checkout) -> Result<Order> {
        let cart = self.store.cart_for_user(user_id).await?.ok_or(OrderError::EmptyCart)?;
        let (cart, products) = prune_cart(self.store, cart).await?;
        let mut order = Order::place(&cart, &products, checkout)?;

        self.store.place_order(&order).await.map_err(|e| match e {
            StoreError::InsufficientStock { product_id, .. } => {
                let name = products.get(&product_id).map_or_else(|| product_id.to_string(), |p| p.name.clone());
                AppError::from(OrderError::InsufficientStock { product_id, name })
            }
            other => AppError::store("Server error while creating order")(other),
        })?;

        info!(order_id = %order.id(), order_number = %order.order_number(), total = %order.total_amount(), "order placed");
        self.events.publish_all(order.take_events()).await;
        Ok(order)
    }

    /// Fetch an order visible to `viewer`: their own, or any order for admins.
    pub async fn get(&self, viewer: &User, id: Uuid) -> Result<Order> {
        self.store
            .order_by_id(id)
            .await
            .map_err(AppError::store("Server error while fetching order"))?
            .filter(|o| viewer.is_admin() || o.is_owned_by(viewer.id))
            .ok_or_else(|| AppError::not_found(ORDER_NOT_FOUND))
    }

    pub async fn list_for_user(&self, user_id: Uuid, page: PageRequest) -> Result<(Vec<Order>, u64)> {
        let filter = OrderFilter { user_id: Some(user_id), status: None };
        self.store.list_orders(&filter, page).await.map_err(AppError::store("Server error while fetching orders"))
    }

    pub async fn list_all(&self, status: Option<OrderStatus>, page: PageRequest) -> Result<(Vec<Order>, u64)> {
        let filter = OrderFilter { user_id: None, status };
        self.store.list_orders(&filter, page).await.map_err(AppError::store("Server error while fetching orders"))
    }

    /// Customer cancellation of their own order; restores stock.
    #[instrument(skip(self))]
    pub async fn cancel(&self, user_id: Uuid, id: Uuid) -> Result<Order> {
        let mut order = self
            .store
            .order_by_id(id)
            .await?
            .filter(|o| o.is_owned_by(user_id))
            .ok_or_else(|| AppError::not_found(ORDER_NOT_FOUND))?;
        order.cancel()?;
        self.persist_cancel(&order).await?;
        info!(order_id = %order.id(), "order cancelled");
        self.events.publish_all(order.take_events()).await;
        Ok(order)
    }

    /// Admin status change. Setting `cancelled` follows the cancellation rule
    /// and restores stock.
    #[instrument(skip(self))]
    pub async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order> {
        let mut order = self.store.order_by_id(id).await?.ok_or_else(|| AppError::not_found(ORDER_NOT_FOUND))?;
        let from = order.status();
        order.set_status(status)?;

        if from == order.status() {
            return Ok(order);
        }
        if order.status() == OrderStatus::Cancelled {
            self.persist_cancel(&order).await?;
        } else {
            self.store.update_order_status(&order).await.map_err(|e| match e {
                StoreError::Stale(_) => AppError::from(OrderError::AlreadyCancelled),
                other => AppError::store("Server error while updating order status")(other),
            })?;
        }
        info!(order_id = %order.id(), %from, to = %order.status(), "order status updated");
        self.events.publish_all(order.take_events()).await;
        Ok(order)
    }

    async fn persist_cancel(&self, order: &Order) -> Result<()> {
        self.store.cancel_order(order).await.map_err(|e| match e {
            StoreError::Stale(reason) => {
                warn!(order_id = %order.id(), %reason, "order changed before cancellation");
                AppError::bad_request(OrderError::CannotCancel(order.status()).to_string())
            }
            other => AppError::store("Server error while cancelling order")(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{NewProduct, PaymentMethod, PaymentStatus, Product, ProductChanges, ShippingAddress};
    use crate::domain::value_objects::Sku;
    use crate::services::carts::CartService;
    use crate::store::{CartStore, CatalogStore, MemoryStore, OrderStore};
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use std::collections::{HashMap, HashSet};

    async fn seed(store: &MemoryStore, name: &str, price: i64, stock: i32) -> Product {
        let product = Product::create(NewProduct {
            name: name.into(),
            description: format!("{name} description text"),
            price: Decimal::from(price),
            original_price: None,
            category_id: Uuid::now_v7(),
            images: vec![format!("https://img.example.com/{name}.jpg")],
            stock,
            sku: Sku::new(format!("SKU-{name}")).unwrap(),
            tags: vec![],
            featured: false,
        });
        store.insert_product(&product).await.unwrap();
        product
    }

    fn checkout(method: PaymentMethod) -> Checkout {
        Checkout {
            payment_method: method,
            payment_id: None,
            shipping_address: ShippingAddress {
                name: "Jane Doe".into(),
                street: "12 Park Street".into(),
                city: "Pune".into(),
                state: "MH".into(),
                zip_code: "411001".into(),
                country: "India".into(),
                phone: "9876543210".into(),
            },
        }
    }

    fn customer(id: Uuid) -> User {
        let mut user = User::register("Jane", "jane@example.com", "hash".into(), crate::domain::aggregates::Role::User);
        user.id = id;
        user
    }

    async fn stock_of(store: &MemoryStore, id: Uuid) -> i32 {
        store.product_by_id(id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_place_decrements_stock_and_clears_cart() {
        let store = MemoryStore::new();
        let events = EventPublisher::disabled();
        let user = Uuid::now_v7();
        let a = seed(&store, "A", 10, 5).await;
        let b = seed(&store, "B", 5, 3).await;
        let carts = CartService::new(&store);
        carts.add(user, a.id, 2).await.unwrap();
        carts.add(user, b.id, 1).await.unwrap();

        let order = OrderService::new(&store, &events).place(user, checkout(PaymentMethod::Cod)).await.unwrap();
        assert_eq!(order.total_amount(), Decimal::from(25));
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert_eq!(stock_of(&store, a.id).await, 3);
        assert_eq!(stock_of(&store, b.id).await, 2);
        let cart = store.cart_for_user(user).await.unwrap().unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.total_amount(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_place_rejects_empty_and_short_stock() {
        let store = MemoryStore::new();
        let events = EventPublisher::disabled();
        let orders = OrderService::new(&store, &events);
        let user = Uuid::now_v7();
        assert_eq!(orders.place(user, checkout(PaymentMethod::Cod)).await.unwrap_err().to_string(), "Cart is empty");

        let a = seed(&store, "A", 10, 5).await;
        CartService::new(&store).add(user, a.id, 4).await.unwrap();
        store.set_stock(a.id, 2).await.unwrap();

        let err = orders.place(user, checkout(PaymentMethod::Cod)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Insufficient stock for A");
        assert_eq!(stock_of(&store, a.id).await, 2);
        assert_eq!(store.cart_for_user(user).await.unwrap().unwrap().items().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_restores_stock() {
        let store = MemoryStore::new();
        let events = EventPublisher::disabled();
        let orders = OrderService::new(&store, &events);
        let user = Uuid::now_v7();
        let a = seed(&store, "A", 10, 5).await;
        CartService::new(&store).add(user, a.id, 2).await.unwrap();
        let order = orders.place(user, checkout(PaymentMethod::Razorpay)).await.unwrap();
        assert_eq!(stock_of(&store, a.id).await, 3);

        assert_eq!(orders.cancel(Uuid::now_v7(), order.id()).await.unwrap_err().status(), StatusCode::NOT_FOUND);
        let cancelled = orders.cancel(user, order.id()).await.unwrap();
        assert_eq!(cancelled.status(), OrderStatus::Cancelled);
        assert_eq!(stock_of(&store, a.id).await, 5);

        let err = orders.cancel(user, order.id()).await.unwrap_err();
        assert_eq!(err.to_string(), "Order cannot be cancelled at this stage");
        assert_eq!(stock_of(&store, a.id).await, 5);
    }

    #[tokio::test]
    async fn test_admin_status_updates() {
        let store = MemoryStore::new();
        let events = EventPublisher::disabled();
        let orders = OrderService::new(&store, &events);
        let user = Uuid::now_v7();
        let a = seed(&store, "A", 10, 5).await;
        CartService::new(&store).add(user, a.id, 1).await.unwrap();
        let order = orders.place(user, checkout(PaymentMethod::Cod)).await.unwrap();

        let shipped = orders.update_status(order.id(), OrderStatus::Shipped).await.unwrap();
        assert_eq!(shipped.status(), OrderStatus::Shipped);
        let err = orders.update_status(order.id(), OrderStatus::Cancelled).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        orders.update_status(order.id(), OrderStatus::Confirmed).await.unwrap();
        orders.update_status(order.id(), OrderStatus::Cancelled).await.unwrap();
        assert_eq!(stock_of(&store, a.id).await, 5);
        assert!(orders.update_status(order.id(), OrderStatus::Delivered).await.is_err());

        let stored = orders.get(&customer(user), order.id()).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::Cancelled);
        assert!(orders.get(&customer(Uuid::now_v7()), order.id()).await.is_err());
    }

    #[tokio::test]
    async fn test_order_numbers_unique_and_listing() {
        let store = MemoryStore::new();
        let events = EventPublisher::disabled();
        let orders = OrderService::new(&store, &events);
        let carts = CartService::new(&store);
        let user = Uuid::now_v7();
        let a = seed(&store, "A", 1, 100).await;

        let mut numbers = HashSet::new();
        for _ in 0..25 {
            carts.add(user, a.id, 1).await.unwrap();
            let order = orders.place(user, checkout(PaymentMethod::Cod)).await.unwrap();
            assert!(numbers.insert(order.order_number().clone()));
        }
        assert_eq!(stock_of(&store, a.id).await, 75);

        let (page, total) = orders.list_for_user(user, PageRequest::new(2, 10)).await.unwrap();
        assert_eq!(total, 25);
        assert_eq!(page.len(), 10);
        let (pending, _) = orders.list_all(Some(OrderStatus::Pending), PageRequest::new(1, 20)).await.unwrap();
        assert_eq!(pending.len(), 20);
        let (shipped, total) = orders.list_all(Some(OrderStatus::Shipped), PageRequest::new(1, 20)).await.unwrap();
        assert!(shipped.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_stale_product_write_keeps_order_decrement() {
        let store = MemoryStore::new();
        let events = EventPublisher::disabled();
        let user = Uuid::now_v7();
        let a = seed(&store, "A", 10, 5).await;
        let mut snapshot = store.product_by_id(a.id).await.unwrap().unwrap();

        CartService::new(&store).add(user, a.id, 2).await.unwrap();
        OrderService::new(&store, &events).place(user, checkout(PaymentMethod::Cod)).await.unwrap();
        assert_eq!(stock_of(&store, a.id).await, 3);

        snapshot.apply(ProductChanges { name: Some("Renamed".into()), ..Default::default() });
        store.update_product(&snapshot).await.unwrap();
        let stored = store.product_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Renamed");
        assert_eq!(stored.stock, 3);
    }

    #[tokio::test]
    async fn test_place_keeps_lines_added_after_checkout_read() {
        let store = MemoryStore::new();
        let user = Uuid::now_v7();
        let a = seed(&store, "A", 10, 5).await;
        let b = seed(&store, "B", 5, 3).await;
        let carts = CartService::new(&store);
        carts.add(user, a.id, 2).await.unwrap();

        let cart = store.cart_for_user(user).await.unwrap().unwrap();
        let products = HashMap::from([(a.id, a.clone())]);
        let order = Order::place(&cart, &products, checkout(PaymentMethod::Cod)).unwrap();

        carts.add(user, b.id, 1).await.unwrap();
        store.place_order(&order).await.unwrap();

        let cart = store.cart_for_user(user).await.unwrap().unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].product_id, b.id);
        assert_eq!(cart.total_amount(), Decimal::from(5));
        assert_eq!(stock_of(&store, a.id).await, 3);
    }
}
