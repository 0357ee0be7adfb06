//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;
use crate::domain::aggregates::{Cart, Product};
use crate::domain::events::{DomainEvent, OrderEvent, ProductEvent};
use crate::domain::value_objects::OrderNumber;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: Uuid,
    user_id: Uuid,
    order_number: OrderNumber,
    #[sqlx(json)]
    items: Vec<OrderItem>,
    total_amount: Decimal,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_method: PaymentMethod,
    payment_id: Option<String>,
    #[sqlx(json)]
    shipping_address: ShippingAddress,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Line snapshot copied from the product at checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub image: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[validate(length(min = 2, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 5, message = "Street address is required"))]
    pub street: String,
    #[validate(length(min = 2, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 2, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 5, message = "Valid zip code is required"))]
    pub zip_code: String,
    #[validate(length(min = 2, message = "Country is required"))]
    pub country: String,
    #[validate(length(min = 10, message = "Valid phone number is required"))]
    pub phone: String,
}

impl ShippingAddress {
    pub fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(), street: self.street.trim().to_string(),
            city: self.city.trim().to_string(), state: self.state.trim().to_string(),
            zip_code: self.zip_code.trim().to_string(), country: self.country.trim().to_string(),
            phone: self.phone.trim().to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
pub enum PaymentStatus { #[default] Pending, Completed, Failed, Refunded }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "payment_method", rename_all = "lowercase")]
pub enum PaymentMethod { Razorpay, Cod }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Confirmed => "confirmed", Self::Processing => "processing",
            Self::Shipped => "shipped", Self::Delivered => "delivered", Self::Cancelled => "cancelled",
        }
    }
    pub fn is_cancellable(&self) -> bool { matches!(self, Self::Pending | Self::Confirmed) }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl PaymentMethod {
    /// Cash on delivery is collected later; gateway payments are already
    /// captured by the time the order is placed.
    pub fn initial_payment_status(&self) -> PaymentStatus {
        match self { Self::Cod => PaymentStatus::Pending, Self::Razorpay => PaymentStatus::Completed }
    }
}

/// Checkout details supplied by the customer.
#[derive(Clone, Debug)]
pub struct Checkout {
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
    pub shipping_address: ShippingAddress,
}

impl Order {
    /// Build an order from a cart, snapshotting product data per line.
    ///
    /// `products` must contain the live product for every cart line.
    pub fn place(cart: &Cart, products: &HashMap<Uuid, Product>, checkout: Checkout) -> Result<Self, OrderError> {
        if cart.is_empty() { return Err(OrderError::EmptyCart); }
        let mut items = Vec::with_capacity(cart.items().len());
        for line in cart.items() {
            let product = products.get(&line.product_id).ok_or(OrderError::ProductUnavailable(line.product_id))?;
            if !product.covers(line.quantity) {
                return Err(OrderError::InsufficientStock { product_id: product.id, name: product.name.clone() });
            }
            items.push(OrderItem {
                product_id: product.id, name: product.name.clone(), price: line.price,
                quantity: line.quantity, image: product.primary_image().to_string(),
            });
        }
        let now = Utc::now();
        let mut order = Self {
            id: Uuid::now_v7(), user_id: cart.user_id(), order_number: OrderNumber::generate(now), items,
            total_amount: cart.total_amount(), status: OrderStatus::Pending,
            payment_status: checkout.payment_method.initial_payment_status(),
            payment_method: checkout.payment_method, payment_id: checkout.payment_id.filter(|p| !p.is_empty()),
            shipping_address: checkout.shipping_address, created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, order_number: order.order_number.clone(), user_id: order.user_id, total: order.total_amount,
        }));
        order.raise_stock_events(-1);
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn order_number(&self) -> &OrderNumber { &self.order_number }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn contains_product(&self, product_id: Uuid) -> bool { self.items.iter().any(|i| i.product_id == product_id) }
    pub fn total_amount(&self) -> Decimal { self.total_amount }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn payment_id(&self) -> Option<&str> { self.payment_id.as_deref() }
    pub fn shipping_address(&self) -> &ShippingAddress { &self.shipping_address }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_owned_by(&self, user_id: Uuid) -> bool { self.user_id == user_id }

    /// Cancel the order. Only pending and confirmed orders can be cancelled.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if !self.status.is_cancellable() { return Err(OrderError::CannotCancel(self.status)); }
        self.status = OrderStatus::Cancelled;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id, order_number: self.order_number.clone() }));
        self.raise_stock_events(1);
        Ok(())
    }

    /// Admin-driven status change. Forward statuses may be set directly;
    /// `Cancelled` goes through [`Order::cancel`] and is terminal.
    pub fn set_status(&mut self, to: OrderStatus) -> Result<(), OrderError> {
        if self.status == OrderStatus::Cancelled { return Err(OrderError::AlreadyCancelled); }
        if to == OrderStatus::Cancelled { return self.cancel(); }
        if to == self.status { return Ok(()); }
        let from = std::mem::replace(&mut self.status, to);
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn raise_stock_events(&mut self, sign: i32) {
        let adjustments: Vec<_> = self.items.iter()
            .map(|i| DomainEvent::Product(ProductEvent::StockAdjusted { product_id: i.product_id, delta: sign * i.quantity }))
            .collect();
        self.events.extend(adjustments);
    }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Product {0} is no longer available")]
    ProductUnavailable(Uuid),
    #[error("Insufficient stock for {name}")]
    InsufficientStock { product_id: Uuid, name: String },
    #[error("Order cannot be cancelled at this stage")]
    CannotCancel(OrderStatus),
    #[error("Cancelled orders cannot change status")]
    AlreadyCancelled,
}
