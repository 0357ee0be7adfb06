//! Aggregates module
pub mod user;
pub mod category;
pub mod product;
pub mod cart;
pub mod order;

pub use user::{Address, ProfileChanges, Role, User};
pub use category::{Category, CategoryChanges};
pub use product::{NewProduct, Product, ProductChanges, ProductError};
pub use cart::{Cart, CartError, CartItem};
pub use order::{Checkout, Order, OrderError, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress};
