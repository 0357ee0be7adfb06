//! Application services.
//!
//! Each service borrows what it needs from [`crate::state::AppState`] for the
//! duration of one request and returns [`crate::error::AppError`] on failure.

pub mod accounts;
pub mod carts;
pub mod catalog;
pub mod orders;
pub mod payments;

pub use accounts::{AccountService, Session};
pub use carts::{CartLineView, CartService, CartView, ProductSummary};
pub use catalog::CatalogService;
pub use orders::OrderService;
pub use payments::{CheckoutSession, Currency, PaymentService, VerifiedPayment};
