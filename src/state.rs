//! Shared application state.

use std::sync::Arc;

use crate::auth::TokenKeys;
use crate::config::Environment;
use crate::messaging::EventPublisher;
use crate::payment::{PaymentGateway, SignatureVerifier};
use crate::services::{AccountService, CartService, CatalogService, OrderService, PaymentService};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: Arc<TokenKeys>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub signatures: SignatureVerifier,
    pub events: EventPublisher,
    pub environment: Environment,
}

impl AppState {
    pub fn accounts(&self) -> AccountService<'_> { AccountService::new(self.store.as_ref(), &self.tokens) }
    pub fn catalog(&self) -> CatalogService<'_> { CatalogService::new(self.store.as_ref()) }
    pub fn carts(&self) -> CartService<'_> { CartService::new(self.store.as_ref()) }
    pub fn orders(&self) -> OrderService<'_> { OrderService::new(self.store.as_ref(), &self.events) }
    pub fn payments(&self) -> PaymentService<'_> { PaymentService::new(self.gateway.as_ref(), &self.signatures) }
}
