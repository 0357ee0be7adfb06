//! Storefront commerce API server.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use chrono::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_commerce::{
    auth::TokenKeys,
    config::AppConfig,
    messaging::EventPublisher,
    payment::{RazorpayGateway, SignatureVerifier},
    store::{MemoryStore, PgStore, Store},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => Arc::new(PgStore::connect(url, config.database_max_connections).await?),
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let tokens = Arc::new(TokenKeys::new(&config.jwt_secret, Duration::days(config.jwt_ttl_days)));
    let gateway = RazorpayGateway::new(&config.gateway)?;
    if config.gateway.key_id.is_empty() {
        tracing::warn!("payment gateway credentials not configured, payment endpoints will fail");
    }

    let state = AppState {
        store,
        tokens,
        gateway: Arc::new(gateway),
        signatures: SignatureVerifier::new(config.gateway.key_secret.clone()),
        events: EventPublisher::connect(config.nats_url.as_deref()).await,
        environment: config.environment,
    };

    if let Some(admin) = &config.admin {
        let user = state.accounts().ensure_admin(admin).await?;
        tracing::info!(user_id = %user.id, email = %user.email, "admin account ready");
    }

    let origin = HeaderValue::from_str(&config.frontend_url).context("FRONTEND_URL is not a valid header value")?;
    let app = storefront_commerce::router(state, origin);

    let addr = config.socket_addr();
    tracing::info!(%addr, environment = config.environment.as_str(), "storefront commerce listening");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
