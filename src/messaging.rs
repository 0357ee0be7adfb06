//! Domain event publishing.
//!
//! Events go to NATS under `commerce.<subject>` when a client is configured.
//! Without one they are only traced. Publishing never fails a request.

use tracing::{debug, warn};

use crate::domain::events::DomainEvent;

const SUBJECT_PREFIX: &str = "commerce";

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    /// Publisher that only logs.
    pub fn disabled() -> Self { Self::default() }

    /// Connect to NATS, falling back to a log-only publisher on failure.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::disabled() };
        match async_nats::connect(url).await {
            Ok(client) => Self::new(Some(client)),
            Err(e) => {
                warn!(error = %e, url, "NATS unavailable, domain events will only be logged");
                Self::disabled()
            }
        }
    }

    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        for event in events {
            self.publish(&event).await;
        }
    }

    pub async fn publish(&self, event: &DomainEvent) {
        let subject = format!("{SUBJECT_PREFIX}.{}", event.subject());
        let Some(client) = &self.nats else {
            debug!(%subject, ?event, "domain event");
            return;
        };
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, %subject, "failed to encode domain event");
                return;
            }
        };
        if let Err(e) = client.publish(subject.clone(), payload.into()).await {
            warn!(error = %e, %subject, "failed to publish domain event");
        }
    }
}
