//! Outbound notifications, decoupled from the request/response cycle.
//!
//! The notification service is a collaborator: it receives a sanitized quote
//! digest and a routing hint and delivers a message (the deployment wires the
//! webhook to mail, chat, whatever). Sends are dispatched onto a background
//! task *after* the triggering update has committed; a failed send is logged
//! and swallowed, never surfaced to the caller and never rolled back.

use crate::models::quote::{Quote, QuoteStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Quote snapshot passed to the notification collaborator.
///
/// Supplier-facing digests must not reveal the customer's identity, so the
/// customer id is optional and populated only for staff- and customer-facing
/// events.
#[derive(Serialize, Clone, Debug)]
pub struct QuoteDigest {
    pub id: Uuid,
    pub quote_number: String,
    pub title: String,
    pub description: String,
    pub customer_message: String,
    pub status: QuoteStatus,
    pub urgent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl QuoteDigest {
    /// Digest for supplier-facing notifications: no customer identity.
    pub fn sanitized(quote: &Quote) -> Self {
        Self {
            customer: None,
            ..Self::full(quote)
        }
    }

    /// Digest for staff- and customer-facing notifications.
    pub fn full(quote: &Quote) -> Self {
        Self {
            id: quote.id,
            quote_number: quote.quote_number.clone(),
            title: quote.title.clone(),
            description: quote.description.clone(),
            customer_message: quote.customer_message.clone(),
            status: quote.status,
            urgent: quote.urgent,
            customer: Some(quote.customer),
            price: quote.price,
            currency: quote.currency.clone(),
            created_at: quote.created_at,
        }
    }
}

/// State-change events that trigger an outbound notification.
#[derive(Serialize, Clone, Debug)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// New quote created; internal quoters pick it up for routing.
    QuoteCreated { quote: QuoteDigest },
    /// A supplier was assigned; the digest is supplier-facing.
    SupplierAssigned { supplier: Uuid, quote: QuoteDigest },
    /// The supplier confirmed their priced response; notify the quoter.
    SupplierQuoted { quote: QuoteDigest },
    /// The final quote was confirmed; notify the customer.
    QuoteFinalized { customer: Uuid, quote: QuoteDigest },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, event: NotificationEvent) -> anyhow::Result<()>;
}

/// Posts each event as JSON to a configured webhook endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, event: NotificationEvent) -> anyhow::Result<()> {
        self.client
            .post(&self.endpoint)
            .json(&event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Used when no webhook is configured (and in tests).
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _event: NotificationEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Fire-and-forget dispatch: runs the send on its own task so the HTTP
/// response is never blocked on (or failed by) the collaborator.
pub fn dispatch(notifier: Arc<dyn Notifier>, event: NotificationEvent) {
    tokio::spawn(async move {
        if let Err(err) = notifier.send(event.clone()).await {
            tracing::warn!(?event, "notification send failed: {err:#}");
        }
    });
}
