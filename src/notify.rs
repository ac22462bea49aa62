//! Moderation notifications
//!
//! Events are handed to a [`Notifier`] on a detached task. Delivery failures
//! are logged and never reach the operation that produced the event.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    ContributionSubmitted {
        contribution_id: Uuid,
        client_id: Uuid,
        product_id: Uuid,
        market_id: Uuid,
        price: f64,
    },
    ContributionApproved {
        contribution_id: Uuid,
        client_id: Uuid,
        moderator: Uuid,
    },
    ContributionRejected {
        contribution_id: Uuid,
        client_id: Uuid,
        moderator: Uuid,
        reason: String,
    },
    ClientAutoBlocked {
        client_id: Uuid,
        consecutive_errors: u32,
        reason: String,
    },
    ClientBlocked {
        client_id: Uuid,
        kind: &'static str,
        reason: String,
    },
    ClientUnblocked {
        client_id: Uuid,
    },
    ClientTerminated {
        client_id: Uuid,
        blacklist_entry_id: Uuid,
    },
}

impl NotificationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            NotificationEvent::ContributionSubmitted { .. } => "contribution_submitted",
            NotificationEvent::ContributionApproved { .. } => "contribution_approved",
            NotificationEvent::ContributionRejected { .. } => "contribution_rejected",
            NotificationEvent::ClientAutoBlocked { .. } => "client_auto_blocked",
            NotificationEvent::ClientBlocked { .. } => "client_blocked",
            NotificationEvent::ClientUnblocked { .. } => "client_unblocked",
            NotificationEvent::ClientTerminated { .. } => "client_terminated",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotificationEvent) -> Result<()>;
}

/// Writes every event to the log
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        info!(event = event.name(), payload = ?event, "Notification");
        Ok(())
    }
}

/// POSTs each event as JSON to a fixed endpoint
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http_client: Client,
    url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("Price-Catalog-Notifier/1.0")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            url: url.into(),
            max_retries: max_retries.max(1),
            retry_delay: Duration::from_millis(500),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.http_client.post(&self.url).json(event).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) if attempts < self.max_retries => {
                    debug!(
                        "Webhook returned {}, retrying ({}/{})",
                        resp.status(),
                        attempts,
                        self.max_retries
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Ok(resp) => {
                    return Err(anyhow::anyhow!(
                        "Webhook failed after {} attempts with status: {}",
                        attempts,
                        resp.status()
                    ));
                }
                Err(e) if attempts < self.max_retries => {
                    debug!("Webhook error: {}, retrying ({}/{})", e, attempts, self.max_retries);
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    return Err(anyhow::anyhow!(
                        "Webhook failed after {} attempts: {}",
                        attempts,
                        e
                    ));
                }
            }
        }
    }
}

/// Keeps delivered events in memory; used by tests and local runs
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    events: Arc<RwLock<Vec<NotificationEvent>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<NotificationEvent> {
        self.events.read().await.clone()
    }

    /// Wait until at least `count` events arrived or a second has passed
    pub async fn wait_for(&self, count: usize) -> Vec<NotificationEvent> {
        for _ in 0..100 {
            let events = self.events().await;
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.events().await
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}

/// Fire-and-forget front of a [`Notifier`]
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingNotifier))
    }

    pub fn dispatch(&self, event: NotificationEvent) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(event = event.name(), "No runtime available, notification dropped");
            return;
        };

        let notifier = self.notifier.clone();
        handle.spawn(async move {
            if let Err(e) = notifier.notify(&event).await {
                warn!(event = event.name(), error = %e, "Notification delivery failed");
            }
        });
    }
}
