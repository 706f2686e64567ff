//! Outbound message notifier
//!
//! Best-effort by contract: a failed send is logged and swallowed, never
//! surfaced to the conversation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Outbound text-message channel (OTP delivery, reschedule confirmations)
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a message to a phone number. Returns whether delivery was
    /// accepted by the channel; callers never treat `false` as an error.
    async fn send(&self, phone: &str, message: &str) -> bool;
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn send(&self, phone: &str, message: &str) -> bool {
        (**self).send(phone, message).await
    }
}

/// WhatsApp-gateway notifier posting to a webhook endpoint
pub struct WhatsAppNotifier {
    client: Client,
    webhook_url: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    to: &'a str,
    body: &'a str,
}

impl WhatsAppNotifier {
    pub fn new(webhook_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            webhook_url,
        }
    }
}

#[async_trait]
impl Notifier for WhatsAppNotifier {
    async fn send(&self, phone: &str, message: &str) -> bool {
        let payload = WebhookPayload {
            to: phone,
            body: message,
        };

        match self.client.post(&self.webhook_url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(phone = %phone, "Notification delivered");
                true
            }
            Ok(resp) => {
                tracing::warn!(
                    phone = %phone,
                    status = %resp.status(),
                    "Notification rejected by gateway"
                );
                false
            }
            Err(e) => {
                tracing::warn!(phone = %phone, error = %e, "Notification send failed");
                false
            }
        }
    }
}

/// Used when no webhook is configured; logs instead of sending
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, phone: &str, message: &str) -> bool {
        tracing::info!(phone = %phone, message = %message, "Notifier unconfigured, dropping message");
        false
    }
}
