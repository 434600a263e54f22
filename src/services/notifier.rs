use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::models::BookingEvent;

pub const SIGNATURE_HEADER: &str = "x-deskbook-signature";

/// Best-effort outbound push of booking events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post_event(&self, event: &BookingEvent) -> anyhow::Result<()>;
}

/// POSTs events as JSON to a webhook URL, signing the body when a secret is set.
pub struct WebhookNotifier {
    url: String,
    secret: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String, secret: String) -> Self {
        Self {
            url,
            secret,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn post_event(&self, event: &BookingEvent) -> anyhow::Result<()> {
        let body = serde_json::to_vec(event).context("failed to serialize booking event")?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if !self.secret.is_empty() {
            request = request.header(SIGNATURE_HEADER, sign_payload(&self.secret, &body)?);
        }

        request
            .body(body)
            .send()
            .await
            .context("failed to post booking event")?
            .error_for_status()
            .context("notifier webhook returned error")?;

        Ok(())
    }
}

/// Used when no webhook URL is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn post_event(&self, event: &BookingEvent) -> anyhow::Result<()> {
        tracing::debug!(
            action = event.action.as_str(),
            booking_id = %event.booking_id,
            "notifier not configured, event not posted"
        );
        Ok(())
    }
}

/// Base64 HMAC-SHA1 of `body` keyed with `secret`.
pub fn sign_payload(secret: &str, body: &[u8]) -> anyhow::Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .context("invalid notifier secret")?;
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    Ok(base64::engine::general_purpose::STANDARD.encode(digest))
}
