//! Front-end route cache invalidation.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

/// Port invalidating a cached rendered route. Fire-and-forget.
pub trait Revalidator: Send + Sync {
    fn revalidate(&self, path: &str);
}

/// Only logs the invalidation. Used when no front-end hook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRevalidator;

impl Revalidator for LogRevalidator {
    fn revalidate(&self, path: &str) {
        tracing::debug!(path, "route revalidation skipped, no hook configured");
    }
}

#[derive(Serialize)]
struct Payload<'a> {
    path: &'a str,
}

/// Posts `{"path": ...}` to the front-end revalidation hook.
#[derive(Clone)]
pub struct WebhookRevalidator {
    client: Client,
    url: String,
    secret: Option<String>,
}

impl WebhookRevalidator {
    /// Create a new [`WebhookRevalidator`].
    pub fn new(url: &str, secret: Option<String>, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.to_owned(),
            secret,
        })
    }
}

impl Revalidator for WebhookRevalidator {
    fn revalidate(&self, path: &str) {
        let mut request = self.client.post(&self.url).json(&Payload { path });
        if let Some(secret) = &self.secret {
            request = request.bearer_auth(secret);
        }
        let path = path.to_owned();

        // must be called within the tokio runtime.
        tokio::spawn(async move {
            match request.send().await.and_then(|r| r.error_for_status()) {
                Ok(_) => tracing::trace!(path, "route revalidated"),
                Err(err) => tracing::warn!(path, error = %err, "route revalidation failed"),
            }
        });
    }
}
