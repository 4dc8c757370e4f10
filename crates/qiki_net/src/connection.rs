//! NATS connection management.
//!
//! A thin wrapper around `async-nats` with platform defaults: JSON
//! payloads, a `Nats-Msg-Id` header on every persisted event, explicit
//! request timeouts, and bounded-backoff publish retry.

use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::error::NetError;

/// Default NATS server URL.
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

/// The environment variable used to override the NATS URL.
pub const NATS_URL_ENV: &str = "NATS_URL";

/// The header carrying the dedup message id.
pub const MSG_ID_HEADER: &str = "Nats-Msg-Id";

/// Default request/response timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Consecutive publish failures before the caller should escalate to ERROR
/// and consider SAFE mode.
pub const PUBLISH_FAILURE_ESCALATION: u32 = 5;

/// Bounded exponential backoff for transient bus errors.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(5))
    }
}

impl Backoff {
    /// Create a backoff starting at `base` and capped at `max`.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    /// The delay before the next retry, doubling per attempt up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt.min(16));
        self.attempt = self.attempt.saturating_add(1);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Attempts taken so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Reset after a success.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Compute a content-hash message id for an idempotent event payload.
#[must_use]
pub fn content_hash_id(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    digest.iter().take(16).map(|b| format!("{b:02x}")).collect()
}

/// A wrapper around an `async-nats` client with platform helpers.
#[derive(Debug, Clone)]
pub struct NatsConnection {
    /// The underlying NATS client.
    client: async_nats::Client,
}

impl NatsConnection {
    /// Connect to NATS using the URL from the `NATS_URL` environment
    /// variable, falling back to [`DEFAULT_NATS_URL`].
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Connect`] if the connection cannot be established.
    pub async fn connect() -> Result<Self, NetError> {
        let url = std::env::var(NATS_URL_ENV).unwrap_or_else(|_| DEFAULT_NATS_URL.to_string());
        Self::connect_to(&url).await
    }

    /// Connect to NATS at the specified URL.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Connect`] if the connection cannot be established.
    pub async fn connect_to(url: &str) -> Result<Self, NetError> {
        info!(url, "connecting to NATS");
        let client = async_nats::connect(url).await?;
        info!("NATS connection established");
        Ok(Self { client })
    }

    /// Returns a reference to the underlying `async-nats` client.
    #[must_use]
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    /// Returns a JetStream context over this connection.
    #[must_use]
    pub fn jetstream(&self) -> async_nats::jetstream::Context {
        async_nats::jetstream::new(self.client.clone())
    }

    /// Publish a JSON-encoded message to a subject.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] if encoding or publishing fails.
    pub async fn publish_json<T: serde::Serialize>(
        &self,
        subject: &str,
        message: &T,
    ) -> Result<(), NetError> {
        let payload = crate::codec::encode(message)?;
        self.client
            .publish(subject.to_string(), payload.into())
            .await?;
        Ok(())
    }

    /// Publish a JSON-encoded message with a `Nats-Msg-Id` header.
    ///
    /// When `message_id` is `None` a content hash of the payload is used,
    /// making redelivery of the same logical event idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] if encoding or publishing fails.
    pub async fn publish_event<T: serde::Serialize>(
        &self,
        subject: &str,
        message_id: Option<&str>,
        message: &T,
    ) -> Result<(), NetError> {
        let payload = crate::codec::encode(message)?;
        let id = message_id.map_or_else(|| content_hash_id(&payload), str::to_string);
        let mut headers = async_nats::HeaderMap::new();
        headers.insert(MSG_ID_HEADER, id.as_str());
        self.client
            .publish_with_headers(subject.to_string(), headers, payload.into())
            .await?;
        Ok(())
    }

    /// Publish with bounded-backoff retry.
    ///
    /// WARN is logged after the first failure, ERROR once `max_attempts`
    /// is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the last [`NetError`] after `max_attempts` failures.
    pub async fn publish_with_retry<T: serde::Serialize>(
        &self,
        subject: &str,
        message: &T,
        max_attempts: u32,
    ) -> Result<(), NetError> {
        let mut backoff = Backoff::default();
        loop {
            match self.publish_json(subject, message).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() && backoff.attempts() + 1 < max_attempts => {
                    let delay = backoff.next_delay();
                    warn!(
                        subject,
                        attempt = backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        %err,
                        "publish failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    error!(subject, attempts = backoff.attempts() + 1, %err, "publish failed");
                    return Err(err);
                }
            }
        }
    }

    /// Send a request and decode the JSON response, with an explicit
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Timeout`] if no response arrives in time, or a
    /// codec/transport error otherwise.
    pub async fn request_json<Req, Resp>(
        &self,
        subject: &str,
        request: &Req,
        timeout: Duration,
    ) -> Result<Resp, NetError>
    where
        Req: serde::Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let payload = crate::codec::encode(request)?;
        let response = tokio::time::timeout(
            timeout,
            self.client.request(subject.to_string(), payload.into()),
        )
        .await
        .map_err(|_| NetError::Timeout {
            subject: subject.to_string(),
        })??;
        crate::codec::decode(&response.payload)
    }

    /// Subscribe to a subject.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Subscribe`] if the subscription fails.
    pub async fn subscribe(&self, subject: &str) -> Result<async_nats::Subscriber, NetError> {
        let sub = self.client.subscribe(subject.to_string()).await?;
        Ok(sub)
    }

    /// Flush pending publishes; part of graceful shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::JetStream`] if the flush fails.
    pub async fn flush(&self) -> Result<(), NetError> {
        self.client
            .flush()
            .await
            .map_err(|e| NetError::JetStream(e.to_string()))
    }
}

/// Extract the `Nats-Msg-Id` header from a message.
///
/// # Errors
///
/// Returns [`NetError::MissingHeader`] when the header is absent.
pub fn message_id(message: &async_nats::Message) -> Result<String, NetError> {
    message
        .headers
        .as_ref()
        .and_then(|h| h.get(MSG_ID_HEADER))
        .map(|v| v.as_str().to_string())
        .ok_or_else(|| NetError::MissingHeader(MSG_ID_HEADER.to_string()))
}
