//! Backplane error types.
//!
//! Transient errors (connect/publish) are retryable; protocol and
//! validation errors are not — the offending message is dropped and the
//! consumer continues.

use crate::guardrail::GuardrailViolation;

/// Errors that can occur during backplane operations.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Failed to encode a message to JSON.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// Failed to decode a message from JSON.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    /// NATS connection error.
    #[error("NATS connection error: {0}")]
    Connect(#[from] async_nats::ConnectError),

    /// NATS subscription error.
    #[error("NATS subscribe error: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),

    /// NATS publish error.
    #[error("NATS publish error: {0}")]
    Publish(#[from] async_nats::PublishError),

    /// NATS request/response error.
    #[error("NATS request error: {0}")]
    Request(#[from] async_nats::RequestError),

    /// A request or JetStream operation exceeded its timeout.
    #[error("operation timed out on subject {subject}")]
    Timeout {
        /// The subject the operation targeted.
        subject: String,
    },

    /// JetStream stream or consumer management failure.
    #[error("JetStream error: {0}")]
    JetStream(String),

    /// A required NATS header was missing.
    #[error("missing NATS header: {0}")]
    MissingHeader(String),

    /// An inbound payload failed schema validation. Dropped, never
    /// propagated to business logic.
    #[error("payload validation failed: {0}")]
    Validation(String),

    /// A forbidden action was attempted.
    #[error(transparent)]
    Guardrail(#[from] GuardrailViolation),
}

impl NetError {
    /// Whether a retry with backoff is appropriate.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::Publish(_) | Self::Request(_) | Self::Timeout { .. }
        )
    }
}
