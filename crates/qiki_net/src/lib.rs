//! # qiki_net
//!
//! NATS backplane adapter for the QIKI digital-twin platform.
//!
//! This crate provides:
//!
//! - [`subjects`] — the canonical subject taxonomy, constants and builders.
//! - [`codec`] — JSON serialisation/deserialisation helpers.
//! - [`connection`] — NATS connection management, publish retry, request
//!   with timeout, and the `Nats-Msg-Id` producer discipline.
//! - [`streams`] — JetStream stream and pull-consumer layout.
//! - [`dedup`] — consumer-side message-id deduplication window.
//! - [`guardrail`] — anti-loop guardrails (no parallel wire majors, no
//!   second source of truth).
//! - [`error`] — backplane error types.

pub mod codec;
pub mod connection;
pub mod dedup;
pub mod error;
pub mod guardrail;
pub mod streams;
pub mod subjects;

pub use codec::{decode, encode};
pub use connection::NatsConnection;
pub use dedup::DedupWindow;
pub use error::NetError;
pub use guardrail::{GuardrailMode, GuardrailViolation, SubjectRegistry};
