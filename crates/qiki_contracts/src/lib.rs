//! # qiki_contracts
//!
//! Canonical wire types for the QIKI digital-twin platform.
//!
//! Every message that crosses the bus is JSON (UTF-8) matching one of the
//! types in this crate. All schemas are forward-compatible: unknown keys are
//! ignored on input, and optional data is an absent key on output — never a
//! fabricated zero.
//!
//! This crate provides:
//!
//! - [`ids`] — boot ids and the dual wall-clock/monotonic timestamp.
//! - [`telemetry`] — the per-tick [`TelemetrySnapshot`](telemetry::TelemetrySnapshot).
//! - [`radar`] — radar frames, detections, and tracks.
//! - [`fsm`] — the agent FSM snapshot DTO.
//! - [`proposal`] — agent proposals (proposals-only, never actuation).
//! - [`incident`] — operator incident records.
//! - [`bios`] — BIOS POST results and status events.
//! - [`event`] — the audit event envelope, severities, and code classes.
//! - [`command`] — control command and response envelopes.
//! - [`hash`] — canonical-JSON hashing for the hardware profile.

pub mod bios;
pub mod command;
pub mod event;
pub mod fsm;
pub mod hash;
pub mod ids;
pub mod incident;
pub mod proposal;
pub mod radar;
pub mod telemetry;

pub use event::{EventEnvelope, Severity};
pub use fsm::{FsmSnapshot, FsmState};
pub use hash::hardware_profile_hash;
pub use ids::{BootId, Stamp};
pub use radar::{RadarDetection, RadarFrame, RadarTrack, RangeBand, TransponderMode};
pub use telemetry::TelemetrySnapshot;
