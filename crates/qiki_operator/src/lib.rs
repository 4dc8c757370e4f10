//! # qiki_operator
//!
//! The operator incident store: guard alerts and selected audit events are
//! deduplicated into incidents keyed `(rule_id, target_key)`, with an
//! open → acked → cleared lifecycle, auto-clear on silence, and a
//! record/replay path for reproducing incident behaviour from captured
//! events.

pub mod incidents;
pub mod ingest;
pub mod replay;

pub use incidents::{IncidentConfig, IncidentStore, LifecycleEvent};
pub use ingest::AlertKey;
