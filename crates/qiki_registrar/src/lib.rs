//! # qiki_registrar
//!
//! The registrar persists event envelopes to a daily-rotated backup file
//! (`memory_YYYY-MM-DD.db`) with age-based retention. Writes are
//! single-flight-locked so a second registrar against the same directory
//! refuses to start, and ingestion is idempotent per message id.

pub mod log;

pub use log::{AuditLog, LogConfig};
