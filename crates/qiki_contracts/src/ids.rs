//! Identifiers and timestamps.
//!
//! Two clocks travel with every cross-component event: wall-clock epoch time
//! for humans and a monotonic nanosecond reading for ordering within one
//! process. The monotonic reading is anchored at first use and never goes
//! backwards for the life of the process.

use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session-scoped boot identifier: 8 random bytes, lowercase hex.
///
/// Assigned once at process start and constant thereafter. Readers use it to
/// disambiguate FSM versions across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BootId(String);

impl BootId {
    /// Generate a fresh boot id from 8 random bytes.
    #[must_use]
    pub fn generate() -> Self {
        let raw = uuid::Uuid::new_v4();
        let bytes = &raw.as_bytes()[..8];
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Returns the hex string form (16 lowercase hex chars).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Process-wide anchor for monotonic readings.
static MONO_ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Monotonic nanoseconds since the process anchor.
///
/// The anchor is set on first call; subsequent calls are strictly
/// non-decreasing within the process.
#[must_use]
pub fn mono_ns() -> u64 {
    let anchor = MONO_ANCHOR.get_or_init(Instant::now);
    u64::try_from(anchor.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// A dual timestamp: wall-clock epoch plus a monotonic reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stamp {
    /// Wall-clock time, UTC.
    pub ts: DateTime<Utc>,
    /// Monotonic nanoseconds since process start.
    pub mono_ns: u64,
}

impl Stamp {
    /// Take a timestamp now.
    #[must_use]
    pub fn now() -> Self {
        Self {
            ts: Utc::now(),
            mono_ns: mono_ns(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_id_is_hex16() {
        let id = BootId::generate();
        assert_eq!(id.as_str().len(), 16);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(id.as_str().chars().all(|c| !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_boot_ids_distinct() {
        assert_ne!(BootId::generate(), BootId::generate());
    }

    #[test]
    fn test_mono_ns_non_decreasing() {
        let a = mono_ns();
        let b = mono_ns();
        assert!(b >= a);
    }

    #[test]
    fn test_stamp_roundtrip() {
        let stamp = Stamp::now();
        let json = serde_json::to_string(&stamp).unwrap();
        let restored: Stamp = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.mono_ns, stamp.mono_ns);
    }
}
