//! The audit event envelope.
//!
//! Every async cross-service notification is an [`EventEnvelope`]: a typed
//! header around a free-form payload, with a severity and a numeric code
//! whose hundreds digit names the class.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::mono_ns;

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Informational.
    Info,
    /// Degraded but operating.
    Warn,
    /// Operation failed.
    Error,
    /// Emergency; invariant breached.
    Emerg,
}

/// Event code classes, by hundreds digit.
pub mod codes {
    /// Bootstrap class (1xx).
    pub const BOOTSTRAP: u16 = 100;
    /// Sensor I/O class (2xx).
    pub const SENSOR_IO: u16 = 200;
    /// Control I/O class (3xx).
    pub const CONTROL_IO: u16 = 300;
    /// Fault class (5xx).
    pub const FAULT: u16 = 500;
    /// Guard trigger class (7xx).
    pub const GUARD: u16 = 700;
    /// Emergency class (9xx).
    pub const EMERGENCY: u16 = 900;

    /// The class base of a concrete code (e.g. `712` → `700`).
    #[must_use]
    pub fn class_of(code: u16) -> u16 {
        (code / 100) * 100
    }
}

/// The envelope every persisted event travels in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Envelope schema version. Always 1 in this major.
    pub event_schema_version: u32,
    /// Producing service.
    pub source: String,
    /// The bus subject this event was published on.
    pub subject: String,
    /// Wall-clock time of the event.
    pub ts: DateTime<Utc>,
    /// Monotonic nanoseconds since producer process start.
    pub mono_ns: u64,
    /// Event kind (e.g. `"guard_alert"`, `"incident_open"`).
    pub kind: String,
    /// Event category (e.g. `"radar"`, `"power"`).
    pub category: String,
    /// Severity.
    pub severity: Severity,
    /// Numeric code; the hundreds digit names the class.
    pub code: u16,
    /// Free-form payload.
    pub payload: Value,
}

impl EventEnvelope {
    /// Build an envelope stamped now.
    #[must_use]
    pub fn new(
        source: &str,
        subject: &str,
        kind: &str,
        category: &str,
        severity: Severity,
        code: u16,
        payload: Value,
    ) -> Self {
        Self {
            event_schema_version: 1,
            source: source.to_string(),
            subject: subject.to_string(),
            ts: Utc::now(),
            mono_ns: mono_ns(),
            kind: kind.to_string(),
            category: category.to_string(),
            severity,
            code,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_wire_form() {
        assert_eq!(serde_json::to_string(&Severity::Emerg).unwrap(), "\"EMERG\"");
        assert_eq!(serde_json::to_string(&Severity::Warn).unwrap(), "\"WARN\"");
    }

    #[test]
    fn test_code_class() {
        assert_eq!(codes::class_of(712), codes::GUARD);
        assert_eq!(codes::class_of(101), codes::BOOTSTRAP);
        assert_eq!(codes::class_of(950), codes::EMERGENCY);
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = EventEnvelope::new(
            "q-sim",
            "qiki.events.v1.audit",
            "thermal_trip",
            "thermal",
            Severity::Warn,
            510,
            json!({"node": "core", "tripped": 1}),
        );
        let json = serde_json::to_string(&envelope).unwrap();
        let restored: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, envelope);
        assert_eq!(restored.event_schema_version, 1);
    }

    #[test]
    fn test_unknown_envelope_keys_are_ignored() {
        let json = r#"{
            "event_schema_version": 1,
            "source": "q-sim",
            "subject": "qiki.events.v1.audit",
            "ts": "2026-01-01T00:00:00Z",
            "mono_ns": 1,
            "kind": "x",
            "category": "y",
            "severity": "INFO",
            "code": 100,
            "payload": {},
            "future_field": true
        }"#;
        let restored: EventEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(restored.kind, "x");
    }
}
