//! Alert ingestion.
//!
//! Turns inbound guard alerts and selected audit events into incident
//! keys. Anything unrecognised is ignored — the operator store only ever
//! reacts to alert-shaped input.

use chrono::{DateTime, Utc};

use qiki_contracts::event::{EventEnvelope, Severity};
use qiki_radar::GuardAlert;

/// A normalised alert ready for the incident store.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertKey {
    /// Rule identifier.
    pub rule_id: String,
    /// Target key (track id, node name, …).
    pub target_key: String,
    /// Severity.
    pub severity: Severity,
    /// Alert time.
    pub ts: DateTime<Utc>,
}

/// Normalise a guard alert.
#[must_use]
pub fn from_guard_alert(alert: &GuardAlert) -> AlertKey {
    AlertKey {
        rule_id: alert.rule_id.clone(),
        target_key: alert.target_track_id.to_string(),
        severity: alert.severity,
        ts: alert.ts,
    }
}

/// Normalise an audit event, when it is alert-shaped.
///
/// Thermal trip events map to `TEMP_<NODE>_TRIP` on their trip edge; the
/// clear edge is not an alert. PDU overcurrent faults map to
/// `PDU_OVERCURRENT`.
#[must_use]
pub fn from_audit_event(envelope: &EventEnvelope) -> Option<AlertKey> {
    match envelope.kind.as_str() {
        "thermal_trip" => {
            let tripped = envelope.payload.get("tripped").and_then(|v| v.as_u64())?;
            if tripped == 0 {
                return None;
            }
            let node = envelope.payload.get("subject").and_then(|v| v.as_str())?;
            Some(AlertKey {
                rule_id: format!("TEMP_{}_TRIP", node.to_uppercase()),
                target_key: node.to_string(),
                severity: envelope.severity,
                ts: envelope.ts,
            })
        }
        "pdu_overcurrent" => {
            let active = envelope.payload.get("active").and_then(|v| v.as_bool())?;
            active.then(|| AlertKey {
                rule_id: "PDU_OVERCURRENT".to_string(),
                target_key: "pdu".to_string(),
                severity: envelope.severity,
                ts: envelope.ts,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    fn envelope(kind: &str, payload: serde_json::Value) -> EventEnvelope {
        EventEnvelope::new(
            "q-sim",
            "qiki.events.v1.audit",
            kind,
            "thermal",
            Severity::Warn,
            510,
            payload,
        )
    }

    #[test]
    fn test_core_trip_maps_to_temp_core_trip() {
        let key = from_audit_event(&envelope(
            "thermal_trip",
            json!({"subject": "core", "tripped": 1}),
        ))
        .unwrap();
        assert_eq!(key.rule_id, "TEMP_CORE_TRIP");
        assert_eq!(key.target_key, "core");
    }

    #[test]
    fn test_trip_clear_edge_is_not_an_alert() {
        assert!(from_audit_event(&envelope(
            "thermal_trip",
            json!({"subject": "core", "tripped": 0}),
        ))
        .is_none());
    }

    #[test]
    fn test_unrelated_kinds_are_ignored() {
        assert!(from_audit_event(&envelope("xpdr_mode", json!({"mode": "ON"}))).is_none());
    }

    #[test]
    fn test_guard_alert_keys_on_track_id() {
        let track_id = Uuid::new_v4();
        let alert = GuardAlert {
            category: "radar".to_string(),
            kind: "guard_alert".to_string(),
            rule_id: "UNKNOWN_CONTACT_CLOSE".to_string(),
            severity: Severity::Warn,
            target_track_id: track_id,
            ts: Utc::now(),
        };
        let key = from_guard_alert(&alert);
        assert_eq!(key.rule_id, "UNKNOWN_CONTACT_CLOSE");
        assert_eq!(key.target_key, track_id.to_string());
    }

    #[test]
    fn test_pdu_overcurrent_active_maps() {
        let key =
            from_audit_event(&envelope("pdu_overcurrent", json!({"active": true}))).unwrap();
        assert_eq!(key.rule_id, "PDU_OVERCURRENT");
        assert!(from_audit_event(&envelope("pdu_overcurrent", json!({"active": false})))
            .is_none());
    }
}
