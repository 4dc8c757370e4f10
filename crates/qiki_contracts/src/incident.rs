//! Operator incident records.
//!
//! An incident is the deduplicated, lifecycle-managed form of repeated guard
//! alerts for the same `(rule_id, target)` key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Severity;

/// Incident lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentState {
    /// Alerting, not yet acknowledged.
    Open,
    /// Acknowledged by an operator.
    Acked,
    /// Cleared by an operator or by the absence window.
    Cleared,
}

/// One deduplicated incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// The guard rule that opened this incident.
    pub rule_id: String,
    /// The target key (e.g. a track id), empty for target-less rules.
    pub target_key: String,
    /// Severity of the originating alerts.
    pub severity: Severity,
    /// First alert time.
    pub first_seen_ts: DateTime<Utc>,
    /// Most recent alert time.
    pub last_seen_ts: DateTime<Utc>,
    /// Number of coalesced alerts.
    pub count: u64,
    /// Lifecycle state.
    pub state: IncidentState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_wire_form_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&IncidentState::Acked).unwrap(),
            "\"acked\""
        );
    }

    #[test]
    fn test_incident_roundtrip() {
        let now = Utc::now();
        let incident = Incident {
            rule_id: "UNKNOWN_CONTACT_CLOSE".to_string(),
            target_key: "track-1".to_string(),
            severity: Severity::Warn,
            first_seen_ts: now,
            last_seen_ts: now,
            count: 3,
            state: IncidentState::Open,
        };
        let json = serde_json::to_string(&incident).unwrap();
        let restored: Incident = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, incident);
    }
}
