//! The incident store.
//!
//! One incident per `(rule_id, target_key)` lifecycle. The first alert
//! opens it and publishes `incident_open`; every further alert of the
//! lifecycle only bumps `count`/`last_seen_ts` — an incident re-alerts
//! only after it has been cleared. Operator actions move
//! open → acked → cleared; silence beyond the absence window auto-clears.
//! Updates are serialised per key by the concurrent map's shard locks.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::info;

use qiki_contracts::event::Severity;
use qiki_contracts::incident::{Incident, IncidentState};

/// Store tuning.
#[derive(Debug, Clone)]
pub struct IncidentConfig {
    /// Silence needed for auto-clear, seconds.
    pub auto_clear_after_s: i64,
}

impl Default for IncidentConfig {
    fn default() -> Self {
        Self {
            auto_clear_after_s: 300,
        }
    }
}

/// A lifecycle transition the caller must publish on the operator audit
/// subject.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// First alert of a lifecycle.
    Open(Incident),
    /// Operator acknowledged.
    Ack(Incident),
    /// Operator cleared.
    Clear(Incident),
    /// The absence window expired.
    AutoClear(Incident),
}

impl LifecycleEvent {
    /// The audit `kind` for this transition.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Open(_) => "incident_open",
            Self::Ack(_) => "incident_ack",
            Self::Clear(_) => "incident_clear",
            Self::AutoClear(_) => "incident_auto_clear",
        }
    }

    /// The incident after the transition.
    #[must_use]
    pub fn incident(&self) -> &Incident {
        match self {
            Self::Open(i) | Self::Ack(i) | Self::Clear(i) | Self::AutoClear(i) => i,
        }
    }
}

/// A refused operator action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// No such incident.
    #[error("incident_not_found")]
    NotFound,
    /// The transition does not fit the current state.
    #[error("invalid_transition")]
    InvalidTransition,
}

/// The incident store.
#[derive(Debug)]
pub struct IncidentStore {
    config: IncidentConfig,
    incidents: DashMap<(String, String), Incident>,
}

impl IncidentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(config: IncidentConfig) -> Self {
        Self {
            config,
            incidents: DashMap::new(),
        }
    }

    /// Number of incidents currently held (all states).
    #[must_use]
    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    /// Whether the store holds no incidents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    /// A snapshot of every incident.
    #[must_use]
    pub fn all(&self) -> Vec<Incident> {
        self.incidents.iter().map(|e| e.value().clone()).collect()
    }

    /// Observe one alert. Returns `Open` exactly once per lifecycle;
    /// coalesced repeats return `None`.
    pub fn observe_alert(
        &self,
        rule_id: &str,
        target_key: &str,
        severity: Severity,
        ts: DateTime<Utc>,
    ) -> Option<LifecycleEvent> {
        let key = (rule_id.to_string(), target_key.to_string());
        let mut entry = self.incidents.entry(key).or_insert_with(|| Incident {
            rule_id: rule_id.to_string(),
            target_key: target_key.to_string(),
            severity,
            first_seen_ts: ts,
            last_seen_ts: ts,
            count: 0,
            state: IncidentState::Cleared,
        });

        let incident = entry.value_mut();
        if incident.state == IncidentState::Cleared {
            // A fresh lifecycle: cleared incidents reopen.
            incident.state = IncidentState::Open;
            incident.severity = severity;
            incident.first_seen_ts = ts;
            incident.last_seen_ts = ts;
            incident.count = 1;
            info!(rule_id, target_key, "incident opened");
            return Some(LifecycleEvent::Open(incident.clone()));
        }

        // Open or acked: coalesce.
        incident.count += 1;
        incident.last_seen_ts = ts;
        None
    }

    /// Operator acknowledgement: open → acked.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] when the incident is missing or not open.
    pub fn ack(&self, rule_id: &str, target_key: &str) -> Result<LifecycleEvent, ActionError> {
        let key = (rule_id.to_string(), target_key.to_string());
        let mut entry = self.incidents.get_mut(&key).ok_or(ActionError::NotFound)?;
        let incident = entry.value_mut();
        if incident.state != IncidentState::Open {
            return Err(ActionError::InvalidTransition);
        }
        incident.state = IncidentState::Acked;
        info!(rule_id, target_key, "incident acked");
        Ok(LifecycleEvent::Ack(incident.clone()))
    }

    /// Operator clear: acked → cleared.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] when the incident is missing or not acked.
    pub fn clear(&self, rule_id: &str, target_key: &str) -> Result<LifecycleEvent, ActionError> {
        let key = (rule_id.to_string(), target_key.to_string());
        let mut entry = self.incidents.get_mut(&key).ok_or(ActionError::NotFound)?;
        let incident = entry.value_mut();
        if incident.state != IncidentState::Acked {
            return Err(ActionError::InvalidTransition);
        }
        incident.state = IncidentState::Cleared;
        info!(rule_id, target_key, "incident cleared");
        Ok(LifecycleEvent::Clear(incident.clone()))
    }

    /// Auto-clear every non-cleared incident whose last alert is older
    /// than the absence window.
    pub fn auto_clear_expired(&self, now: DateTime<Utc>) -> Vec<LifecycleEvent> {
        let cutoff = Duration::seconds(self.config.auto_clear_after_s);
        let mut cleared = Vec::new();
        for mut entry in self.incidents.iter_mut() {
            let incident = entry.value_mut();
            if incident.state != IncidentState::Cleared && now - incident.last_seen_ts > cutoff {
                incident.state = IncidentState::Cleared;
                cleared.push(LifecycleEvent::AutoClear(incident.clone()));
            }
        }
        for event in &cleared {
            info!(
                rule_id = event.incident().rule_id,
                target = event.incident().target_key,
                "incident auto-cleared"
            );
        }
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> IncidentStore {
        IncidentStore::new(IncidentConfig::default())
    }

    #[test]
    fn test_first_alert_opens_exactly_once() {
        let store = store();
        let now = Utc::now();
        let opened = store.observe_alert("UNKNOWN_CONTACT_CLOSE", "t1", Severity::Warn, now);
        assert!(matches!(opened, Some(LifecycleEvent::Open(_))));

        // Repeats coalesce silently.
        for i in 1..5 {
            let repeat = store.observe_alert(
                "UNKNOWN_CONTACT_CLOSE",
                "t1",
                Severity::Warn,
                now + Duration::seconds(i),
            );
            assert!(repeat.is_none());
        }
        let all = store.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].count, 5);
        assert_eq!(all[0].state, IncidentState::Open);
    }

    #[test]
    fn test_distinct_targets_are_distinct_incidents() {
        let store = store();
        let now = Utc::now();
        assert!(store
            .observe_alert("UNKNOWN_CONTACT_CLOSE", "t1", Severity::Warn, now)
            .is_some());
        assert!(store
            .observe_alert("UNKNOWN_CONTACT_CLOSE", "t2", Severity::Warn, now)
            .is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_lifecycle_open_ack_clear() {
        let store = store();
        let now = Utc::now();
        store.observe_alert("RULE", "t", Severity::Warn, now);

        let ack = store.ack("RULE", "t").unwrap();
        assert_eq!(ack.kind(), "incident_ack");
        assert_eq!(ack.incident().state, IncidentState::Acked);

        let clear = store.clear("RULE", "t").unwrap();
        assert_eq!(clear.kind(), "incident_clear");
        assert_eq!(clear.incident().state, IncidentState::Cleared);
    }

    #[test]
    fn test_clear_requires_ack_first() {
        let store = store();
        store.observe_alert("RULE", "t", Severity::Warn, Utc::now());
        assert_eq!(store.clear("RULE", "t"), Err(ActionError::InvalidTransition));
    }

    #[test]
    fn test_ack_unknown_incident_fails() {
        let store = store();
        assert_eq!(store.ack("RULE", "missing"), Err(ActionError::NotFound));
    }

    #[test]
    fn test_auto_clear_after_absence_window() {
        let store = store();
        let t0 = Utc::now();
        store.observe_alert("RULE", "t", Severity::Warn, t0);

        // Quiet but within the window: nothing happens.
        let events = store.auto_clear_expired(t0 + Duration::seconds(60));
        assert!(events.is_empty());

        // Past the window: auto-clear fires once.
        let events = store.auto_clear_expired(t0 + Duration::seconds(301));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "incident_auto_clear");

        let events = store.auto_clear_expired(t0 + Duration::seconds(400));
        assert!(events.is_empty());
    }

    #[test]
    fn test_reopen_after_clear_is_a_new_lifecycle() {
        let store = store();
        let t0 = Utc::now();
        store.observe_alert("RULE", "t", Severity::Warn, t0);
        store.ack("RULE", "t").unwrap();
        store.clear("RULE", "t").unwrap();

        let reopened = store.observe_alert("RULE", "t", Severity::Warn, t0 + Duration::seconds(10));
        assert!(matches!(reopened, Some(LifecycleEvent::Open(_))));
        let all = store.all();
        assert_eq!(all[0].count, 1);
    }
}
