//! The agent FSM snapshot DTO.
//!
//! This is the only external representation of agent FSM state. The store
//! that owns it fingerprints the canonical serialisation, so two snapshots
//! are "the same" exactly when their canonical bytes are equal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum retained history entries per snapshot.
pub const MAX_HISTORY: usize = 32;

/// Agent FSM states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FsmState {
    /// Initial state; BIOS not yet validated.
    Booting,
    /// Healthy, no active proposals.
    Idle,
    /// Healthy, proposals in flight.
    Active,
    /// Unrecoverable error observed.
    ErrorState,
    /// Terminal. Entered only on explicit shutdown signal.
    Shutdown,
}

/// One history entry: a past state with the reason it was entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsmHistoryEntry {
    /// The state that was entered.
    pub state: FsmState,
    /// Transition reason code (e.g. `"BOOT_COMPLETE"`).
    pub reason: String,
    /// Wall-clock time of the transition.
    pub ts: DateTime<Utc>,
}

/// An immutable snapshot of the agent FSM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsmSnapshot {
    /// Current state.
    pub state: FsmState,
    /// Reason the current state was entered.
    pub reason: String,
    /// Bounded transition history, oldest first.
    pub history: Vec<FsmHistoryEntry>,
    /// Free-form context captured at transition time.
    #[serde(default)]
    pub context_data: Map<String, Value>,
    /// Module that produced this snapshot.
    pub source_module: String,
    /// Consecutive attempts in the current state (e.g. error retries).
    pub attempt_count: u32,
}

impl FsmSnapshot {
    /// The initial snapshot written once at process start.
    #[must_use]
    pub fn cold_start(source_module: &str) -> Self {
        Self {
            state: FsmState::Booting,
            reason: "COLD_START".to_string(),
            history: Vec::new(),
            context_data: Map::new(),
            source_module: source_module.to_string(),
            attempt_count: 0,
        }
    }

    /// Produce the successor snapshot for a transition, carrying bounded
    /// history forward.
    #[must_use]
    pub fn transition(&self, state: FsmState, reason: &str, ts: DateTime<Utc>) -> Self {
        let mut history = self.history.clone();
        history.push(FsmHistoryEntry {
            state: self.state,
            reason: self.reason.clone(),
            ts,
        });
        if history.len() > MAX_HISTORY {
            let excess = history.len() - MAX_HISTORY;
            history.drain(..excess);
        }
        Self {
            state,
            reason: reason.to_string(),
            history,
            context_data: self.context_data.clone(),
            source_module: self.source_module.clone(),
            attempt_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cold_start_shape() {
        let snapshot = FsmSnapshot::cold_start("agent");
        assert_eq!(snapshot.state, FsmState::Booting);
        assert_eq!(snapshot.reason, "COLD_START");
        assert!(snapshot.history.is_empty());
    }

    #[test]
    fn test_transition_appends_history() {
        let boot = FsmSnapshot::cold_start("agent");
        let idle = boot.transition(FsmState::Idle, "BOOT_COMPLETE", Utc::now());
        assert_eq!(idle.state, FsmState::Idle);
        assert_eq!(idle.history.len(), 1);
        assert_eq!(idle.history[0].state, FsmState::Booting);
        assert_eq!(idle.history[0].reason, "COLD_START");
    }

    #[test]
    fn test_history_is_bounded() {
        let mut snapshot = FsmSnapshot::cold_start("agent");
        for i in 0..(MAX_HISTORY * 2) {
            let next = if i % 2 == 0 {
                FsmState::Active
            } else {
                FsmState::Idle
            };
            snapshot = snapshot.transition(next, "flip", Utc::now());
        }
        assert_eq!(snapshot.history.len(), MAX_HISTORY);
    }

    #[test]
    fn test_dto_roundtrip_preserves_state_reason_history() {
        let boot = FsmSnapshot::cold_start("agent");
        let idle = boot.transition(FsmState::Idle, "BOOT_COMPLETE", Utc::now());
        let json = serde_json::to_string(&idle).unwrap();
        let restored: FsmSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.state, idle.state);
        assert_eq!(restored.reason, idle.reason);
        assert_eq!(restored.history, idle.history);
    }

    #[test]
    fn test_state_wire_form() {
        assert_eq!(
            serde_json::to_string(&FsmState::ErrorState).unwrap(),
            "\"ERROR_STATE\""
        );
        assert_eq!(
            serde_json::to_string(&FsmState::Booting).unwrap(),
            "\"BOOTING\""
        );
    }
}
