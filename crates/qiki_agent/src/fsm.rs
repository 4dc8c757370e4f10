//! The FSM transition table.
//!
//! Pure function of the current snapshot and the tick's inputs. `SHUTDOWN`
//! is terminal and entered only on the explicit signal; a fatal error wins
//! over everything else.

use chrono::{DateTime, Utc};

use qiki_contracts::fsm::{FsmSnapshot, FsmState};

/// Inputs the table decides on.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionInput {
    /// BIOS verdict; `None` until the first report arrives.
    pub bios_ok: Option<bool>,
    /// Whether the previous tick selected at least one proposal.
    pub has_valid_proposals: bool,
    /// A tick phase failed fatally.
    pub fatal_error: bool,
    /// Explicit shutdown signal.
    pub shutdown: bool,
}

/// Compute the successor snapshot, or `None` when the state holds.
#[must_use]
pub fn next_snapshot(
    current: &FsmSnapshot,
    input: &TransitionInput,
    now: DateTime<Utc>,
) -> Option<FsmSnapshot> {
    // Terminal: nothing leaves SHUTDOWN.
    if current.state == FsmState::Shutdown {
        return None;
    }
    if input.shutdown {
        return Some(current.transition(FsmState::Shutdown, "SHUTDOWN_SIGNAL", now));
    }
    if input.fatal_error && current.state != FsmState::ErrorState {
        return Some(current.transition(FsmState::ErrorState, "FATAL_ERROR", now));
    }

    match current.state {
        FsmState::Booting => match input.bios_ok {
            Some(true) => Some(current.transition(FsmState::Idle, "BOOT_COMPLETE", now)),
            Some(false) => Some(current.transition(FsmState::ErrorState, "BIOS_ERROR", now)),
            None => None, // no BIOS report yet; hold
        },
        FsmState::Idle if input.has_valid_proposals => {
            Some(current.transition(FsmState::Active, "PROPOSALS_ACTIVE", now))
        }
        FsmState::Active if !input.has_valid_proposals => {
            Some(current.transition(FsmState::Idle, "PROPOSALS_DRAINED", now))
        }
        _ => None,
    }
}
