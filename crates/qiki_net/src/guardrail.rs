//! Anti-loop guardrails.
//!
//! Process-level checks that forbid parallel canons: a second wire major
//! alongside a live one, a second subject for a value that already has a
//! canonical telemetry field, and proposals that carry actuation. Strict
//! mode turns violations into hard errors; lenient mode logs and refuses.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::warn;

/// How a guardrail violation is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardrailMode {
    /// Violations are fatal errors.
    #[default]
    Strict,
    /// Violations are logged and the action is refused.
    Lenient,
}

/// A forbidden action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardrailViolation {
    /// A second major version was registered for a live subject family.
    #[error("wire major v{requested} registered alongside live v{live} for family {family}")]
    DuplicateWireMajor {
        /// Subject family (e.g. `"qiki.radar"`).
        family: String,
        /// The major already live.
        live: u32,
        /// The major that was refused.
        requested: u32,
    },

    /// A subject was registered for a value that already has a canonical
    /// telemetry field.
    #[error("subject {subject} duplicates the canonical field {canonical_field}")]
    SecondSourceOfTruth {
        /// The refused subject.
        subject: String,
        /// The existing canonical field.
        canonical_field: String,
    },

    /// A proposal carried actions outside the proposals-only policy.
    #[error("proposal {proposal_id} carries {action_count} action(s); proposals never actuate")]
    ProposalCarriesActions {
        /// The offending proposal id.
        proposal_id: String,
        /// How many actions it carried.
        action_count: usize,
    },
}

/// Registry of live wire majors per subject family.
///
/// Every service registers the families it publishes at startup. The first
/// registration of a family pins its major; a different major for the same
/// family is a violation for the life of the process.
#[derive(Debug, Default)]
pub struct SubjectRegistry {
    mode: GuardrailMode,
    majors: Mutex<HashMap<String, u32>>,
}

impl SubjectRegistry {
    /// Create a registry with the given mode.
    #[must_use]
    pub fn new(mode: GuardrailMode) -> Self {
        Self {
            mode,
            majors: Mutex::new(HashMap::new()),
        }
    }

    /// Register a wire major for a subject family.
    ///
    /// # Errors
    ///
    /// Returns [`GuardrailViolation::DuplicateWireMajor`] in strict mode if
    /// the family is already live on a different major. In lenient mode the
    /// registration is refused with a WARN and `Ok(false)` is returned.
    pub fn register_major(&self, family: &str, major: u32) -> Result<bool, GuardrailViolation> {
        let mut majors = self.majors.lock().unwrap_or_else(|e| e.into_inner());
        match majors.get(family) {
            None => {
                majors.insert(family.to_string(), major);
                Ok(true)
            }
            Some(&live) if live == major => Ok(true),
            Some(&live) => {
                let violation = GuardrailViolation::DuplicateWireMajor {
                    family: family.to_string(),
                    live,
                    requested: major,
                };
                match self.mode {
                    GuardrailMode::Strict => Err(violation),
                    GuardrailMode::Lenient => {
                        warn!(%violation, "guardrail refused wire major registration");
                        Ok(false)
                    }
                }
            }
        }
    }

    /// The live major for a family, if one is registered.
    #[must_use]
    pub fn live_major(&self, family: &str) -> Option<u32> {
        self.majors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(family)
            .copied()
    }
}

/// Enforce the proposals-only policy on an outbound proposal.
///
/// # Errors
///
/// Returns [`GuardrailViolation::ProposalCarriesActions`] if the proposal
/// has a non-empty `actions` list.
pub fn check_proposals_only(
    proposal: &qiki_contracts::proposal::Proposal,
) -> Result<(), GuardrailViolation> {
    if proposal.actions.is_empty() {
        Ok(())
    } else {
        Err(GuardrailViolation::ProposalCarriesActions {
            proposal_id: proposal.id.to_string(),
            action_count: proposal.actions.len(),
        })
    }
}
