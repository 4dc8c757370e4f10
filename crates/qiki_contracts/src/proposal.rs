//! Agent proposals.
//!
//! The agent never actuates. A proposal is advice for a human operator; its
//! `actions` list must be empty on the wire, and the emitting boundary
//! refuses anything else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Proposal class, in descending evaluation priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalType {
    /// Safety-relevant advice. Highest priority.
    Safety,
    /// Mission planning advice.
    Planning,
    /// Diagnostics advice.
    Diagnostics,
    /// Exploratory advice. Lowest priority.
    Exploration,
}

impl ProposalType {
    /// Sort key: lower is more important.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Safety => 0,
            Self::Planning => 1,
            Self::Diagnostics => 2,
            Self::Exploration => 3,
        }
    }
}

/// Proposal lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    /// Created this tick, not yet evaluated.
    Pending,
    /// Selected by the evaluator. Terminal.
    Accepted,
    /// Filtered out by the evaluator. Terminal.
    Rejected,
    /// Carried out by an operator. Terminal.
    Executed,
    /// Aged out unactioned. Terminal.
    Expired,
}

impl ProposalStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A single agent proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Stable proposal identifier.
    pub id: Uuid,
    /// Engine that produced the proposal.
    pub source_module: String,
    /// Creation time.
    pub ts: DateTime<Utc>,
    /// Must be empty: proposals never carry actuation.
    pub actions: Vec<Value>,
    /// Human-readable justification.
    pub justification: String,
    /// Relative priority within the type, in `[0, 1]`.
    pub priority: f64,
    /// Engine confidence, in `[0, 1]`.
    pub confidence: f64,
    /// Proposal class.
    #[serde(rename = "type")]
    pub proposal_type: ProposalType,
    /// Lifecycle status.
    pub status: ProposalStatus,
    /// Proposals this one depends on.
    #[serde(default)]
    pub depends_on: Vec<Uuid>,
    /// Proposals this one conflicts with.
    #[serde(default)]
    pub conflicts_with: Vec<Uuid>,
}

impl Proposal {
    /// Build a pending proposal with no actions.
    #[must_use]
    pub fn advisory(
        source_module: &str,
        proposal_type: ProposalType,
        justification: &str,
        priority: f64,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_module: source_module.to_string(),
            ts: Utc::now(),
            actions: Vec::new(),
            justification: justification.to_string(),
            priority,
            confidence,
            proposal_type,
            status: ProposalStatus::Pending,
            depends_on: Vec::new(),
            conflicts_with: Vec::new(),
        }
    }
}
