//! Proposal engines and the evaluator.
//!
//! Engines implement one interface and are configured at startup as an
//! explicit list — no self-registering plugins. The neural engine is a
//! typed placeholder returning nothing until a real model lands. The
//! evaluator filters by confidence, sorts by (type priority, priority,
//! confidence), and keeps the top-k.

use tracing::debug;

use qiki_contracts::proposal::{Proposal, ProposalStatus, ProposalType};

use crate::context::AgentContext;

/// A proposal source evaluated once per tick.
pub trait ProposalEngine: Send {
    /// Engine name, stamped into `source_module`.
    fn name(&self) -> &str;
    /// Produce zero or more proposals for this tick.
    fn evaluate(&mut self, ctx: &AgentContext) -> Vec<Proposal>;
}

/// One rule inside the [`RuleEngine`].
pub trait AgentRule: Send {
    /// Rule identifier.
    fn id(&self) -> &str;
    /// Evaluate against the context.
    fn evaluate(&self, ctx: &AgentContext) -> Option<Proposal>;
}

/// The rule engine: an explicit list of rules behind one interface.
pub struct RuleEngine {
    rules: Vec<Box<dyn AgentRule>>,
}

impl RuleEngine {
    /// Build the engine with the given rules.
    #[must_use]
    pub fn new(rules: Vec<Box<dyn AgentRule>>) -> Self {
        Self { rules }
    }

    /// The stock rule set.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(vec![
            Box::new(LowBatteryRule { threshold_pct: 25.0 }),
            Box::new(ThermalShedRule),
        ])
    }
}

impl ProposalEngine for RuleEngine {
    fn name(&self) -> &str {
        "rule_engine"
    }

    fn evaluate(&mut self, ctx: &AgentContext) -> Vec<Proposal> {
        self.rules
            .iter()
            .filter_map(|rule| {
                let proposal = rule.evaluate(ctx);
                if proposal.is_some() {
                    debug!(rule = rule.id(), "rule proposed");
                }
                proposal
            })
            .collect()
    }
}

/// Advises charging when the battery runs low.
pub struct LowBatteryRule {
    /// SoC threshold, percent.
    pub threshold_pct: f64,
}

impl AgentRule for LowBatteryRule {
    fn id(&self) -> &str {
        "LOW_BATTERY"
    }

    fn evaluate(&self, ctx: &AgentContext) -> Option<Proposal> {
        let telemetry = ctx.telemetry.as_ref()?;
        (telemetry.battery_pct < self.threshold_pct).then(|| {
            Proposal::advisory(
                "rule_engine",
                ProposalType::Safety,
                "battery low: reduce consumers and seek charge",
                0.9,
                0.95,
            )
        })
    }
}

/// Advises inspection while loads are shed for thermal reasons.
pub struct ThermalShedRule;

impl AgentRule for ThermalShedRule {
    fn id(&self) -> &str {
        "THERMAL_SHED"
    }

    fn evaluate(&self, ctx: &AgentContext) -> Option<Proposal> {
        let telemetry = ctx.telemetry.as_ref()?;
        telemetry
            .power
            .shed_reasons
            .iter()
            .any(|r| r == "thermal_overheat")
            .then(|| {
                Proposal::advisory(
                    "rule_engine",
                    ProposalType::Diagnostics,
                    "loads shed for thermal overheat: inspect cooling",
                    0.6,
                    0.8,
                )
            })
    }
}

/// Typed placeholder for the neural engine. Returns no proposals.
#[derive(Debug, Default)]
pub struct NullNeuralEngine;

impl ProposalEngine for NullNeuralEngine {
    fn name(&self) -> &str {
        "neural_null"
    }

    fn evaluate(&mut self, _ctx: &AgentContext) -> Vec<Proposal> {
        Vec::new()
    }
}

/// Filters, ranks, and selects proposals.
#[derive(Debug, Clone)]
pub struct Evaluator {
    /// Minimum confidence to survive the filter.
    pub confidence_threshold: f64,
    /// How many proposals to select.
    pub top_k: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            top_k: 1,
        }
    }
}

impl Evaluator {
    /// Select the top-k proposals. Selected proposals come back `ACCEPTED`;
    /// the rest of the surviving candidates are dropped as `REJECTED`.
    #[must_use]
    pub fn select(&self, mut proposals: Vec<Proposal>) -> Vec<Proposal> {
        proposals.retain(|p| p.confidence >= self.confidence_threshold);
        proposals.sort_by(|a, b| {
            a.proposal_type
                .rank()
                .cmp(&b.proposal_type.rank())
                .then(b.priority.total_cmp(&a.priority))
                .then(b.confidence.total_cmp(&a.confidence))
        });
        proposals.truncate(self.top_k);
        for proposal in &mut proposals {
            proposal.status = ProposalStatus::Accepted;
        }
        proposals
    }
}

#[cfg(test)]
mod tests {
    use qiki_contracts::fsm::FsmState;
    use qiki_contracts::ids::BootId;

    use super::*;

    fn context() -> AgentContext {
        AgentContext {
            fsm_state: FsmState::Idle,
            fsm_version: 1,
            boot_id: BootId::generate(),
            bios: None,
            telemetry: None,
            bios_ok: Some(true),
            missing_components: Vec::new(),
        }
    }

    fn proposal(ty: ProposalType, priority: f64, confidence: f64) -> Proposal {
        Proposal::advisory("test", ty, "x", priority, confidence)
    }

    #[test]
    fn test_low_confidence_is_filtered() {
        let evaluator = Evaluator::default();
        let selected = evaluator.select(vec![proposal(ProposalType::Safety, 1.0, 0.5)]);
        assert!(selected.is_empty());
    }

    #[test]
    fn test_safety_outranks_planning() {
        let evaluator = Evaluator::default();
        let selected = evaluator.select(vec![
            proposal(ProposalType::Planning, 1.0, 1.0),
            proposal(ProposalType::Safety, 0.1, 0.7),
        ]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].proposal_type, ProposalType::Safety);
        assert_eq!(selected[0].status, ProposalStatus::Accepted);
    }

    #[test]
    fn test_priority_breaks_ties_within_type() {
        let evaluator = Evaluator {
            top_k: 2,
            ..Evaluator::default()
        };
        let selected = evaluator.select(vec![
            proposal(ProposalType::Planning, 0.2, 0.9),
            proposal(ProposalType::Planning, 0.8, 0.7),
        ]);
        assert!(selected[0].priority > selected[1].priority);
    }

    #[test]
    fn test_null_neural_engine_returns_nothing() {
        let mut engine = NullNeuralEngine;
        assert!(engine.evaluate(&context()).is_empty());
        assert_eq!(engine.name(), "neural_null");
    }

    #[test]
    fn test_rules_need_telemetry() {
        let mut engine = RuleEngine::with_defaults();
        // No telemetry yet: rules return nothing rather than inventing data.
        assert!(engine.evaluate(&context()).is_empty());
    }

    #[test]
    fn test_selected_proposals_carry_no_actions() {
        let evaluator = Evaluator::default();
        let selected = evaluator.select(vec![proposal(ProposalType::Safety, 0.9, 0.9)]);
        assert!(selected.iter().all(|p| p.actions.is_empty()));
    }
}
