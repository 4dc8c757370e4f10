//! # qiki_agent
//!
//! The agent: a fixed-period tick orchestrator over an explicit context
//! struct, a single-writer FSM state store, and proposal engines that only
//! ever advise — the agent never actuates.
//!
//! - [`store`] — the SSOT FSM store: one writer, immutable snapshots,
//!   monotone versions, subscriber queues.
//! - [`context`] — the per-tick [`AgentContext`](context::AgentContext) and
//!   the data provider seam.
//! - [`fsm`] — the transition table.
//! - [`proposals`] — proposal engines and the evaluator.
//! - [`tick`] — the tick loop with its five phases.

pub mod context;
pub mod fsm;
pub mod proposals;
pub mod store;
pub mod tick;

pub use context::{AgentContext, DataProvider};
pub use store::{FsmStore, FsmWriter};
pub use tick::{AgentConfig, AgentTickLoop};
