//! The agent tick orchestrator.
//!
//! Fixed-period loop with five phases in order: update context, handle
//! BIOS, handle FSM (the store's only writer, at most one write per tick),
//! evaluate proposals, make decision. The decision is always advisory —
//! selected proposals go out on the intents subject and nothing is ever
//! actuated.

use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, info, warn};

use qiki_contracts::bios::BiosStatusEvent;
use qiki_contracts::event::{EventEnvelope, Severity, codes};
use qiki_contracts::fsm::FsmState;
use qiki_contracts::proposal::Proposal;
use qiki_contracts::telemetry::TelemetrySnapshot;
use qiki_net::guardrail::{GuardrailViolation, check_proposals_only};
use qiki_net::{NatsConnection, subjects};

use crate::context::{AgentContext, DataProvider};
use crate::fsm::{TransitionInput, next_snapshot};
use crate::proposals::{Evaluator, NullNeuralEngine, ProposalEngine, RuleEngine};
use crate::store::{FsmStore, FsmWriter, StoreError};

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Module name stamped into snapshots and events.
    pub source_module: String,
    /// Tick period.
    pub tick_interval: Duration,
    /// SAFE_MODE hold after a failed tick phase.
    pub recovery_delay: Duration,
    /// Proposal selection parameters.
    pub evaluator: Evaluator,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            source_module: "q-agent".to_string(),
            tick_interval: Duration::from_secs(5),
            recovery_delay: Duration::from_secs(2),
            evaluator: Evaluator::default(),
        }
    }
}

/// A tick failure. The loop recovers; the error never escapes the
/// component boundary unconverted.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// The FSM store refused a write.
    #[error("fsm store: {0}")]
    Store(#[from] StoreError),
    /// A proposal violated the proposals-only policy.
    #[error("guardrail: {0}")]
    Guardrail(#[from] GuardrailViolation),
    /// The single writer was already taken — a second orchestrator exists.
    #[error("fsm writer unavailable: a second writer was requested")]
    WriterUnavailable,
}

/// The observable result of one tick.
#[derive(Debug)]
pub struct TickReport {
    /// Store version after the tick.
    pub fsm_version: u64,
    /// Whether this tick wrote the store.
    pub fsm_written: bool,
    /// Selected proposals, ready to publish.
    pub proposals: Vec<Proposal>,
}

/// The agent tick loop. Owns the single FSM writer.
pub struct AgentTickLoop {
    config: AgentConfig,
    store: FsmStore,
    writer: FsmWriter,
    engines: Vec<Box<dyn ProposalEngine>>,
    last_had_proposals: bool,
    shutdown_requested: bool,
}

impl AgentTickLoop {
    /// Create the loop, its store, and the default engines. The initial
    /// `BOOTING`/`COLD_START` snapshot is written by store construction.
    ///
    /// # Errors
    ///
    /// Returns [`TickError`] if the store cannot be initialised.
    pub fn new(config: AgentConfig) -> Result<Self, TickError> {
        let store = FsmStore::new(&config.source_module)?;
        let writer = store.take_writer().ok_or(TickError::WriterUnavailable)?;
        Ok(Self {
            config,
            store,
            writer,
            engines: vec![
                Box::new(RuleEngine::with_defaults()),
                Box::new(NullNeuralEngine),
            ],
            last_had_proposals: false,
            shutdown_requested: false,
        })
    }

    /// Reader handle to the store.
    #[must_use]
    pub fn store(&self) -> &FsmStore {
        &self.store
    }

    /// Request the terminal shutdown transition on the next tick.
    pub fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// Returns [`TickError`] when a phase fails; the caller enters
    /// SAFE_MODE for `recovery_delay` and resumes.
    pub fn tick(&mut self, provider: &mut dyn DataProvider) -> Result<TickReport, TickError> {
        // Phase 1: update context. FSM state comes from the store — never
        // guessed, never defaulted by the provider.
        let view = self.store.get();
        let mut ctx = AgentContext {
            fsm_state: view.snapshot.state,
            fsm_version: view.version,
            boot_id: view.boot_id,
            bios: None,
            telemetry: provider.latest_telemetry(),
            bios_ok: None,
            missing_components: Vec::new(),
        };

        // Phase 2: handle BIOS.
        if let Some(event) = provider.latest_bios() {
            ctx.apply_bios(event);
        }

        // Phase 3: handle FSM — the only place the store is written.
        let input = TransitionInput {
            bios_ok: ctx.bios_ok,
            has_valid_proposals: self.last_had_proposals,
            fatal_error: false,
            shutdown: self.shutdown_requested,
        };
        let mut fsm_written = false;
        let mut state_after = ctx.fsm_state;
        if let Some(next) = next_snapshot(&view.snapshot, &input, Utc::now()) {
            state_after = next.state;
            self.writer.set(&next)?;
            fsm_written = true;
        }

        // Phase 4: evaluate proposals. Engines only run in healthy states.
        let selected = if matches!(state_after, FsmState::Idle | FsmState::Active) {
            let mut candidates = Vec::new();
            for engine in &mut self.engines {
                candidates.extend(engine.evaluate(&ctx));
            }
            self.config.evaluator.select(candidates)
        } else {
            Vec::new()
        };

        // Phase 5: make decision — proposals only, never actuation.
        for proposal in &selected {
            check_proposals_only(proposal)?;
        }
        self.last_had_proposals = !selected.is_empty();

        Ok(TickReport {
            fsm_version: self.store.get().version,
            fsm_written,
            proposals: selected,
        })
    }

    /// Run the NATS-connected loop until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error only on subscription setup failure.
    pub async fn run_async(&mut self, conn: &NatsConnection) -> Result<()> {
        let mut bios_sub = conn.subscribe(subjects::EVENTS_BIOS_STATUS).await?;
        let mut telemetry_sub = conn.subscribe(subjects::TELEMETRY).await?;
        let mut provider = LatestValues::default();

        info!(
            tick_interval_s = self.config.tick_interval.as_secs(),
            boot_id = %self.store.boot_id(),
            "agent tick loop starting"
        );

        loop {
            let start = Instant::now();

            // Drain the latest inputs since the previous tick.
            while let Ok(Some(msg)) = tokio::time::timeout(Duration::ZERO, bios_sub.next()).await {
                match qiki_net::decode::<BiosStatusEvent>(&msg.payload) {
                    Ok(event) => provider.bios = Some(event),
                    Err(err) => warn!(%err, "undecodable bios status dropped"),
                }
            }
            while let Ok(Some(msg)) =
                tokio::time::timeout(Duration::ZERO, telemetry_sub.next()).await
            {
                match qiki_net::decode::<TelemetrySnapshot>(&msg.payload) {
                    Ok(snapshot) => provider.telemetry = Some(snapshot),
                    Err(err) => warn!(%err, "undecodable telemetry dropped"),
                }
            }

            match self.tick(&mut provider) {
                Ok(report) => {
                    if report.fsm_written {
                        info!("FSM: {}", self.store.get_json_for_logs());
                        let view = self.store.get();
                        let dto = serde_json::json!({
                            "version": view.version,
                            "boot_id": view.boot_id.as_str(),
                            "snapshot": &*view.snapshot,
                        });
                        if let Err(err) =
                            conn.publish_json(subjects::RESPONSES_QIKI, &dto).await
                        {
                            warn!(%err, "fsm snapshot publish failed");
                        }
                    }
                    for proposal in &report.proposals {
                        let id = proposal.id.to_string();
                        if let Err(err) = conn
                            .publish_event(subjects::INTENTS, Some(&id), proposal)
                            .await
                        {
                            warn!(%err, "proposal publish failed");
                        } else {
                            debug!(proposal = %proposal.id, "proposal emitted");
                        }
                    }

                    if self.store.get().snapshot.state == FsmState::Shutdown {
                        info!("shutdown transition complete");
                        break;
                    }
                }
                Err(err) => {
                    // SAFE_MODE: WARN event, hold, resume.
                    warn!(%err, "tick phase failed; entering SAFE_MODE");
                    let audit = EventEnvelope::new(
                        &self.config.source_module,
                        subjects::EVENTS_AUDIT,
                        "agent_safe_mode",
                        "agent",
                        Severity::Warn,
                        codes::FAULT + 50,
                        serde_json::json!({"error": err.to_string()}),
                    );
                    if let Err(err) =
                        conn.publish_event(subjects::EVENTS_AUDIT, None, &audit).await
                    {
                        warn!(%err, "safe mode audit publish failed");
                    }
                    tokio::time::sleep(self.config.recovery_delay).await;
                }
            }

            if self.shutdown_requested && self.store.get().snapshot.state == FsmState::Shutdown {
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < self.config.tick_interval {
                tokio::select! {
                    () = tokio::time::sleep(self.config.tick_interval - elapsed) => {}
                    _ = tokio::signal::ctrl_c() => {
                        info!("shutdown signal received");
                        self.request_shutdown();
                    }
                }
            }
        }

        conn.flush().await.ok();
        Ok(())
    }
}

/// Latest-value provider backed by the drained subscriptions.
#[derive(Debug, Default)]
struct LatestValues {
    bios: Option<BiosStatusEvent>,
    telemetry: Option<TelemetrySnapshot>,
}

impl DataProvider for LatestValues {
    fn latest_bios(&mut self) -> Option<BiosStatusEvent> {
        self.bios.clone()
    }

    fn latest_telemetry(&mut self) -> Option<TelemetrySnapshot> {
        self.telemetry.clone()
    }
}
