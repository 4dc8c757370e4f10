//! The simulation tick loop.
//!
//! Fixed-timestep loop over the world: drain queued control commands,
//! advance the world, publish the tick's products. A failed tick is
//! dropped with a WARN audit event and the loop continues; repeated
//! publish failures put the sim in SAFE mode, where command side-effects
//! are suspended but telemetry keeps flowing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::StreamExt;
use tracing::{debug, info, warn};

use qiki_contracts::command::{CommandEnvelope, CommandResponse};
use qiki_contracts::event::{EventEnvelope, Severity};
use qiki_net::connection::PUBLISH_FAILURE_ESCALATION;
use qiki_net::{NatsConnection, subjects};
use qiki_radar::band;

use crate::commands::{self, RunState, SimCommand};
use crate::config::SimConfig;
use crate::probes::ProbeState;
use crate::world::{World, WorldStep};

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct SimTickConfig {
    /// Tick period.
    pub tick_period: Duration,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
    /// Consecutive publish failures before SAFE mode.
    pub safe_after_failures: u32,
}

impl Default for SimTickConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(100),
            max_ticks: 0,
            safe_after_failures: PUBLISH_FAILURE_ESCALATION,
        }
    }
}

/// The simulation tick loop state.
pub struct SimTickLoop {
    config: SimTickConfig,
    sim_config: SimConfig,
    world: World,
    run_state: RunState,
    safe_mode: bool,
    publish_failures: u32,
    probe_state: Arc<ProbeState>,
}

impl SimTickLoop {
    /// Create a tick loop over a fresh world.
    #[must_use]
    pub fn new(config: SimTickConfig, sim_config: SimConfig, probe_state: Arc<ProbeState>) -> Self {
        Self {
            config,
            world: World::new(sim_config.clone()),
            sim_config,
            run_state: RunState::Running { speed: 1.0 },
            safe_mode: false,
            publish_failures: 0,
            probe_state,
        }
    }

    /// Whether the loop is in SAFE mode.
    #[must_use]
    pub fn safe_mode(&self) -> bool {
        self.safe_mode
    }

    /// Current run state.
    #[must_use]
    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// A reference to the world (tests and probes).
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Run one local tick without NATS. Returns the step when running.
    pub fn tick(&mut self) -> Option<WorldStep> {
        match self.run_state {
            RunState::Running { speed } => {
                let dt = self.sim_config.dt() * speed;
                Some(self.world.step(dt))
            }
            RunState::Paused | RunState::Stopped => None,
        }
    }

    /// Handle one command envelope: parse, apply, build the response and
    /// an optional audit event for refusals.
    fn handle_command(
        &mut self,
        envelope: &CommandEnvelope,
    ) -> (CommandResponse, Option<EventEnvelope>) {
        let request_id = envelope.metadata.message_id;

        let command = match commands::parse(envelope) {
            Ok(command) => command,
            Err(err) => {
                warn!(command = envelope.command_name, %err, "command refused");
                let audit = EventEnvelope::new(
                    &self.sim_config.source,
                    subjects::EVENTS_AUDIT,
                    "command_refused",
                    "control",
                    commands::refusal_severity(&err),
                    err.audit_code(),
                    serde_json::json!({
                        "command": envelope.command_name,
                        "error": err.to_string(),
                    }),
                );
                return (CommandResponse::err(request_id, &err.to_string()), Some(audit));
            }
        };

        // SAFE mode suspends command side-effects; telemetry continues.
        if self.safe_mode && !matches!(command, SimCommand::Stop) {
            return (CommandResponse::err(request_id, "safe_mode"), None);
        }

        let response = commands::apply(&command, &mut self.world, &mut self.run_state, request_id);
        let audit = (!response.ok).then(|| {
            EventEnvelope::new(
                &self.sim_config.source,
                subjects::EVENTS_AUDIT,
                "command_refused",
                "control",
                Severity::Warn,
                qiki_contracts::event::codes::CONTROL_IO + 3,
                serde_json::json!({
                    "command": envelope.command_name,
                    "error": response.error.clone(),
                }),
            )
        });
        (response, audit)
    }

    /// Publish every product of one step. Returns how many publishes failed.
    async fn publish_step(&self, conn: &NatsConnection, step: &WorldStep) -> u32 {
        let mut failures = 0;

        // Telemetry is strict publication order within the process; plain
        // core publish keeps it non-persistent.
        if let Err(err) = conn.publish_json(subjects::TELEMETRY, &step.telemetry).await {
            warn!(%err, "telemetry publish failed");
            failures += 1;
        }

        if let Some(frame) = &step.frame {
            if let Err(err) = conn.publish_event(subjects::RADAR_FRAMES, None, frame).await {
                warn!(%err, "frame publish failed");
                failures += 1;
            }
            let lr = band::lr_subset(frame);
            if !lr.detections.is_empty()
                && let Err(err) = conn.publish_event(subjects::RADAR_FRAMES_LR, None, &lr).await
            {
                warn!(%err, "lr frame publish failed");
                failures += 1;
            }
        }

        if !step.tracks.is_empty() {
            if let Err(err) = conn
                .publish_event(subjects::RADAR_TRACKS, None, &step.tracks)
                .await
            {
                warn!(%err, "tracks publish failed");
                failures += 1;
            }
            let sr: Vec<_> = step
                .tracks
                .iter()
                .filter(|t| t.range_band == qiki_contracts::radar::RangeBand::Sr)
                .collect();
            if !sr.is_empty()
                && let Err(err) = conn.publish_event(subjects::RADAR_TRACKS_SR, None, &sr).await
            {
                warn!(%err, "sr tracks publish failed");
                failures += 1;
            }
        }

        for alert in &step.alerts {
            if let Err(err) = conn.publish_event(subjects::GUARD_ALERTS, None, alert).await {
                warn!(%err, "guard alert publish failed");
                failures += 1;
            }
        }

        for edge in &step.edges {
            if let Err(err) = conn.publish_event(subjects::EVENTS_AUDIT, None, edge).await {
                warn!(%err, "edge event publish failed");
                failures += 1;
            }
        }

        failures
    }

    /// Run the NATS-connected tick loop.
    ///
    /// Commands are drained before each tick so the world never changes
    /// mid-step. A tick whose publishes fail repeatedly escalates to SAFE
    /// mode; the loop itself keeps running.
    ///
    /// # Errors
    ///
    /// Returns an error only on subscription setup failure.
    pub async fn run_async(&mut self, conn: &NatsConnection) -> Result<()> {
        let mut command_sub = conn.subscribe(subjects::COMMANDS_CONTROL).await?;

        info!(
            tick_period_ms = self.config.tick_period.as_millis() as u64,
            max_ticks = self.config.max_ticks,
            "starting sim tick loop"
        );

        let mut tick_count = 0u64;

        loop {
            let start = Instant::now();

            // Drain any commands that arrived since the last tick.
            while let Ok(Some(msg)) =
                tokio::time::timeout(Duration::ZERO, command_sub.next()).await
            {
                match qiki_net::decode::<CommandEnvelope>(&msg.payload) {
                    Ok(envelope) => {
                        debug!(command = envelope.command_name, "command received");
                        let (response, audit) = self.handle_command(&envelope);
                        if let Err(err) = conn
                            .publish_json(subjects::RESPONSES_CONTROL, &response)
                            .await
                        {
                            warn!(%err, "command response publish failed");
                        }
                        if let Some(audit) = audit
                            && let Err(err) =
                                conn.publish_event(subjects::EVENTS_AUDIT, None, &audit).await
                        {
                            warn!(%err, "refusal audit publish failed");
                        }
                    }
                    Err(err) => {
                        // Validation failures are dropped, never propagated.
                        warn!(%err, "undecodable command dropped");
                    }
                }
            }

            if let Some(step) = self.tick() {
                self.probe_state.set_telemetry(step.telemetry.clone());
                if let Some(frame) = &step.frame {
                    self.probe_state.set_frame(frame.clone());
                }

                let failures = self.publish_step(conn, &step).await;
                if failures > 0 {
                    self.publish_failures += failures;
                    if !self.safe_mode && self.publish_failures >= self.config.safe_after_failures
                    {
                        self.safe_mode = true;
                        warn!(
                            failures = self.publish_failures,
                            "entering SAFE mode: command side-effects suspended"
                        );
                        let audit = EventEnvelope::new(
                            &self.sim_config.source,
                            subjects::EVENTS_AUDIT,
                            "safe_mode",
                            "control",
                            Severity::Warn,
                            qiki_contracts::event::codes::FAULT + 40,
                            serde_json::json!({"engaged": true}),
                        );
                        if let Err(err) =
                            conn.publish_event(subjects::EVENTS_AUDIT, None, &audit).await
                        {
                            warn!(%err, "safe mode audit publish failed");
                        }
                    }
                } else {
                    self.publish_failures = 0;
                }
            }

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < self.config.tick_period {
                tokio::time::sleep(self.config.tick_period - elapsed).await;
            } else {
                warn!(
                    tick_id = self.world.tick_id(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = self.config.tick_period.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }

        conn.flush().await.ok();
        Ok(())
    }
}
