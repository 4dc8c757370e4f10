//! # q-sim — the simulation service
//!
//! Owns the canonical world state. One telemetry snapshot per tick, edge
//! events on threshold crossings, radar products on the radar stream, and
//! the `sim.*` command surface on the control subject.
//!
//! ## Startup sequence
//!
//! 1. Load config (YAML path from argv, defaults otherwise).
//! 2. Connect to NATS (`NATS_URL`, default `nats://localhost:4222`).
//! 3. Ensure the JetStream streams exist.
//! 4. Start the HTTP point probes.
//! 5. Enter the fixed-timestep tick loop.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use qiki_net::guardrail::{GuardrailMode, SubjectRegistry};
use qiki_net::{NatsConnection, streams};
use qiki_sim::config::{ConfigError, SimConfig};
use qiki_sim::probes::{self, ProbeState};
use qiki_sim::tick::{SimTickConfig, SimTickLoop};

/// Exit code for configuration errors.
const EXIT_CONFIG: u8 = 2;
/// Exit code when the bus is unreachable after retries.
const EXIT_BUS: u8 = 3;
/// Exit code for unrecoverable internal errors.
const EXIT_INTERNAL: u8 = 4;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "configuration error");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    info!(source = config.source, "sim starting");

    // Pin the wire majors this process publishes. A second major for a
    // live family is refused for the life of the process.
    let registry = SubjectRegistry::new(GuardrailMode::Strict);
    for family in ["qiki.radar", "qiki.events"] {
        if let Err(err) = registry.register_major(family, 1) {
            error!(%err, "guardrail violation");
            return ExitCode::from(EXIT_INTERNAL);
        }
    }

    let conn = match connect_with_retries().await {
        Ok(conn) => conn,
        Err(err) => {
            error!(%err, "bus unreachable after retries");
            return ExitCode::from(EXIT_BUS);
        }
    };

    if let Err(err) = streams::ensure_streams(&conn.jetstream()).await {
        error!(%err, "stream setup failed");
        return ExitCode::from(EXIT_BUS);
    }

    let probe_state = Arc::new(ProbeState::default());
    let probe_addr = config.probe_addr.clone();
    {
        let probe_state = Arc::clone(&probe_state);
        tokio::spawn(async move {
            if let Err(err) = probes::serve(&probe_addr, probe_state).await {
                error!(%err, "probe server failed");
            }
        });
    }

    let tick_config = SimTickConfig {
        tick_period: Duration::from_millis(config.tick_period_ms),
        ..SimTickConfig::default()
    };
    let mut tick_loop = SimTickLoop::new(tick_config, config, probe_state);

    if let Err(err) = tick_loop.run_async(&conn).await {
        error!(%err, "tick loop failed");
        return ExitCode::from(EXIT_INTERNAL);
    }

    info!("sim shut down");
    ExitCode::SUCCESS
}

fn load_config() -> Result<SimConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => SimConfig::load(&path),
        None => {
            let mut config = SimConfig::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }
}

async fn connect_with_retries() -> Result<NatsConnection, qiki_net::NetError> {
    let mut backoff = qiki_net::connection::Backoff::default();
    loop {
        match NatsConnection::connect().await {
            Ok(conn) => return Ok(conn),
            Err(err) if backoff.attempts() < 5 => {
                let delay = backoff.next_delay();
                tracing::warn!(%err, delay_ms = delay.as_millis() as u64, "connect failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
