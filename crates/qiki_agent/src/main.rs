//! # q-agent — the agent service
//!
//! Ingests BIOS status and telemetry, runs the five-phase tick, owns the
//! single FSM writer, and emits proposals on the intents subject. Never
//! actuates.

use std::process::ExitCode;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use qiki_agent::tick::{AgentConfig, AgentTickLoop, TickError};
use qiki_net::NatsConnection;

const EXIT_BUS: u8 = 3;
const EXIT_INTERNAL: u8 = 4;

/// The legacy toggle for the state store. The store is authoritative in
/// this major; disabling it is refused with a warning.
const USE_STATESTORE_ENV: &str = "QIKI_USE_STATESTORE";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Ok(value) = std::env::var(USE_STATESTORE_ENV)
        && matches!(value.as_str(), "0" | "false" | "off")
    {
        warn!("{} is disabled in config but the state store is authoritative; ignoring", USE_STATESTORE_ENV);
    }

    let mut agent = match AgentTickLoop::new(AgentConfig::default()) {
        Ok(agent) => agent,
        Err(TickError::WriterUnavailable) => {
            error!("a second FSM writer was requested; refusing to start");
            return ExitCode::from(EXIT_INTERNAL);
        }
        Err(err) => {
            error!(%err, "agent init failed");
            return ExitCode::from(EXIT_INTERNAL);
        }
    };

    info!(boot_id = %agent.store().boot_id(), "agent starting");

    let conn = match NatsConnection::connect().await {
        Ok(conn) => conn,
        Err(err) => {
            error!(%err, "bus unreachable");
            return ExitCode::from(EXIT_BUS);
        }
    };

    if let Err(err) = agent.run_async(&conn).await {
        error!(%err, "agent loop failed");
        return ExitCode::from(EXIT_INTERNAL);
    }

    info!("agent shut down");
    ExitCode::SUCCESS
}
