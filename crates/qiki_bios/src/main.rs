//! # q-bios — the BIOS service
//!
//! Loads the hardware profile, runs POST, and publishes status events
//! periodically and on change. Serves `/healthz` and `/bios/status`.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use qiki_bios::http::{self, HttpState};
use qiki_bios::profile::HardwareProfile;
use qiki_bios::status::{DEFAULT_INTERVAL_S, StatusPublisher};
use qiki_net::NatsConnection;

const EXIT_CONFIG: u8 = 2;
const EXIT_BUS: u8 = 3;
const EXIT_INTERNAL: u8 = 4;

/// Default profile path when none is given on the command line.
const DEFAULT_PROFILE: &str = "config/hardware_profile.yaml";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
    let profile = match HardwareProfile::load(&path) {
        Ok(profile) => profile,
        Err(err) => {
            error!(%err, "configuration error");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    info!(firmware = profile.firmware_version, "bios starting");

    let conn = match NatsConnection::connect().await {
        Ok(conn) => conn,
        Err(err) => {
            error!(%err, "bus unreachable");
            return ExitCode::from(EXIT_BUS);
        }
    };

    let mut publisher = StatusPublisher::new(profile, Duration::from_secs(DEFAULT_INTERVAL_S));

    let http_state = Arc::new(HttpState::default());
    http_state.set_status(publisher.status());
    {
        let http_state = Arc::clone(&http_state);
        tokio::spawn(async move {
            if let Err(err) = http::serve("127.0.0.1:8082", http_state).await {
                error!(%err, "bios http failed");
            }
        });
    }

    if let Err(err) = publisher.run(&conn, Some(http_state)).await {
        error!(%err, "status publisher failed");
        return ExitCode::from(EXIT_INTERNAL);
    }
    ExitCode::SUCCESS
}
