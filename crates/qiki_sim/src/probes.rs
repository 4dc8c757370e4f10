//! HTTP point probes.
//!
//! The bus is the preferred command path; these endpoints exist for point
//! probes only and mirror the RPC surface one-to-one: `/healthz`,
//! `/sensors`, `/radar/frame`. All other paths return 404.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tracing::info;

use qiki_contracts::radar::RadarFrame;
use qiki_contracts::telemetry::TelemetrySnapshot;

/// Latest tick products shared with the probe server.
#[derive(Debug, Default)]
pub struct ProbeState {
    /// Last published snapshot.
    pub telemetry: Mutex<Option<TelemetrySnapshot>>,
    /// Last published radar frame.
    pub frame: Mutex<Option<RadarFrame>>,
}

impl ProbeState {
    /// Store the latest snapshot.
    pub fn set_telemetry(&self, snapshot: TelemetrySnapshot) {
        if let Ok(mut guard) = self.telemetry.lock() {
            *guard = Some(snapshot);
        }
    }

    /// Store the latest frame.
    pub fn set_frame(&self, frame: RadarFrame) {
        if let Ok(mut guard) = self.frame.lock() {
            *guard = Some(frame);
        }
    }
}

/// Build the probe router.
#[must_use]
pub fn router(state: Arc<ProbeState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/sensors", get(sensors))
        .route("/radar/frame", get(radar_frame))
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({"ok": true}))
}

async fn sensors(State(state): State<Arc<ProbeState>>) -> Response {
    let snapshot = state.telemetry.lock().ok().and_then(|g| g.clone());
    match snapshot {
        Some(snapshot) => Json(json!({
            "sensor_plane": snapshot.sensor_plane,
            "radiation_usvh": snapshot.radiation_usvh,
            "temp_core_c": snapshot.temp_core_c,
            "temp_external_c": snapshot.temp_external_c,
        }))
        .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn radar_frame(State(state): State<Arc<ProbeState>>) -> Response {
    let frame = state.frame.lock().ok().and_then(|g| g.clone());
    match frame {
        Some(frame) => Json(frame).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

/// Serve the probe router until the process exits.
///
/// # Errors
///
/// Returns an error if the listener cannot bind.
pub async fn serve(addr: &str, state: Arc<ProbeState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "probe server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
