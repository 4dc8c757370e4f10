//! The BIOS HTTP surface.
//!
//! `GET /healthz → {ok:true}`; `GET /bios/status → BiosStatus`; all other
//! paths 404.

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde_json::json;
use tracing::info;

use qiki_contracts::bios::BiosStatus;

/// Latest status shared with the HTTP server.
#[derive(Debug, Default)]
pub struct HttpState {
    /// Last computed status.
    pub status: Mutex<Option<BiosStatus>>,
}

impl HttpState {
    /// Store the latest status.
    pub fn set_status(&self, status: BiosStatus) {
        if let Ok(mut guard) = self.status.lock() {
            *guard = Some(status);
        }
    }
}

/// Build the BIOS router.
#[must_use]
pub fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/bios/status", get(bios_status))
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({"ok": true}))
}

async fn bios_status(State(state): State<Arc<HttpState>>) -> Response {
    let status = state.status.lock().ok().and_then(|g| g.clone());
    match status {
        Some(status) => Json(status).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

/// Serve the router until the process exits.
///
/// # Errors
///
/// Returns an error if the listener cannot bind.
pub async fn serve(addr: &str, state: Arc<HttpState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "bios http listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_stores_status() {
        let state = HttpState::default();
        assert!(state.status.lock().unwrap().is_none());
        state.set_status(BiosStatus {
            firmware_version: "t".to_string(),
            all_systems_go: true,
            post_results: vec![],
            hardware_profile_hash: None,
            uptime_s: 0,
        });
        assert!(state.status.lock().unwrap().is_some());
    }
}
