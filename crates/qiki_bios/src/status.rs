//! BIOS status publishing.
//!
//! Status goes out on the BIOS status subject every `interval_s` **and**
//! immediately when the POST picture changes. The change check is a
//! fingerprint over the serialised results, so a republished identical
//! status within the interval is suppressed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};

use qiki_contracts::bios::{BiosStatus, BiosStatusEvent, PostResult};
use qiki_net::{NatsConnection, subjects};

use crate::http::HttpState;
use crate::post::{all_systems_go, run_post};
use crate::profile::HardwareProfile;

/// Default publish interval, seconds.
pub const DEFAULT_INTERVAL_S: u64 = 10;

/// Periodic + on-change BIOS status publisher.
pub struct StatusPublisher {
    profile: HardwareProfile,
    profile_hash: String,
    interval: Duration,
    started: Instant,
    last_fingerprint: Option<String>,
}

impl StatusPublisher {
    /// Create a publisher over a loaded profile.
    #[must_use]
    pub fn new(profile: HardwareProfile, interval: Duration) -> Self {
        let profile_hash = profile.hash();
        Self {
            profile,
            profile_hash,
            interval,
            started: Instant::now(),
            last_fingerprint: None,
        }
    }

    /// The deterministic profile hash.
    #[must_use]
    pub fn profile_hash(&self) -> &str {
        &self.profile_hash
    }

    /// Build the current status.
    #[must_use]
    pub fn status(&self) -> BiosStatus {
        let results = run_post(&self.profile);
        BiosStatus {
            firmware_version: self.profile.firmware_version.clone(),
            all_systems_go: all_systems_go(&self.profile, &results),
            post_results: results,
            hardware_profile_hash: Some(self.profile_hash.clone()),
            uptime_s: self.started.elapsed().as_secs(),
        }
    }

    /// Build the wire event for a status.
    #[must_use]
    pub fn event(&self, status: &BiosStatus) -> BiosStatusEvent {
        BiosStatusEvent {
            event_schema_version: 1,
            source: "q-bios".to_string(),
            subject: subjects::EVENTS_BIOS_STATUS.to_string(),
            timestamp: Utc::now(),
            post_results: status.post_results.clone(),
            all_systems_go: status.all_systems_go,
            hardware_profile_hash: status.hardware_profile_hash.clone(),
        }
    }

    /// Whether this result set differs from the last published one.
    fn changed(&mut self, results: &[PostResult], go: bool) -> bool {
        let fingerprint = serde_json::to_string(&(results, go)).unwrap_or_default();
        if self.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            false
        } else {
            self.last_fingerprint = Some(fingerprint);
            true
        }
    }

    /// Run the publish loop until the process exits, mirroring each status
    /// into the HTTP state when one is attached.
    ///
    /// # Errors
    ///
    /// Never returns normally; publish errors are logged and retried on
    /// the next interval.
    pub async fn run(
        &mut self,
        conn: &NatsConnection,
        http: Option<Arc<HttpState>>,
    ) -> anyhow::Result<()> {
        info!(
            interval_s = self.interval.as_secs(),
            hash = self.profile_hash,
            "bios status publisher starting"
        );
        loop {
            let status = self.status();
            let changed = self.changed(&status.post_results, status.all_systems_go);
            if let Some(http) = &http {
                http.set_status(status.clone());
            }
            let event = self.event(&status);
            if let Err(err) = conn
                .publish_event(subjects::EVENTS_BIOS_STATUS, None, &event)
                .await
            {
                warn!(%err, "bios status publish failed");
            } else if changed {
                info!(all_systems_go = status.all_systems_go, "bios status changed");
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
