//! The per-tick agent context.
//!
//! A small explicit struct whose fields are exactly the inputs of the tick
//! phases. `fsm_state` is read from the store — a provider that does not
//! know the state returns an empty sentinel (`None`), never a guessed
//! default.

use qiki_contracts::bios::{BiosStatusEvent, POST_FAIL};
use qiki_contracts::fsm::FsmState;
use qiki_contracts::ids::BootId;
use qiki_contracts::telemetry::TelemetrySnapshot;

/// Pulls the latest ingested data into the context. Implementations return
/// `None` when nothing has arrived — they never invent values.
pub trait DataProvider: Send {
    /// The most recent BIOS status, if any has arrived.
    fn latest_bios(&mut self) -> Option<BiosStatusEvent>;
    /// The most recent telemetry snapshot, if any has arrived.
    fn latest_telemetry(&mut self) -> Option<TelemetrySnapshot>;
}

/// The inputs of one agent tick.
#[derive(Debug, Clone)]
pub struct AgentContext {
    /// FSM state read from the store.
    pub fsm_state: FsmState,
    /// Store version the state was read at.
    pub fsm_version: u64,
    /// Process boot id.
    pub boot_id: BootId,
    /// Latest BIOS status, when one has arrived.
    pub bios: Option<BiosStatusEvent>,
    /// Latest telemetry, when one has arrived.
    pub telemetry: Option<TelemetrySnapshot>,
    /// `all_systems_go` from BIOS; `None` until the first report.
    pub bios_ok: Option<bool>,
    /// Devices whose POST failed.
    pub missing_components: Vec<String>,
}

impl AgentContext {
    /// Derive the BIOS picture from a status event.
    pub fn apply_bios(&mut self, event: BiosStatusEvent) {
        self.bios_ok = Some(event.all_systems_go);
        self.missing_components = event
            .post_results
            .iter()
            .filter(|r| r.status == POST_FAIL)
            .map(|r| r.device_id.clone())
            .collect();
        self.bios = Some(event);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use qiki_contracts::bios::PostResult;

    use super::*;

    fn event(statuses: &[(&str, u8)], go: bool) -> BiosStatusEvent {
        BiosStatusEvent {
            event_schema_version: 1,
            source: "q-bios".to_string(),
            subject: "qiki.events.v1.bios_status".to_string(),
            timestamp: Utc::now(),
            post_results: statuses
                .iter()
                .map(|(id, status)| PostResult {
                    device_id: (*id).to_string(),
                    device_name: None,
                    status: *status,
                    status_message: None,
                })
                .collect(),
            all_systems_go: go,
            hardware_profile_hash: None,
        }
    }

    fn context() -> AgentContext {
        AgentContext {
            fsm_state: FsmState::Booting,
            fsm_version: 0,
            boot_id: BootId::generate(),
            bios: None,
            telemetry: None,
            bios_ok: None,
            missing_components: Vec::new(),
        }
    }

    #[test]
    fn test_apply_bios_marks_failed_devices() {
        let mut ctx = context();
        ctx.apply_bios(event(&[("imu0", 0), ("radar0", 3)], false));
        assert_eq!(ctx.bios_ok, Some(false));
        assert_eq!(ctx.missing_components, vec!["radar0".to_string()]);
    }

    #[test]
    fn test_no_bios_means_no_verdict() {
        let ctx = context();
        assert_eq!(ctx.bios_ok, None);
        assert!(ctx.missing_components.is_empty());
    }
}
