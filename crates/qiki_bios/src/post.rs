//! Power-on self-test.
//!
//! One result per declared device. `all_systems_go` is true iff no result
//! is blocking (status 3) on a required device.

use qiki_contracts::bios::{POST_FAIL, POST_PASS, PostResult};

use crate::profile::HardwareProfile;

/// Run POST over the profile's devices.
#[must_use]
pub fn run_post(profile: &HardwareProfile) -> Vec<PostResult> {
    profile
        .devices
        .iter()
        .map(|device| {
            let status = device.post_status.unwrap_or(POST_PASS).min(POST_FAIL);
            PostResult {
                device_id: device.id.clone(),
                device_name: device.name.clone(),
                status,
                status_message: (status == POST_FAIL).then(|| "post failed".to_string()),
            }
        })
        .collect()
}

/// Whether the craft is go: no required device failed POST.
#[must_use]
pub fn all_systems_go(profile: &HardwareProfile, results: &[PostResult]) -> bool {
    results.iter().all(|result| {
        let required = profile
            .devices
            .iter()
            .find(|d| d.id == result.device_id)
            .is_some_and(|d| d.required);
        !(required && result.is_blocking())
    })
}
