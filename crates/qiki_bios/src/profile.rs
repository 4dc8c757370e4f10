//! The hardware profile.
//!
//! Loaded once at boot from YAML. The profile hash is computed over the
//! canonical JSON of `{hardware_profile, hardware_manifest}` and must match
//! the hash the sim stamps into telemetry for the same generation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use qiki_contracts::hash::hardware_profile_hash;

/// One declared device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Device identifier.
    pub id: String,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether a POST failure on this device blocks `all_systems_go`.
    #[serde(default)]
    pub required: bool,
    /// Simulated POST status override (0..=3). Absent means pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_status: Option<u8>,
}

/// The loaded hardware profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// BIOS firmware version string.
    pub firmware_version: String,
    /// Declared devices.
    pub devices: Vec<DeviceSpec>,
    /// Free-form manifest, hashed together with the profile.
    #[serde(default)]
    pub manifest: Value,
}

/// Profile loading failure. Fatal at boot; exit code 2.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// The file could not be read.
    #[error("cannot read profile {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The document does not match the schema.
    #[error("invalid profile: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl HardwareProfile {
    /// Parse a profile document.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Parse`] when the document is malformed.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ProfileError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a profile from a file.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] on read or parse failure.
    pub fn load(path: &str) -> Result<Self, ProfileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// The deterministic profile hash.
    ///
    /// The device list (without simulated status overrides) is the profile
    /// side; the manifest rides alongside. Simulated POST statuses are
    /// runtime inputs, not hardware identity, so they do not perturb the
    /// hash.
    #[must_use]
    pub fn hash(&self) -> String {
        let devices: Vec<Value> = self
            .devices
            .iter()
            .map(|d| {
                serde_json::json!({
                    "id": d.id,
                    "name": d.name,
                    "required": d.required,
                })
            })
            .collect();
        let profile = serde_json::json!({
            "firmware_version": self.firmware_version,
            "devices": devices,
        });
        hardware_profile_hash(&profile, &self.manifest)
    }
}
