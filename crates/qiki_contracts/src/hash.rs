//! Canonical-JSON hashing for the hardware profile.
//!
//! The hash must agree between BIOS status and telemetry whenever both are
//! emitted by the same process generation, so it is computed over a
//! canonical rendering: recursively key-sorted objects, no insignificant
//! whitespace.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Render a JSON value canonically: objects with keys in ascending order,
/// compact separators.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            // serde_json's default map is key-sorted, but re-sort explicitly
            // so the rendering does not depend on feature flags.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Compute the hardware profile hash:
/// `"sha256:" + sha256_hex(canonical_json({hardware_profile, hardware_manifest}))`.
#[must_use]
pub fn hardware_profile_hash(profile: &Value, manifest: &Value) -> String {
    let combined = serde_json::json!({
        "hardware_profile": profile,
        "hardware_manifest": manifest,
    });
    let canonical = canonical_json(&combined);
    let digest = Sha256::digest(canonical.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("sha256:{hex}")
}
