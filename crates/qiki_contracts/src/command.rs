//! Control command and response envelopes.
//!
//! Commands travel on the control command subject; the response carries the
//! originating `message_id` back as `request_id` so callers can correlate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The wire value of `metadata.message_type` for control commands.
pub const CONTROL_COMMAND_TYPE: &str = "control_command";

/// Routing metadata attached to every command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMetadata {
    /// Unique command id; echoed back as the response `request_id`.
    pub message_id: Uuid,
    /// Always [`CONTROL_COMMAND_TYPE`].
    pub message_type: String,
    /// Sending service.
    pub source: String,
    /// Target service.
    pub destination: String,
    /// Wall-clock send time, when the sender has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts_epoch: Option<DateTime<Utc>>,
}

/// A control command envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Dotted command name (e.g. `"sim.start"`, `"sim.rcs.yaw"`).
    pub command_name: String,
    /// Command parameters.
    #[serde(default)]
    pub parameters: Value,
    /// Routing metadata.
    pub metadata: CommandMetadata,
}

impl CommandEnvelope {
    /// Build a command envelope with fresh metadata.
    #[must_use]
    pub fn new(command_name: &str, parameters: Value, source: &str, destination: &str) -> Self {
        Self {
            command_name: command_name.to_string(),
            parameters,
            metadata: CommandMetadata {
                message_id: Uuid::new_v4(),
                message_type: CONTROL_COMMAND_TYPE.to_string(),
                source: source.to_string(),
                destination: destination.to_string(),
                ts_epoch: Some(Utc::now()),
            },
        }
    }
}

/// Response to a control command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// The `message_id` of the command being answered.
    pub request_id: Uuid,
    /// Whether the command was accepted.
    pub ok: bool,
    /// Failure kind when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Optional result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl CommandResponse {
    /// A successful response for the given request.
    #[must_use]
    pub fn ok(request_id: Uuid) -> Self {
        Self {
            request_id,
            ok: true,
            error: None,
            payload: None,
        }
    }

    /// A failed response for the given request.
    #[must_use]
    pub fn err(request_id: Uuid, error: &str) -> Self {
        Self {
            request_id,
            ok: false,
            error: Some(error.to_string()),
            payload: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_roundtrip() {
        let cmd = CommandEnvelope::new("sim.start", json!({"speed": 2.0}), "tui", "q-sim");
        let wire = serde_json::to_string(&cmd).unwrap();
        let restored: CommandEnvelope = serde_json::from_str(&wire).unwrap();
        assert_eq!(restored, cmd);
        assert_eq!(restored.metadata.message_type, CONTROL_COMMAND_TYPE);
    }

    #[test]
    fn test_response_echoes_request_id() {
        let cmd = CommandEnvelope::new("sim.stop", Value::Null, "tui", "q-sim");
        let response = CommandResponse::ok(cmd.metadata.message_id);
        assert_eq!(response.request_id, cmd.metadata.message_id);
        assert!(response.ok);
    }

    #[test]
    fn test_error_response_carries_kind() {
        let response = CommandResponse::err(Uuid::new_v4(), "invalid_mode");
        assert!(!response.ok);
        assert_eq!(response.error.as_deref(), Some("invalid_mode"));
    }
}
