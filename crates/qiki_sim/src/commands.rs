//! The `sim.*` control command surface.
//!
//! Commands arrive as [`CommandEnvelope`]s on the control subject and are
//! answered on the response subject with the originating `message_id` as
//! `request_id`. An invalid command produces `{ok:false, error:<kind>}`
//! plus an audit event in the control-I/O or fault class.

use serde_json::Value;

use qiki_contracts::command::{CommandEnvelope, CommandResponse};
use qiki_contracts::event::{Severity, codes};
use qiki_contracts::radar::TransponderMode;

use crate::world::{World, WorldCommandError};

/// A parsed control command.
#[derive(Debug, Clone, PartialEq)]
pub enum SimCommand {
    /// Start (or resume) ticking, optionally at a speed multiplier.
    Start {
        /// Time multiplier; 1.0 is real time.
        speed: f64,
    },
    /// Stop ticking.
    Stop,
    /// Pause ticking, keeping state.
    Pause,
    /// Restore the initial world state.
    Reset,
    /// Fire an RCS burn on one axis.
    Rcs {
        /// `roll`, `pitch`, or `yaw`.
        axis: String,
        /// Duty cycle in `[0, 1]`.
        duty: f64,
        /// Burn duration, seconds.
        duration_s: f64,
    },
    /// Engage a docking port.
    DockEngage {
        /// Target port; the default port when absent.
        port: Option<String>,
    },
    /// Release the dock.
    DockRelease,
    /// Set the transponder mode.
    XpdrMode {
        /// The new mode.
        mode: TransponderMode,
    },
}

/// A command that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The command name is not part of the surface.
    #[error("unknown_command")]
    UnknownCommand,
    /// Required parameters are missing or out of range.
    #[error("invalid_params")]
    InvalidParams,
    /// The transponder mode string is not ON/OFF/SILENT/SPOOF.
    #[error("invalid_mode")]
    InvalidMode,
}

impl ParseError {
    /// The audit code class for this failure.
    #[must_use]
    pub fn audit_code(&self) -> u16 {
        match self {
            Self::UnknownCommand => codes::CONTROL_IO + 1,
            Self::InvalidParams | Self::InvalidMode => codes::CONTROL_IO + 2,
        }
    }
}

/// Parse a command envelope into a [`SimCommand`].
///
/// # Errors
///
/// Returns a [`ParseError`] naming the refusal kind.
pub fn parse(envelope: &CommandEnvelope) -> Result<SimCommand, ParseError> {
    let params = &envelope.parameters;
    match envelope.command_name.as_str() {
        "sim.start" => {
            let speed = match params.get("speed") {
                None | Some(Value::Null) => 1.0,
                Some(value) => value.as_f64().ok_or(ParseError::InvalidParams)?,
            };
            if speed <= 0.0 {
                return Err(ParseError::InvalidParams);
            }
            Ok(SimCommand::Start { speed })
        }
        "sim.stop" => Ok(SimCommand::Stop),
        "sim.pause" => Ok(SimCommand::Pause),
        "sim.reset" => Ok(SimCommand::Reset),
        "sim.dock.engage" => Ok(SimCommand::DockEngage {
            port: params
                .get("port")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        "sim.dock.release" => Ok(SimCommand::DockRelease),
        "sim.xpdr.mode" => {
            let mode = params
                .get("mode")
                .and_then(Value::as_str)
                .ok_or(ParseError::InvalidMode)?;
            TransponderMode::parse(mode)
                .map(|mode| SimCommand::XpdrMode { mode })
                .ok_or(ParseError::InvalidMode)
        }
        name => {
            if let Some(axis) = name.strip_prefix("sim.rcs.") {
                let duty = params
                    .get("duty")
                    .and_then(Value::as_f64)
                    .ok_or(ParseError::InvalidParams)?;
                let duration_s = params
                    .get("duration_s")
                    .and_then(Value::as_f64)
                    .ok_or(ParseError::InvalidParams)?;
                Ok(SimCommand::Rcs {
                    axis: axis.to_string(),
                    duty,
                    duration_s,
                })
            } else {
                Err(ParseError::UnknownCommand)
            }
        }
    }
}

/// The run state of the tick loop, driven by start/stop/pause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunState {
    /// Ticking at the given speed multiplier.
    Running {
        /// Time multiplier.
        speed: f64,
    },
    /// Holding state, not ticking.
    Paused,
    /// Stopped; state frozen until start or reset.
    Stopped,
}

/// Apply a parsed command. Returns the response for the caller; run-state
/// commands mutate `run_state`, world commands mutate `world`.
pub fn apply(
    command: &SimCommand,
    world: &mut World,
    run_state: &mut RunState,
    request_id: uuid::Uuid,
) -> CommandResponse {
    let result: Result<(), WorldCommandError> = match command {
        SimCommand::Start { speed } => {
            *run_state = RunState::Running { speed: *speed };
            Ok(())
        }
        SimCommand::Stop => {
            *run_state = RunState::Stopped;
            Ok(())
        }
        SimCommand::Pause => {
            *run_state = RunState::Paused;
            Ok(())
        }
        SimCommand::Reset => {
            world.reset();
            Ok(())
        }
        SimCommand::Rcs {
            axis,
            duty,
            duration_s,
        } => world.rcs_burn(axis, *duty, *duration_s),
        SimCommand::DockEngage { port } => world.dock_engage(port.as_deref()),
        SimCommand::DockRelease => world.dock_release(),
        SimCommand::XpdrMode { mode } => {
            world.set_xpdr_mode(*mode);
            Ok(())
        }
    };

    match result {
        Ok(()) => CommandResponse::ok(request_id),
        Err(err) => CommandResponse::err(request_id, &err.to_string()),
    }
}

/// Severity of the audit event for a refused command.
#[must_use]
pub fn refusal_severity(error: &ParseError) -> Severity {
    match error {
        ParseError::UnknownCommand => Severity::Warn,
        ParseError::InvalidParams | ParseError::InvalidMode => Severity::Warn,
    }
}
