//! Canonical NATS subject taxonomy.
//!
//! All platform subjects are prefixed with `qiki.` to namespace within a
//! shared NATS cluster. Persisted families carry a major version token
//! (`v1`); adding a parallel major for a live family is forbidden by the
//! wire-version guardrail.

/// Root prefix for all platform subjects.
pub const PREFIX: &str = "qiki";

// ── Telemetry ───────────────────────────────────────────────────────────────

/// Per-tick telemetry snapshot. Sim → *. Non-persistent.
pub const TELEMETRY: &str = "qiki.telemetry";

// ── Radar (persisted, v1) ───────────────────────────────────────────────────

/// Radar frames, all bands. Sim → bus.
pub const RADAR_FRAMES: &str = "qiki.radar.v1.frames";

/// Radar frames, long-range band only.
pub const RADAR_FRAMES_LR: &str = "qiki.radar.v1.frames.lr";

/// Radar tracks, all bands. Radar pipeline → bus.
pub const RADAR_TRACKS: &str = "qiki.radar.v1.tracks";

/// Radar tracks, short-range band only.
pub const RADAR_TRACKS_SR: &str = "qiki.radar.v1.tracks.sr";

/// Guard rule alerts. Radar pipeline → operator.
pub const GUARD_ALERTS: &str = "qiki.radar.v1.guard_alerts";

// ── Control ─────────────────────────────────────────────────────────────────

/// Control commands. Any → sim.
pub const COMMANDS_CONTROL: &str = "qiki.commands.control";

/// Control command responses. Sim → requester.
pub const RESPONSES_CONTROL: &str = "qiki.responses.control";

// ── Agent ───────────────────────────────────────────────────────────────────

/// Agent proposals (intents). Agent → operator. Never actuation.
pub const INTENTS: &str = "qiki.intents";

/// Agent responses. Agent → requester.
pub const RESPONSES_QIKI: &str = "qiki.responses.qiki";

// ── Events (persisted, v1) ──────────────────────────────────────────────────

/// Wildcard over all persisted events.
pub const EVENTS_WILDCARD: &str = "qiki.events.v1.>";

/// Audit events. Any → registrar.
pub const EVENTS_AUDIT: &str = "qiki.events.v1.audit";

/// BIOS status events. BIOS → agent, operator.
pub const EVENTS_BIOS_STATUS: &str = "qiki.events.v1.bios_status";

// ── Operator ────────────────────────────────────────────────────────────────

/// Operator incident audit (open/ack/clear). Operator store → *.
pub const OPERATOR_ACTIONS: &str = "qiki.operator.actions";

// ── Dynamic subject builders ────────────────────────────────────────────────

/// Build the command name for an RCS burn on one axis.
///
/// `sim.rcs.<axis>`
#[must_use]
pub fn rcs_command(axis: &str) -> String {
    format!("sim.rcs.{axis}")
}

/// Build the per-operator-session durable name for a tracks consumer.
///
/// `operator_<session>_<filter>`
#[must_use]
pub fn operator_durable(session: &str, filter: &str) -> String {
    format!("operator_{session}_{filter}")
}

/// Whether a subject lives under the persisted events family.
#[must_use]
pub fn is_event_subject(subject: &str) -> bool {
    subject.starts_with("qiki.events.v1.")
}

/// Whether a subject is UI-facing and may be sampled latest-wins under
/// back-pressure. Persisted events never qualify.
#[must_use]
pub fn is_ui_facing(subject: &str) -> bool {
    subject == TELEMETRY
}
