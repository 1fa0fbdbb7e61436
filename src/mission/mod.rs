//! Mission sequencing.
//!
//! The [`Sequencer`] accepts the fleet and drives the fixed phase order
//! CONNECT → TARGET → ACK → READY → [RTL → LAND] over the barrier engine,
//! then sends FINISHED and tears every channel down. A failed phase
//! aborts the rest of the mission; teardown always runs.

pub mod confirm;
pub mod plan;
pub mod sequencer;

pub use confirm::{AutoConfirmation, Confirmation, StdinConfirmation};
pub use plan::ProtocolPlan;
pub use sequencer::Sequencer;

use std::time::Duration;

use uuid::Uuid;

use crate::codec::CodecMode;
use crate::participant::ParticipantId;
use crate::phase::{FailurePolicy, Phase, PhaseFailure, PhaseReport};

/// Default number of participants.
pub const DEFAULT_FLEET_SIZE: usize = 2;

/// Default listen address.
pub const DEFAULT_BIND: &str = "0.0.0.0:5000";

/// Settings for one mission run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionOptions {
    /// Number of participants to accept during CONNECT.
    pub fleet_size: usize,
    /// Wire codec used for the whole run.
    pub codec: CodecMode,
    /// Run RTL and LAND after READY.
    pub return_home: bool,
    /// Wait for operator confirmation before teardown.
    pub confirm: bool,
    /// Per-phase deadline; `None` waits forever.
    pub phase_timeout: Option<Duration>,
    /// What a participant failure does to its phase.
    pub failure_policy: FailurePolicy,
}

impl Default for MissionOptions {
    fn default() -> Self {
        Self {
            fleet_size: DEFAULT_FLEET_SIZE,
            codec: CodecMode::default(),
            return_home: false,
            confirm: false,
            phase_timeout: None,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// How a mission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissionOutcome {
    /// Every phase satisfied and FINISHED was sent.
    Completed,
    /// A phase failed; later phases were skipped.
    Aborted {
        /// Phase that failed.
        phase: Phase,
        /// Why it failed.
        failure: PhaseFailure,
    },
}

impl MissionOutcome {
    /// Returns the event label for this outcome.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Aborted { .. } => "aborted",
        }
    }
}

/// Summary of a mission run.
#[derive(Debug, Clone)]
pub struct MissionReport {
    /// Unique id of this run.
    pub mission_id: Uuid,
    /// Terminal outcome.
    pub outcome: MissionOutcome,
    /// One report per phase that ran, in order.
    pub phases: Vec<PhaseReport>,
    /// Participants that failed, with the phase and reason.
    pub failed: Vec<(ParticipantId, Phase, String)>,
    /// Participants accepted during CONNECT.
    pub connected: usize,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl MissionReport {
    /// Returns whether the mission completed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self.outcome, MissionOutcome::Completed)
    }

    /// Returns the phases that ran, in order.
    #[must_use]
    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|r| r.phase.name()).collect()
    }
}
