//! Phase and mission state.
//!
//! [`MissionState`] is owned by the sequencer for the lifetime of a run
//! and lent to the barrier engine one phase at a time. It holds the
//! ordered participant list, the immutable target table, and the
//! per-phase completion set, which is reset whenever a phase begins.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::targets::TargetTable;
use crate::participant::{Participant, ParticipantId};

/// One step of the fixed mission sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Accept exactly N participants.
    Connect,
    /// Dispatch per-participant target coordinates.
    Target,
    /// Wait for every target acknowledgement.
    Ack,
    /// Wait for every participant to report READY.
    Ready,
    /// Broadcast return-to-launch and wait for completion.
    Rtl,
    /// Broadcast land and wait for completion.
    Land,
}

impl Phase {
    /// Returns the phase name used in logs, events, and metric labels.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Target => "TARGET",
            Self::Ack => "ACK",
            Self::Ready => "READY",
            Self::Rtl => "RTL",
            Self::Land => "LAND",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of the barrier for the current phase.
///
/// `Idle → Dispatching → Waiting → {Satisfied | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarrierState {
    /// No phase running.
    #[default]
    Idle,
    /// Writing phase-entry messages.
    Dispatching,
    /// Multiplexing and reading until the wait set is empty.
    Waiting,
    /// Every participant satisfied the phase.
    Satisfied,
    /// The phase failed; terminal for the mission.
    Failed,
}

impl fmt::Display for BarrierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Dispatching => "dispatching",
            Self::Waiting => "waiting",
            Self::Satisfied => "satisfied",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Everything a mission run owns.
#[derive(Debug)]
pub struct MissionState {
    participants: Vec<Participant>,
    targets: TargetTable,
    barrier: BarrierState,
    completion: BTreeMap<ParticipantId, bool>,
}

impl MissionState {
    /// Creates an empty mission with a fixed target table.
    #[must_use]
    pub const fn new(targets: TargetTable) -> Self {
        Self {
            participants: Vec::new(),
            targets,
            barrier: BarrierState::Idle,
            completion: BTreeMap::new(),
        }
    }

    /// Appends a newly accepted participant.
    pub fn add_participant(&mut self, participant: Participant) {
        self.participants.push(participant);
    }

    /// Returns the participants in identity order.
    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Returns the participants mutably.
    pub fn participants_mut(&mut self) -> &mut [Participant] {
        &mut self.participants
    }

    /// Looks up a participant by identity.
    #[must_use]
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id() == id)
    }

    /// Looks up a participant by identity, mutably.
    pub fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id() == id)
    }

    /// Returns the identities of all still-active participants.
    #[must_use]
    pub fn active_ids(&self) -> Vec<ParticipantId> {
        self.participants
            .iter()
            .filter(|p| p.is_active())
            .map(Participant::id)
            .collect()
    }

    /// Returns the identities of all failed participants.
    #[must_use]
    pub fn failed_ids(&self) -> Vec<ParticipantId> {
        self.participants
            .iter()
            .filter(|p| !p.is_active())
            .map(Participant::id)
            .collect()
    }

    /// Returns the target table.
    #[must_use]
    pub const fn targets(&self) -> &TargetTable {
        &self.targets
    }

    /// Returns the barrier state of the current phase.
    #[must_use]
    pub const fn barrier(&self) -> BarrierState {
        self.barrier
    }

    pub(crate) const fn set_barrier(&mut self, barrier: BarrierState) {
        self.barrier = barrier;
    }

    /// Begins a new phase for `ids`, resetting the completion set.
    pub fn begin_phase(&mut self, ids: &[ParticipantId]) {
        self.barrier = BarrierState::Idle;
        self.completion = ids.iter().map(|&id| (id, false)).collect();
    }

    /// Marks `id` complete for the current phase.
    ///
    /// Returns `false` if `id` is not part of the current phase.
    pub fn mark_complete(&mut self, id: ParticipantId) -> bool {
        match self.completion.get_mut(&id) {
            Some(done) => {
                *done = true;
                true
            }
            None => false,
        }
    }

    /// Adds `id` to the current phase, already complete.
    pub fn join_complete(&mut self, id: ParticipantId) {
        self.completion.insert(id, true);
    }

    /// Returns whether `id` has completed the current phase.
    #[must_use]
    pub fn is_complete(&self, id: ParticipantId) -> bool {
        self.completion.get(&id).copied().unwrap_or(false)
    }

    /// Returns the participants that completed the current phase.
    #[must_use]
    pub fn completed_ids(&self) -> Vec<ParticipantId> {
        self.completion
            .iter()
            .filter_map(|(&id, &done)| done.then_some(id))
            .collect()
    }

    /// Closes every channel. Safe to call more than once.
    pub async fn close_all(&mut self) {
        for participant in &mut self.participants {
            participant.channel_mut().close().await;
        }
    }
}
