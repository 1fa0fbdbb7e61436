//! Participants under mission control.
//!
//! A [`Participant`] is one remote agent: a stable identity in `1..=N`
//! and the [`ParticipantChannel`] that owns its link. Identities are never
//! reused: once a participant fails, its slot stays failed for the rest of
//! the mission.

pub mod channel;

pub use channel::{ChannelPoll, ParticipantChannel};

use std::fmt;

use serde::Serialize;

/// Stable participant identity (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ParticipantId(u32);

impl ParticipantId {
    /// Creates an identity from its 1-based number.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the 1-based number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the 0-based index into per-participant tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0.saturating_sub(1) as usize
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a participant slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantStatus {
    /// Connected and eligible for phases.
    Active,
    /// Permanently failed; never read, written, or re-identified again.
    Failed {
        /// Phase in which the failure happened.
        phase: String,
        /// Human-readable reason.
        reason: String,
    },
}

/// One remote agent and its channel.
pub struct Participant {
    id: ParticipantId,
    channel: ParticipantChannel,
    status: ParticipantStatus,
}

impl Participant {
    /// Creates an active participant owning `channel`.
    #[must_use]
    pub const fn new(id: ParticipantId, channel: ParticipantChannel) -> Self {
        Self {
            id,
            channel,
            status: ParticipantStatus::Active,
        }
    }

    /// Returns the participant's identity.
    #[must_use]
    pub const fn id(&self) -> ParticipantId {
        self.id
    }

    /// Returns the participant's channel.
    #[must_use]
    pub const fn channel(&self) -> &ParticipantChannel {
        &self.channel
    }

    /// Returns the participant's channel mutably.
    pub const fn channel_mut(&mut self) -> &mut ParticipantChannel {
        &mut self.channel
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> &ParticipantStatus {
        &self.status
    }

    /// Returns whether the participant can still take part in phases.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, ParticipantStatus::Active)
    }

    /// Marks the participant permanently failed.
    ///
    /// The first failure wins; later calls keep the original reason.
    pub fn mark_failed(&mut self, phase: &str, reason: impl Into<String>) {
        if self.is_active() {
            self.status = ParticipantStatus::Failed {
                phase: phase.to_string(),
                reason: reason.into(),
            };
        }
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("id", &self.id)
            .field("peer", &self.channel.peer())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecMode;
    use crate::transport::memory;

    #[test]
    fn id_index_is_zero_based() {
        assert_eq!(ParticipantId::new(1).index(), 0);
        assert_eq!(ParticipantId::new(3).index(), 2);
        assert_eq!(ParticipantId::new(3).to_string(), "3");
    }

    #[test]
    fn first_failure_wins() {
        let (link, _peer) = memory::pair();
        let channel = ParticipantChannel::new(Box::new(link), CodecMode::Binary);
        let mut participant = Participant::new(ParticipantId::new(1), channel);
        assert!(participant.is_active());

        participant.mark_failed("READY", "disconnected");
        participant.mark_failed("RTL", "later");
        assert_eq!(
            participant.status(),
            &ParticipantStatus::Failed {
                phase: "READY".to_string(),
                reason: "disconnected".to_string(),
            }
        );
    }
}
