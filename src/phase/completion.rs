//! Phase requests: what to send, what counts as done, and what a
//! participant failure means.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use super::state::Phase;
use crate::codec::{Message, MessageType};
use crate::participant::ParticipantId;

/// Outbound message generator for a phase.
#[derive(Debug, Clone, Default)]
pub enum Dispatch {
    /// Pure-wait phase; nothing is written.
    #[default]
    None,
    /// The same message to every participant.
    Broadcast(Message),
    /// A distinct message per participant; participants without an entry
    /// receive nothing.
    Unicast(BTreeMap<ParticipantId, Message>),
}

impl Dispatch {
    /// Returns the message for `id`, if any.
    #[must_use]
    pub fn message_for(&self, id: ParticipantId) -> Option<&Message> {
        match self {
            Self::None => None,
            Self::Broadcast(message) => Some(message),
            Self::Unicast(messages) => messages.get(&id),
        }
    }
}

/// Completion predicate for a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A participant completes as soon as its dispatch is written.
    Immediate,
    /// Completes on a binary frame with this type code.
    Type(MessageType),
    /// Completes on a text token starting with this prefix.
    TextPrefix(String),
}

impl Completion {
    /// Convenience constructor for [`Completion::TextPrefix`].
    #[must_use]
    pub fn text(prefix: impl Into<String>) -> Self {
        Self::TextPrefix(prefix.into())
    }

    /// Returns whether `message` satisfies the predicate.
    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        match (self, message) {
            (Self::Type(expected), Message::Type(actual)) => expected == actual,
            (Self::TextPrefix(prefix), Message::Text(token)) => token.starts_with(prefix.as_str()),
            _ => false,
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => f.write_str("on dispatch"),
            Self::Type(kind) => write!(f, "type {}", kind.name()),
            Self::TextPrefix(prefix) => write!(f, "token {prefix}*"),
        }
    }
}

/// What a participant failure does to the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Any participant failure fails the phase.
    #[default]
    Abort,
    /// The participant is dropped from the mission; the phase continues
    /// over the rest.
    Drop,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => f.write_str("abort"),
            Self::Drop => f.write_str("drop"),
        }
    }
}

/// One barrier run: which participants, what to send, and when each is done.
#[derive(Debug, Clone)]
pub struct PhaseRequest {
    /// Phase being run.
    pub phase: Phase,
    /// The wait set at entry.
    pub participants: Vec<ParticipantId>,
    /// Outbound messages.
    pub dispatch: Dispatch,
    /// Completion predicate.
    pub completion: Completion,
    /// Participant failure policy.
    pub policy: FailurePolicy,
    /// Optional bound on the whole phase.
    pub timeout: Option<Duration>,
}

impl PhaseRequest {
    /// Creates a pure-wait request with the default (abort) policy and no
    /// timeout.
    #[must_use]
    pub const fn new(
        phase: Phase,
        participants: Vec<ParticipantId>,
        completion: Completion,
    ) -> Self {
        Self {
            phase,
            participants,
            dispatch: Dispatch::None,
            completion,
            policy: FailurePolicy::Abort,
            timeout: None,
        }
    }

    /// Sets the outbound messages.
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the phase timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Target;

    #[test]
    fn type_completion_is_exact() {
        let c = Completion::Type(MessageType::Ack);
        assert!(c.matches(&Message::Type(MessageType::Ack)));
        assert!(!c.matches(&Message::Type(MessageType::Ready)));
        assert!(!c.matches(&Message::Type(MessageType::Unknown(2))));
        assert!(!c.matches(&Message::Text("ACK".into())));
    }

    #[test]
    fn text_completion_is_prefix() {
        let c = Completion::text("ACK:TARGET");
        assert!(c.matches(&Message::Text("ACK:TARGET".into())));
        assert!(c.matches(&Message::Text("ACK:TARGET:uav-2".into())));
        assert!(!c.matches(&Message::Text("ACK:TARG".into())));
        assert!(!c.matches(&Message::Text("ERROR:bad target".into())));
        assert!(!c.matches(&Message::Finished));
    }

    #[test]
    fn immediate_matches_nothing() {
        assert!(!Completion::Immediate.matches(&Message::Type(MessageType::Ready)));
    }

    #[test]
    fn unicast_skips_missing_entries() {
        let mut messages = BTreeMap::new();
        messages.insert(
            ParticipantId::new(1),
            Message::Target(Target::new(1.0, 2.0, 3.0)),
        );
        let dispatch = Dispatch::Unicast(messages);
        assert!(dispatch.message_for(ParticipantId::new(1)).is_some());
        assert!(dispatch.message_for(ParticipantId::new(2)).is_none());
        assert!(Dispatch::None.message_for(ParticipantId::new(1)).is_none());
    }

    #[test]
    fn policy_parses_from_yaml() {
        let policy: FailurePolicy = serde_yaml::from_str("drop").unwrap();
        assert_eq!(policy, FailurePolicy::Drop);
        assert_eq!(FailurePolicy::default(), FailurePolicy::Abort);
    }
}
