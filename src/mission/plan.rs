//! Per-mode protocol plan.
//!
//! The two wire variants spell the same mission differently. Binary
//! agents acknowledge with the ACK tag and report arrival with the READY
//! tag for every command; text agents send distinct tokens per phase.

use crate::codec::{CodecMode, Message, MessageType};
use crate::phase::Completion;

/// Messages and predicates for one codec mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolPlan {
    /// Completion for the target acknowledgement.
    pub ack: Completion,
    /// Completion for arrival at the target.
    pub ready: Completion,
    /// Return-to-launch command.
    pub rtl_command: Message,
    /// Completion for return-to-launch.
    pub rtl_done: Completion,
    /// Land command.
    pub land_command: Message,
    /// Completion for landing.
    pub land_done: Completion,
    /// End-of-mission notice.
    pub finished: Message,
}

impl ProtocolPlan {
    /// Returns the plan for `mode`.
    #[must_use]
    pub fn for_mode(mode: CodecMode) -> Self {
        match mode {
            CodecMode::Binary => Self {
                ack: Completion::Type(MessageType::Ack),
                ready: Completion::Type(MessageType::Ready),
                rtl_command: Message::Type(MessageType::Rtl),
                rtl_done: Completion::Type(MessageType::Ready),
                land_command: Message::Type(MessageType::Land),
                land_done: Completion::Type(MessageType::Ready),
                finished: Message::Finished,
            },
            CodecMode::Text => Self {
                ack: Completion::text("ACK:TARGET"),
                ready: Completion::text("READY"),
                rtl_command: Message::Text("RTL".to_string()),
                rtl_done: Completion::text("RTL_COMPLETE"),
                land_command: Message::Text("LAND".to_string()),
                land_done: Completion::text("LAND_COMPLETE"),
                finished: Message::Finished,
            },
        }
    }
}
