//! Readiness multiplexer.
//!
//! Blocks until at least one participant in the wait set can make
//! progress, then returns every participant that can. A participant can
//! make progress when its buffer already holds a complete frame or its
//! link is readable (data, EOF, or error). Links are never read here;
//! readiness does not consume bytes.

use std::collections::BTreeSet;
use std::io;

use futures_util::FutureExt;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use thiserror::Error;
use tokio::time::Instant;

use crate::participant::{Participant, ParticipantId};

/// Why a multiplex cycle returned without a ready set.
#[derive(Debug, Error)]
pub enum MultiplexError {
    /// The deadline passed before any participant became ready.
    #[error("deadline elapsed with {pending} participant(s) pending")]
    Elapsed {
        /// Size of the wait set.
        pending: usize,
    },

    /// Waiting on one participant's link failed.
    #[error("readiness wait failed for participant {participant}: {source}")]
    Link {
        /// Participant whose link reported the error.
        participant: ParticipantId,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Result type for one multiplex cycle.
pub type Readiness = Result<Vec<ParticipantId>, MultiplexError>;

/// Waits for readiness across many participant channels at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct Multiplexer;

impl Multiplexer {
    /// Creates a multiplexer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs one multiplex cycle over `wait_set`.
    ///
    /// Participants outside `wait_set` are never touched, so completed
    /// and failed participants drop out without re-registration. The
    /// returned identities are sorted. An empty wait set returns an empty
    /// vector immediately.
    ///
    /// # Errors
    ///
    /// Returns `MultiplexError::Link` if waiting on a link fails, or
    /// `MultiplexError::Elapsed` if `deadline` passes first.
    pub async fn wait(
        &self,
        participants: &mut [Participant],
        wait_set: &BTreeSet<ParticipantId>,
        deadline: Option<Instant>,
    ) -> Readiness {
        if wait_set.is_empty() {
            return Ok(Vec::new());
        }

        let ready = scan(participants, wait_set, None)?;
        if !ready.is_empty() {
            return Ok(ready);
        }

        let first = {
            let mut pending: FuturesUnordered<_> = participants
                .iter_mut()
                .filter(|p| wait_set.contains(&p.id()))
                .map(|p| async move {
                    let id = p.id();
                    (id, p.channel_mut().readable().await)
                })
                .collect();

            match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, pending.next())
                    .await
                    .map_err(|_| MultiplexError::Elapsed {
                        pending: wait_set.len(),
                    })?,
                None => pending.next().await,
            }
        };

        let Some((id, result)) = first else {
            return Ok(Vec::new());
        };
        result.map_err(|source| MultiplexError::Link {
            participant: id,
            source,
        })?;

        let mut ready = scan(participants, wait_set, Some(id))?;
        ready.push(id);
        ready.sort_unstable();
        Ok(ready)
    }
}

/// Checks every wait-set member without blocking.
fn scan(
    participants: &mut [Participant],
    wait_set: &BTreeSet<ParticipantId>,
    skip: Option<ParticipantId>,
) -> Readiness {
    let mut ready = Vec::new();
    for participant in participants
        .iter_mut()
        .filter(|p| wait_set.contains(&p.id()) && Some(p.id()) != skip)
    {
        let id = participant.id();
        let channel = participant.channel_mut();
        if channel.has_buffered_frame() {
            ready.push(id);
            continue;
        }
        match channel.readable().now_or_never() {
            Some(Ok(())) => ready.push(id),
            Some(Err(source)) => {
                return Err(MultiplexError::Link {
                    participant: id,
                    source,
                });
            }
            None => {}
        }
    }
    Ok(ready)
}
