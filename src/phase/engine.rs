//! Phase barrier engine.
//!
//! [`BarrierEngine::run`] drives one phase to completion:
//!
//! 1. **Dispatching**: write the phase-entry message to every participant
//!    in the wait set. Nothing is read.
//! 2. **Waiting**: multiplex over the still-incomplete participants and
//!    drain every ready channel until it has nothing more to decode or
//!    satisfies the phase. Nothing is written.
//! 3. **Satisfied** once the wait set is empty, **Failed** on a closed
//!    channel, a multiplex error, or an elapsed deadline (subject to the
//!    request's [`FailurePolicy`]).
//!
//! A message that decodes cleanly but does not satisfy the predicate is
//! logged and ignored; the participant stays in the wait set.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::completion::{Completion, FailurePolicy, PhaseRequest};
use super::multiplexer::{MultiplexError, Multiplexer};
use super::state::{BarrierState, MissionState, Phase};
use crate::codec::Message;
use crate::observability::metrics;
use crate::observability::{Event, EventEmitter};
use crate::participant::{ChannelPoll, ParticipantId};

/// Why a phase failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseFailure {
    /// A link could not be accepted during CONNECT.
    #[error("accept failed for participant {participant}: {reason}")]
    Accept {
        /// Identity the link would have received.
        participant: ParticipantId,
        /// Failure reason.
        reason: String,
    },

    /// A participant's channel closed while it was being read.
    #[error("participant {participant} disconnected: {reason}")]
    Disconnected {
        /// Failed participant.
        participant: ParticipantId,
        /// Failure reason.
        reason: String,
    },

    /// The phase-entry message could not be written.
    #[error("write to participant {participant} failed: {reason}")]
    WriteFailed {
        /// Failed participant.
        participant: ParticipantId,
        /// Failure reason.
        reason: String,
    },

    /// Waiting for readiness failed.
    #[error("readiness wait failed for participant {participant}: {reason}")]
    Multiplex {
        /// Participant whose link reported the error.
        participant: ParticipantId,
        /// Failure reason.
        reason: String,
    },

    /// The phase deadline elapsed.
    #[error("timed out after {elapsed:?} waiting for participants {pending:?}")]
    Timeout {
        /// Participants that had not completed.
        pending: Vec<ParticipantId>,
        /// Time spent in the phase.
        elapsed: Duration,
    },

    /// Every participant in the phase was dropped.
    #[error("all participants failed")]
    AllFailed,
}

impl PhaseFailure {
    /// Returns the participant the failure is attributed to, if any.
    #[must_use]
    pub const fn participant(&self) -> Option<ParticipantId> {
        match self {
            Self::Accept { participant, .. }
            | Self::Disconnected { participant, .. }
            | Self::WriteFailed { participant, .. }
            | Self::Multiplex { participant, .. } => Some(*participant),
            Self::Timeout { .. } | Self::AllFailed => None,
        }
    }
}

/// Terminal outcome of one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Every participant satisfied the phase.
    Satisfied,
    /// The phase failed.
    Failed(PhaseFailure),
}

impl PhaseOutcome {
    /// Returns the metric/event label for this outcome.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Satisfied => "satisfied",
            Self::Failed(PhaseFailure::Timeout { .. }) => "timeout",
            Self::Failed(_) => "failed",
        }
    }
}

/// Summary of one phase run.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    /// Phase that ran.
    pub phase: Phase,
    /// Terminal outcome.
    pub outcome: PhaseOutcome,
    /// Participants that satisfied the phase, sorted.
    pub completed: Vec<ParticipantId>,
    /// Participants that failed during the phase, with reasons.
    pub failed: Vec<(ParticipantId, String)>,
    /// Time spent in the phase.
    pub duration: Duration,
}

impl PhaseReport {
    /// Returns whether the phase satisfied.
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self.outcome, PhaseOutcome::Satisfied)
    }
}

/// Per-run bookkeeping that never outlives one phase.
struct Barrier {
    phase: Phase,
    policy: FailurePolicy,
    wait_set: BTreeSet<ParticipantId>,
    failed: Vec<(ParticipantId, String)>,
    started: Instant,
}

/// Drives a single phase over a [`MissionState`].
#[derive(Debug, Clone)]
pub struct BarrierEngine {
    multiplexer: Multiplexer,
    events: Arc<EventEmitter>,
}

impl BarrierEngine {
    /// Creates an engine that reports to `events`.
    #[must_use]
    pub const fn new(events: Arc<EventEmitter>) -> Self {
        Self {
            multiplexer: Multiplexer::new(),
            events,
        }
    }

    /// Returns the engine's event emitter.
    #[must_use]
    pub const fn events(&self) -> &Arc<EventEmitter> {
        &self.events
    }

    /// Runs `request` to a terminal state.
    ///
    /// Participants in the request that are unknown or already failed are
    /// left out of the wait set.
    pub async fn run(&self, state: &mut MissionState, request: &PhaseRequest) -> PhaseReport {
        let phase = request.phase;
        let wait_set: BTreeSet<ParticipantId> = request
            .participants
            .iter()
            .copied()
            .filter(|&id| {
                let active = state.participant(id).is_some_and(|p| p.is_active());
                if !active {
                    debug!(phase = %phase, participant = %id, "skipping inactive participant");
                }
                active
            })
            .collect();

        let ids: Vec<_> = wait_set.iter().copied().collect();
        self.enter(state, phase, &ids);
        debug!(phase = %phase, completion = %request.completion, "completion predicate");

        let mut barrier = Barrier {
            phase,
            policy: request.policy,
            wait_set,
            failed: Vec::new(),
            started: Instant::now(),
        };
        let deadline = request.timeout.map(|t| barrier.started + t);

        transition(state, phase, BarrierState::Dispatching);
        if let Err(failure) = self.dispatch(state, request, &mut barrier).await {
            return self.conclude(state, barrier, PhaseOutcome::Failed(failure));
        }

        transition(state, phase, BarrierState::Waiting);
        if let Err(failure) = self.wait(state, request, &mut barrier, deadline).await {
            return self.conclude(state, barrier, PhaseOutcome::Failed(failure));
        }

        let outcome = if !ids.is_empty() && state.completed_ids().is_empty() {
            PhaseOutcome::Failed(PhaseFailure::AllFailed)
        } else {
            PhaseOutcome::Satisfied
        };
        self.conclude(state, barrier, outcome)
    }

    /// Begins `phase` over `ids`: resets completion and announces entry.
    pub(crate) fn enter(&self, state: &mut MissionState, phase: Phase, ids: &[ParticipantId]) {
        state.begin_phase(ids);
        self.announce(phase, ids.len());
    }

    /// Logs and emits entry into `phase` for `participants` members.
    pub(crate) fn announce(&self, phase: Phase, participants: usize) {
        info!(phase = %phase, participants, "phase entered");
        self.events.emit(Event::PhaseEntered {
            timestamp: Utc::now(),
            phase: phase.name().to_string(),
            participants,
        });
    }

    fn conclude(
        &self,
        state: &mut MissionState,
        barrier: Barrier,
        outcome: PhaseOutcome,
    ) -> PhaseReport {
        self.finish(state, barrier.phase, barrier.started, barrier.failed, outcome)
    }

    async fn dispatch(
        &self,
        state: &mut MissionState,
        request: &PhaseRequest,
        barrier: &mut Barrier,
    ) -> Result<(), PhaseFailure> {
        let phase = barrier.phase;
        let targets: Vec<_> = barrier.wait_set.iter().copied().collect();

        for id in targets {
            let Some(message) = request.dispatch.message_for(id) else {
                continue;
            };
            let Some(participant) = state.participant_mut(id) else {
                continue;
            };

            match participant.channel_mut().write(message).await {
                Ok(()) => {
                    info!(phase = %phase, participant = %id, message = %message, "sent");
                    metrics::record_message_sent(message.label());
                    self.events.emit(Event::MessageSent {
                        timestamp: Utc::now(),
                        phase: phase.name().to_string(),
                        participant: id,
                        kind: message.label().to_string(),
                        message: message.to_string(),
                    });
                }
                Err(e) => {
                    let reason = e.to_string();
                    self.fail_participant(state, barrier, id, &reason);
                    if barrier.policy == FailurePolicy::Abort {
                        return Err(PhaseFailure::WriteFailed {
                            participant: id,
                            reason,
                        });
                    }
                }
            }
        }

        if request.completion == Completion::Immediate {
            let done: Vec<_> = std::mem::take(&mut barrier.wait_set).into_iter().collect();
            for id in done {
                self.complete(state, phase, id);
            }
        }
        Ok(())
    }

    async fn wait(
        &self,
        state: &mut MissionState,
        request: &PhaseRequest,
        barrier: &mut Barrier,
        deadline: Option<Instant>,
    ) -> Result<(), PhaseFailure> {
        while !barrier.wait_set.is_empty() {
            let ready = match self
                .multiplexer
                .wait(state.participants_mut(), &barrier.wait_set, deadline)
                .await
            {
                Ok(ready) => ready,
                Err(MultiplexError::Elapsed { .. }) => return Err(timed_out(barrier)),
                Err(MultiplexError::Link {
                    participant,
                    source,
                }) => {
                    let reason = source.to_string();
                    self.fail_participant(state, barrier, participant, &reason);
                    if barrier.policy == FailurePolicy::Abort {
                        return Err(PhaseFailure::Multiplex {
                            participant,
                            reason,
                        });
                    }
                    continue;
                }
            };

            debug!(phase = %barrier.phase, ?ready, "multiplex cycle");
            for id in ready {
                if deadline.is_some_and(|d| Instant::now() >= d) && !barrier.wait_set.is_empty() {
                    return Err(timed_out(barrier));
                }
                self.drain(state, request, barrier, id)?;
            }
        }
        Ok(())
    }

    /// Decodes what one ready participant has buffered plus at most one
    /// link read, stopping early when it completes.
    fn drain(
        &self,
        state: &mut MissionState,
        request: &PhaseRequest,
        barrier: &mut Barrier,
        id: ParticipantId,
    ) -> Result<(), PhaseFailure> {
        let phase = barrier.phase;
        let mut reads = 1;
        loop {
            let Some(participant) = state.participant_mut(id) else {
                return Ok(());
            };
            match participant.channel_mut().poll(&mut reads) {
                ChannelPoll::Ready(message) => {
                    let completed = request.completion.matches(&message);
                    self.record_received(phase, id, &message, completed);
                    if completed {
                        barrier.wait_set.remove(&id);
                        self.complete(state, phase, id);
                        return Ok(());
                    }
                    warn!(
                        phase = %phase,
                        participant = %id,
                        message = %message,
                        expected = %request.completion,
                        "unexpected message, still waiting"
                    );
                }
                ChannelPoll::NotReady => return Ok(()),
                ChannelPoll::Closed(e) => {
                    let reason = e.to_string();
                    self.fail_participant(state, barrier, id, &reason);
                    if barrier.policy == FailurePolicy::Abort {
                        return Err(PhaseFailure::Disconnected {
                            participant: id,
                            reason,
                        });
                    }
                    return Ok(());
                }
            }
        }
    }

    fn record_received(&self, phase: Phase, id: ParticipantId, message: &Message, completed: bool) {
        info!(phase = %phase, participant = %id, message = %message, "received");
        metrics::record_message_received(message.label());
        self.events.emit(Event::MessageReceived {
            timestamp: Utc::now(),
            phase: phase.name().to_string(),
            participant: id,
            kind: message.label().to_string(),
            message: message.to_string(),
            completed,
        });
    }

    fn complete(&self, state: &mut MissionState, phase: Phase, id: ParticipantId) {
        state.mark_complete(id);
        debug!(phase = %phase, participant = %id, "participant complete");
        self.events.emit(Event::ParticipantCompleted {
            timestamp: Utc::now(),
            phase: phase.name().to_string(),
            participant: id,
        });
    }

    fn fail_participant(
        &self,
        state: &mut MissionState,
        barrier: &mut Barrier,
        id: ParticipantId,
        reason: &str,
    ) {
        let phase = barrier.phase;
        barrier.wait_set.remove(&id);
        barrier.failed.push((id, reason.to_string()));
        if let Some(participant) = state.participant_mut(id) {
            participant.mark_failed(phase.name(), reason);
        }

        error!(phase = %phase, participant = %id, reason, "participant failed");
        metrics::record_participant_failure(phase.name());
        metrics::set_participants_connected(state.active_ids().len());
        self.events.emit(Event::ParticipantFailed {
            timestamp: Utc::now(),
            phase: phase.name().to_string(),
            participant: id,
            reason: reason.to_string(),
        });
    }

    /// Moves the barrier to its terminal state and reports the outcome.
    pub(crate) fn finish(
        &self,
        state: &mut MissionState,
        phase: Phase,
        started: Instant,
        failed: Vec<(ParticipantId, String)>,
        outcome: PhaseOutcome,
    ) -> PhaseReport {
        let duration = started.elapsed();
        let terminal = match outcome {
            PhaseOutcome::Satisfied => BarrierState::Satisfied,
            PhaseOutcome::Failed(_) => BarrierState::Failed,
        };
        transition(state, phase, terminal);

        let reason = match &outcome {
            PhaseOutcome::Satisfied => {
                info!(phase = %phase, elapsed = ?duration, "phase satisfied");
                None
            }
            PhaseOutcome::Failed(failure) => {
                error!(phase = %phase, elapsed = ?duration, reason = %failure, "phase failed");
                Some(failure.to_string())
            }
        };

        metrics::record_phase_outcome(phase.name(), outcome.label(), duration);
        self.events.emit(Event::PhaseCompleted {
            timestamp: Utc::now(),
            phase: phase.name().to_string(),
            outcome: outcome.label().to_string(),
            reason,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        });

        PhaseReport {
            phase,
            outcome,
            completed: state.completed_ids(),
            failed,
            duration,
        }
    }
}

pub(crate) fn transition(state: &mut MissionState, phase: Phase, to: BarrierState) {
    let from = state.barrier();
    state.set_barrier(to);
    debug!(phase = %phase, %from, %to, "barrier state");
}

fn timed_out(barrier: &Barrier) -> PhaseFailure {
    let pending: Vec<_> = barrier.wait_set.iter().copied().collect();
    warn!(phase = %barrier.phase, ?pending, "phase deadline elapsed");
    PhaseFailure::Timeout {
        pending,
        elapsed: barrier.started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::codec::{CodecMode, MessageCodec, MessageType, Target};
    use crate::config::targets::TargetTable;
    use crate::participant::{Participant, ParticipantChannel};
    use crate::phase::completion::Dispatch;
    use crate::transport::memory::{self, MemoryPeer};

    fn mission(n: u32, mode: CodecMode) -> (MissionState, Vec<MemoryPeer>) {
        let mut state = MissionState::new(TargetTable::default());
        let mut peers = Vec::new();
        for i in 1..=n {
            let (link, peer) = memory::pair();
            let channel = ParticipantChannel::new(Box::new(link), mode);
            state.add_participant(Participant::new(ParticipantId::new(i), channel));
            peers.push(peer);
        }
        (state, peers)
    }

    fn engine() -> BarrierEngine {
        BarrierEngine::new(Arc::new(EventEmitter::noop()))
    }

    fn id(n: u32) -> ParticipantId {
        ParticipantId::new(n)
    }

    #[tokio::test]
    async fn ack_phase_satisfies_with_out_of_order_acks() {
        let (mut state, peers) = mission(3, CodecMode::Text);
        peers[2].send(&b"ACK:TARGET"[..]);
        peers[0].send(&b"ACK:TARGET"[..]);
        peers[1].send(&b"ACK:TARGET"[..]);

        let request = PhaseRequest::new(
            Phase::Ack,
            state.active_ids(),
            Completion::text("ACK:TARGET"),
        );
        let report = engine().run(&mut state, &request).await;

        assert!(report.is_satisfied());
        assert_eq!(report.completed, vec![id(1), id(2), id(3)]);
        assert_eq!(state.barrier(), BarrierState::Satisfied);
    }

    #[tokio::test]
    async fn chatter_before_token_keeps_participant_waiting() {
        let (mut state, peers) = mission(1, CodecMode::Text);
        peers[0].send(&b"battery 87%"[..]);

        let request = PhaseRequest::new(
            Phase::Ready,
            state.active_ids(),
            Completion::text("READY"),
        );
        let engine = engine();
        let run = engine.run(&mut state, &request);
        let feeder = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            peers[0].send(&b"READY"[..]);
        };
        let (report, ()) = tokio::join!(run, feeder);

        assert!(report.is_satisfied());
        assert_eq!(report.completed, vec![id(1)]);
    }

    #[tokio::test]
    async fn three_of_five_complete_in_one_cycle() {
        let (mut state, peers) = mission(5, CodecMode::Binary);
        for i in [0, 2, 4] {
            peers[i].send(vec![MessageType::Ready.tag()]);
        }
        let request = PhaseRequest::new(
            Phase::Ready,
            state.active_ids(),
            Completion::Type(MessageType::Ready),
        )
        .with_timeout(Some(Duration::from_millis(50)));

        let report = engine().run(&mut state, &request).await;
        assert_eq!(report.completed, vec![id(1), id(3), id(5)]);
        match report.outcome {
            PhaseOutcome::Failed(PhaseFailure::Timeout { pending, .. }) => {
                assert_eq!(pending, vec![id(2), id(4)]);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    /// A link whose peer never stops talking.
    struct EndlessChatter;

    #[async_trait::async_trait]
    impl crate::transport::Link for EndlessChatter {
        async fn readable(&mut self) -> std::io::Result<()> {
            Ok(())
        }

        fn try_read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let line = b"status nominal\n";
            let n = line.len().min(buf.len());
            buf[..n].copy_from_slice(&line[..n]);
            Ok(n)
        }

        async fn write_frame(&mut self, _frame: &[u8]) -> crate::transport::Result<()> {
            Ok(())
        }

        async fn close(&mut self) -> crate::transport::Result<()> {
            Ok(())
        }

        fn link_type(&self) -> crate::transport::LinkType {
            crate::transport::LinkType::Memory
        }

        fn peer(&self) -> String {
            "chatter".to_string()
        }
    }

    #[tokio::test]
    async fn flooding_participant_cannot_starve_the_cycle() {
        let mut state = MissionState::new(TargetTable::default());
        let flooder = ParticipantChannel::new(Box::new(EndlessChatter), CodecMode::Text);
        state.add_participant(Participant::new(id(1), flooder));
        let (link, peer) = memory::pair();
        let quiet = ParticipantChannel::new(Box::new(link), CodecMode::Text);
        state.add_participant(Participant::new(id(2), quiet));
        peer.send(&b"READY"[..]);

        let request = PhaseRequest::new(Phase::Ready, state.active_ids(), Completion::text("READY"))
            .with_timeout(Some(Duration::from_millis(100)));
        let engine = engine();
        let report = tokio::time::timeout(Duration::from_secs(5), engine.run(&mut state, &request))
            .await
            .expect("flooded phase must still honor its deadline");

        assert_eq!(report.completed, vec![id(2)]);
        match report.outcome {
            PhaseOutcome::Failed(PhaseFailure::Timeout { pending, .. }) => {
                assert_eq!(pending, vec![id(1)]);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    /// A link whose readiness wait always fails.
    struct BrokenReadiness;

    #[async_trait::async_trait]
    impl crate::transport::Link for BrokenReadiness {
        async fn readable(&mut self) -> std::io::Result<()> {
            Err(std::io::ErrorKind::ConnectionReset.into())
        }

        fn try_read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::WouldBlock.into())
        }

        async fn write_frame(&mut self, _frame: &[u8]) -> crate::transport::Result<()> {
            Ok(())
        }

        async fn close(&mut self) -> crate::transport::Result<()> {
            Ok(())
        }

        fn link_type(&self) -> crate::transport::LinkType {
            crate::transport::LinkType::Memory
        }

        fn peer(&self) -> String {
            "broken".to_string()
        }
    }

    #[tokio::test]
    async fn readiness_failure_is_a_phase_failure() {
        let mut state = MissionState::new(TargetTable::default());
        let broken = ParticipantChannel::new(Box::new(BrokenReadiness), CodecMode::Binary);
        state.add_participant(Participant::new(id(1), broken));

        let request = PhaseRequest::new(
            Phase::Ack,
            state.active_ids(),
            Completion::Type(MessageType::Ack),
        );
        let report = engine().run(&mut state, &request).await;

        match report.outcome {
            PhaseOutcome::Failed(PhaseFailure::Multiplex {
                participant,
                reason,
            }) => {
                assert_eq!(participant, id(1));
                assert!(!reason.is_empty());
            }
            other => panic!("expected multiplex failure, got {other:?}"),
        }
        assert_eq!(state.failed_ids(), vec![id(1)]);
    }

    #[tokio::test]
    async fn unicast_dispatch_reaches_each_participant() {
        let (mut state, mut peers) = mission(2, CodecMode::Binary);
        let mut messages = BTreeMap::new();
        messages.insert(id(1), Message::Target(Target::new(1.0, 2.0, 3.0)));
        messages.insert(id(2), Message::Target(Target::new(4.0, 5.0, 6.0)));
        let request = PhaseRequest::new(Phase::Target, state.active_ids(), Completion::Immediate)
            .with_dispatch(Dispatch::Unicast(messages));

        let report = engine().run(&mut state, &request).await;
        assert!(report.is_satisfied());
        assert_eq!(report.completed, vec![id(1), id(2)]);

        let mut codec = MessageCodec::new(CodecMode::Binary);
        assert_eq!(
            peers[0].recv_message(&mut codec).await,
            Some(Message::Target(Target::new(1.0, 2.0, 3.0)))
        );
        assert_eq!(
            peers[1].recv_message(&mut codec).await,
            Some(Message::Target(Target::new(4.0, 5.0, 6.0)))
        );
    }

    #[tokio::test]
    async fn disconnect_fails_phase_under_abort() {
        let (mut state, mut peers) = mission(3, CodecMode::Text);
        peers[0].send(&b"READY"[..]);
        peers[1].disconnect();

        let request = PhaseRequest::new(
            Phase::Ready,
            state.active_ids(),
            Completion::text("READY"),
        );
        let report = engine().run(&mut state, &request).await;

        assert!(matches!(
            report.outcome,
            PhaseOutcome::Failed(PhaseFailure::Disconnected { participant, .. })
                if participant == id(2)
        ));
        assert_eq!(state.barrier(), BarrierState::Failed);
        assert_eq!(state.failed_ids(), vec![id(2)]);
        assert_eq!(report.failed.len(), 1);
    }

    #[tokio::test]
    async fn disconnect_is_dropped_under_drop_policy() {
        let (mut state, mut peers) = mission(3, CodecMode::Text);
        peers[0].send(&b"READY"[..]);
        peers[1].disconnect();
        peers[2].send(&b"READY"[..]);

        let request = PhaseRequest::new(Phase::Ready, state.active_ids(), Completion::text("READY"))
            .with_policy(FailurePolicy::Drop);
        let report = engine().run(&mut state, &request).await;

        assert!(report.is_satisfied());
        assert_eq!(report.completed, vec![id(1), id(3)]);
        assert_eq!(state.active_ids(), vec![id(1), id(3)]);
    }

    #[tokio::test]
    async fn all_dropped_is_failure() {
        let (mut state, mut peers) = mission(2, CodecMode::Binary);
        peers[0].disconnect();
        peers[1].disconnect();

        let request = PhaseRequest::new(
            Phase::Ready,
            state.active_ids(),
            Completion::Type(MessageType::Ready),
        )
        .with_policy(FailurePolicy::Drop);
        let report = engine().run(&mut state, &request).await;
        assert_eq!(report.outcome, PhaseOutcome::Failed(PhaseFailure::AllFailed));
    }

    #[tokio::test]
    async fn write_failure_fails_dispatch() {
        let (mut state, mut peers) = mission(2, CodecMode::Binary);
        drop(peers.remove(1));

        let request = PhaseRequest::new(
            Phase::Rtl,
            state.active_ids(),
            Completion::Type(MessageType::Ready),
        )
        .with_dispatch(Dispatch::Broadcast(Message::Type(MessageType::Rtl)));
        let report = engine().run(&mut state, &request).await;

        assert!(matches!(
            report.outcome,
            PhaseOutcome::Failed(PhaseFailure::WriteFailed { participant, .. })
                if participant == id(2)
        ));
    }

    #[tokio::test]
    async fn timeout_reports_pending_participants() {
        let (mut state, peers) = mission(2, CodecMode::Binary);
        peers[0].send(vec![MessageType::Ready.tag()]);

        let request = PhaseRequest::new(
            Phase::Ready,
            state.active_ids(),
            Completion::Type(MessageType::Ready),
        )
        .with_timeout(Some(Duration::from_millis(30)));
        let report = engine().run(&mut state, &request).await;

        match report.outcome {
            PhaseOutcome::Failed(PhaseFailure::Timeout { pending, .. }) => {
                assert_eq!(pending, vec![id(2)]);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(report.completed, vec![id(1)]);
    }

    #[tokio::test]
    async fn failed_participants_are_not_waited_on() {
        let (mut state, peers) = mission(2, CodecMode::Binary);
        state.participant_mut(id(2)).unwrap().mark_failed("ACK", "gone");
        peers[0].send(vec![MessageType::Ready.tag()]);

        let request = PhaseRequest::new(
            Phase::Ready,
            vec![id(1), id(2)],
            Completion::Type(MessageType::Ready),
        );
        let report = engine().run(&mut state, &request).await;
        assert!(report.is_satisfied());
        assert_eq!(report.completed, vec![id(1)]);
    }

    #[tokio::test]
    async fn leftover_frames_carry_into_next_phase() {
        let (mut state, peers) = mission(1, CodecMode::Binary);
        // ACK and READY coalesced into one read.
        peers[0].send(vec![MessageType::Ack.tag(), MessageType::Ready.tag()]);
        let engine = engine();

        let ack = PhaseRequest::new(
            Phase::Ack,
            state.active_ids(),
            Completion::Type(MessageType::Ack),
        );
        assert!(engine.run(&mut state, &ack).await.is_satisfied());

        let ready = PhaseRequest::new(
            Phase::Ready,
            state.active_ids(),
            Completion::Type(MessageType::Ready),
        )
        .with_timeout(Some(Duration::from_secs(1)));
        assert!(engine.run(&mut state, &ready).await.is_satisfied());
    }
}
