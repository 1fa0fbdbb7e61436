//! Mission sequencer.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::confirm::{Confirmation, StdinConfirmation};
use super::plan::ProtocolPlan;
use super::{MissionOptions, MissionOutcome, MissionReport};
use crate::codec::Message;
use crate::config::targets::TargetTable;
use crate::observability::metrics;
use crate::observability::{Event, EventEmitter};
use crate::participant::{Participant, ParticipantChannel, ParticipantId};
use crate::phase::engine::transition;
use crate::phase::{
    BarrierEngine, BarrierState, Completion, Dispatch, MissionState, Phase, PhaseFailure,
    PhaseOutcome, PhaseReport, PhaseRequest,
};
use crate::transport::Acceptor;

const CONFIRM_PROMPT: &str = "All phases complete. Press Enter to finish the mission... ";

/// Drives one mission from CONNECT to teardown.
pub struct Sequencer {
    options: MissionOptions,
    engine: BarrierEngine,
    confirmation: Box<dyn Confirmation>,
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Sequencer {
    /// Creates a sequencer that confirms on stdin when `options.confirm`
    /// is set.
    #[must_use]
    pub fn new(options: MissionOptions, events: Arc<EventEmitter>) -> Self {
        Self {
            options,
            engine: BarrierEngine::new(events),
            confirmation: Box::new(StdinConfirmation),
        }
    }

    /// Replaces the confirmation gate.
    #[must_use]
    pub fn with_confirmation(mut self, confirmation: Box<dyn Confirmation>) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// Runs a full mission over links from `acceptor`.
    ///
    /// Never returns early: whatever happens, every accepted channel is
    /// closed before the report is returned.
    pub async fn run(
        &mut self,
        acceptor: &mut dyn Acceptor,
        targets: TargetTable,
    ) -> MissionReport {
        let mission_id = Uuid::new_v4();
        let started = Instant::now();
        let plan = ProtocolPlan::for_mode(self.options.codec);
        let events = Arc::clone(self.engine.events());

        info!(
            %mission_id,
            fleet_size = self.options.fleet_size,
            codec = %self.options.codec,
            return_home = self.options.return_home,
            policy = %self.options.failure_policy,
            "mission started"
        );
        events.emit(Event::MissionStarted {
            timestamp: Utc::now(),
            mission_id: mission_id.to_string(),
            fleet_size: self.options.fleet_size,
            codec: self.options.codec.to_string(),
            return_home: self.options.return_home,
        });
        if targets.len() < self.options.fleet_size {
            warn!(
                loaded = targets.len(),
                fleet_size = self.options.fleet_size,
                "fewer targets than participants"
            );
        }

        let mut state = MissionState::new(targets);
        let mut phases = Vec::new();
        let outcome = self.drive(&mut state, acceptor, &plan, &mut phases).await;

        if outcome == MissionOutcome::Completed {
            if self.options.confirm
                && let Err(e) = self.confirmation.confirm(CONFIRM_PROMPT).await
            {
                warn!(error = %e, "confirmation failed, finishing anyway");
            }
            self.send_finished(&mut state, &plan).await;
        }

        state.close_all().await;
        metrics::set_participants_connected(0);

        let failed: Vec<_> = phases
            .iter()
            .flat_map(|report| {
                report
                    .failed
                    .iter()
                    .map(move |(id, reason)| (*id, report.phase, reason.clone()))
            })
            .collect();
        let duration = started.elapsed();

        match &outcome {
            MissionOutcome::Completed => {
                info!(%mission_id, elapsed = ?duration, "mission finished");
            }
            MissionOutcome::Aborted { phase, failure } => {
                error!(%mission_id, phase = %phase, reason = %failure, "mission aborted");
            }
        }
        events.emit(Event::MissionFinished {
            timestamp: Utc::now(),
            mission_id: mission_id.to_string(),
            outcome: outcome.label().to_string(),
            failed_phase: match &outcome {
                MissionOutcome::Completed => None,
                MissionOutcome::Aborted { phase, .. } => Some(phase.name().to_string()),
            },
            failed_participants: failed.iter().map(|(id, _, _)| *id).collect(),
        });

        MissionReport {
            mission_id,
            outcome,
            phases,
            failed,
            connected: state.participants().len(),
            duration,
        }
    }

    async fn drive(
        &self,
        state: &mut MissionState,
        acceptor: &mut dyn Acceptor,
        plan: &ProtocolPlan,
        phases: &mut Vec<PhaseReport>,
    ) -> MissionOutcome {
        let report = self.connect(state, acceptor).await;
        if let Some(outcome) = record(phases, report) {
            return outcome;
        }

        let mut sequence = vec![Phase::Target, Phase::Ack, Phase::Ready];
        if self.options.return_home {
            sequence.extend([Phase::Rtl, Phase::Land]);
        }

        for phase in sequence {
            let request = self.request_for(phase, state, plan);
            let report = self.engine.run(state, &request).await;
            if let Some(outcome) = record(phases, report) {
                return outcome;
            }
        }
        MissionOutcome::Completed
    }

    /// Accepts exactly `fleet_size` links, assigning identities in accept
    /// order.
    async fn connect(&self, state: &mut MissionState, acceptor: &mut dyn Acceptor) -> PhaseReport {
        let phase = Phase::Connect;
        let started = Instant::now();
        let deadline = self.options.phase_timeout.map(|t| started + t);
        let fleet_size = u32::try_from(self.options.fleet_size).unwrap_or(u32::MAX);

        state.begin_phase(&[]);
        self.engine.announce(phase, self.options.fleet_size);
        transition(state, phase, BarrierState::Waiting);
        if let Some(addr) = acceptor.local_addr() {
            info!(%addr, fleet_size, "waiting for participants");
        }

        let mut failure = None;
        for id in (1..=fleet_size).map(ParticipantId::new) {
            let accepted = match deadline {
                Some(deadline) => {
                    if let Ok(result) = tokio::time::timeout_at(deadline, acceptor.accept()).await {
                        result
                    } else {
                        failure = Some(PhaseFailure::Timeout {
                            pending: (id.get()..=fleet_size).map(ParticipantId::new).collect(),
                            elapsed: started.elapsed(),
                        });
                        break;
                    }
                }
                None => acceptor.accept().await,
            };

            match accepted {
                Ok(link) => {
                    let channel = ParticipantChannel::new(link, self.options.codec);
                    let peer = channel.peer();
                    info!(
                        participant = %id,
                        %peer,
                        link = %channel.link_type(),
                        "participant connected"
                    );
                    self.engine.events().emit(Event::ParticipantConnected {
                        timestamp: Utc::now(),
                        participant: id,
                        peer,
                    });
                    state.add_participant(Participant::new(id, channel));
                    state.join_complete(id);
                    metrics::set_participants_connected(state.participants().len());
                }
                Err(e) => {
                    failure = Some(PhaseFailure::Accept {
                        participant: id,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }

        let outcome = failure.map_or(PhaseOutcome::Satisfied, PhaseOutcome::Failed);
        self.engine.finish(state, phase, started, Vec::new(), outcome)
    }

    fn request_for(&self, phase: Phase, state: &MissionState, plan: &ProtocolPlan) -> PhaseRequest {
        let active = state.active_ids();
        let targeted: Vec<_> = active
            .iter()
            .copied()
            .filter(|&id| state.targets().for_participant(id).is_some())
            .collect();

        let request = match phase {
            Phase::Target => {
                for id in active.iter().filter(|id| !targeted.contains(id)) {
                    warn!(participant = %id, "no target loaded; skipping TARGET, ACK and READY");
                }
                let messages: BTreeMap<_, _> = targeted
                    .iter()
                    .filter_map(|&id| {
                        state
                            .targets()
                            .for_participant(id)
                            .map(|t| (id, Message::Target(t)))
                    })
                    .collect();
                PhaseRequest::new(phase, targeted, Completion::Immediate)
                    .with_dispatch(Dispatch::Unicast(messages))
            }
            Phase::Ack => PhaseRequest::new(phase, targeted, plan.ack.clone()),
            Phase::Ready => PhaseRequest::new(phase, targeted, plan.ready.clone()),
            Phase::Rtl => PhaseRequest::new(phase, active, plan.rtl_done.clone())
                .with_dispatch(Dispatch::Broadcast(plan.rtl_command.clone())),
            Phase::Land => PhaseRequest::new(phase, active, plan.land_done.clone())
                .with_dispatch(Dispatch::Broadcast(plan.land_command.clone())),
            // CONNECT has no barrier request; it is driven by `connect`.
            Phase::Connect => PhaseRequest::new(phase, Vec::new(), Completion::Immediate),
        };

        request
            .with_policy(self.options.failure_policy)
            .with_timeout(self.options.phase_timeout)
    }

    /// Notifies every still-active participant that the mission is over.
    /// Failures here are logged only; the mission has already completed.
    async fn send_finished(&self, state: &mut MissionState, plan: &ProtocolPlan) {
        for participant in state.participants_mut() {
            if !participant.is_active() {
                continue;
            }
            let id = participant.id();
            match participant.channel_mut().write(&plan.finished).await {
                Ok(()) => {
                    info!(participant = %id, message = %plan.finished, "sent");
                    metrics::record_message_sent(plan.finished.label());
                    self.engine.events().emit(Event::MessageSent {
                        timestamp: Utc::now(),
                        phase: "FINISHED".to_string(),
                        participant: id,
                        kind: plan.finished.label().to_string(),
                        message: plan.finished.to_string(),
                    });
                }
                Err(e) => warn!(participant = %id, error = %e, "could not send FINISHED"),
            }
        }
    }
}

/// Appends `report`; returns the abort outcome if the phase failed.
fn record(phases: &mut Vec<PhaseReport>, report: PhaseReport) -> Option<MissionOutcome> {
    let aborted = match &report.outcome {
        PhaseOutcome::Satisfied => None,
        PhaseOutcome::Failed(failure) => Some(MissionOutcome::Aborted {
            phase: report.phase,
            failure: failure.clone(),
        }),
    };
    phases.push(report);
    aborted
}
