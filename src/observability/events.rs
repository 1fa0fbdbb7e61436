//! Structured mission event stream.
//!
//! Discrete, typed events emitted while a mission runs. Events are
//! serialized as newline-delimited JSON (JSONL) with a monotonically
//! increasing sequence number.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::participant::ParticipantId;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a mission.
///
/// Each variant is tagged with `"type"` when serialized to JSON so
/// consumers can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The sequencer is about to accept participants.
    MissionStarted {
        /// When the mission started.
        timestamp: DateTime<Utc>,
        /// Unique id of this run.
        mission_id: String,
        /// Expected number of participants.
        fleet_size: usize,
        /// Codec mode name.
        codec: String,
        /// Whether RTL and LAND will run.
        return_home: bool,
    },

    /// A participant was accepted during CONNECT.
    ParticipantConnected {
        /// When the link was accepted.
        timestamp: DateTime<Utc>,
        /// Assigned identity.
        participant: ParticipantId,
        /// Peer description.
        peer: String,
    },

    /// A phase barrier began.
    PhaseEntered {
        /// When the phase began.
        timestamp: DateTime<Utc>,
        /// Phase name.
        phase: String,
        /// Size of the wait set.
        participants: usize,
    },

    /// A frame was written to a participant.
    MessageSent {
        /// When the frame was written.
        timestamp: DateTime<Utc>,
        /// Phase name.
        phase: String,
        /// Recipient.
        participant: ParticipantId,
        /// Closed-set message kind.
        kind: String,
        /// Printable message summary.
        message: String,
    },

    /// A message was decoded from a participant.
    MessageReceived {
        /// When the message was decoded.
        timestamp: DateTime<Utc>,
        /// Phase name.
        phase: String,
        /// Sender.
        participant: ParticipantId,
        /// Closed-set message kind.
        kind: String,
        /// Printable message summary.
        message: String,
        /// Whether the message satisfied the phase.
        completed: bool,
    },

    /// A participant satisfied the current phase.
    ParticipantCompleted {
        /// When the participant completed.
        timestamp: DateTime<Utc>,
        /// Phase name.
        phase: String,
        /// Participant that completed.
        participant: ParticipantId,
    },

    /// A participant failed permanently.
    ParticipantFailed {
        /// When the failure was detected.
        timestamp: DateTime<Utc>,
        /// Phase name.
        phase: String,
        /// Failed participant.
        participant: ParticipantId,
        /// Human-readable reason.
        reason: String,
    },

    /// A phase barrier ended.
    PhaseCompleted {
        /// When the phase ended.
        timestamp: DateTime<Utc>,
        /// Phase name.
        phase: String,
        /// `"satisfied"` or `"failed"`.
        outcome: String,
        /// Failure reason, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        /// Time spent in the phase.
        duration_ms: u64,
    },

    /// The mission ended and channels were torn down.
    MissionFinished {
        /// When teardown completed.
        timestamp: DateTime<Utc>,
        /// Unique id of this run.
        mission_id: String,
        /// `"completed"` or `"aborted"`.
        outcome: String,
        /// Phase that failed, if the mission aborted.
        #[serde(skip_serializing_if = "Option::is_none")]
        failed_phase: Option<String>,
        /// Participants that failed during the run.
        failed_participants: Vec<ParticipantId>,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) increments the sequence counter,
/// serializes the event as a single JSON line, and flushes. Serialization
/// or I/O failures are dropped; a broken event sink never aborts a
/// mission.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock()
            && let Ok(line) = serde_json::to_string(&envelope)
        {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
