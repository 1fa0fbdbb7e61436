//! Shared integration-test harness: in-memory fleets, scripted agents,
//! and an event-capture buffer.

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use fleetctl::codec::{CodecMode, Message, MessageCodec, MessageType};
use fleetctl::config::TargetTable;
use fleetctl::mission::{AutoConfirmation, MissionOptions, MissionReport, Sequencer};
use fleetctl::observability::EventEmitter;
use fleetctl::transport::memory::{self, MemoryAcceptor, MemoryPeer};

/// Upper bound on any single mission in tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How a scripted agent behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Acknowledges and reports every command.
    Cooperative,
    /// Acknowledges its target, then drops the connection.
    DisconnectBeforeReady,
    /// Acknowledges its target but never reports READY.
    StallBeforeReady,
    /// Never sends anything.
    Silent,
}

/// Everything a scripted agent received before its link closed.
#[derive(Debug, Default)]
pub struct AgentLog {
    pub received: Vec<Message>,
}

impl AgentLog {
    /// Returns the targets received, in order.
    pub fn targets(&self) -> Vec<fleetctl::codec::Target> {
        self.received
            .iter()
            .filter_map(|m| match m {
                Message::Target(t) => Some(*t),
                _ => None,
            })
            .collect()
    }
}

/// Opens `n` in-memory links; agent `i` becomes participant `i + 1`.
pub fn fleet(n: usize) -> (MemoryAcceptor, Vec<MemoryPeer>) {
    let (acceptor, connector) = memory::listener();
    let peers = (0..n)
        .map(|_| connector.connect().expect("acceptor alive"))
        .collect();
    (acceptor, peers)
}

/// Spawns a scripted agent; the task ends when the controller closes the link.
pub fn spawn_agent(
    mut peer: MemoryPeer,
    mode: CodecMode,
    behavior: Behavior,
) -> JoinHandle<AgentLog> {
    tokio::spawn(async move {
        let mut codec = MessageCodec::new(mode);
        let mut log = AgentLog::default();

        while let Some(message) = peer.recv_message(&mut codec).await {
            log.received.push(message.clone());
            match behavior {
                Behavior::Silent => continue,
                Behavior::DisconnectBeforeReady | Behavior::StallBeforeReady
                    if matches!(message, Message::Target(_)) =>
                {
                    let _ = peer.send_message(codec, &ack(mode));
                    if behavior == Behavior::DisconnectBeforeReady {
                        peer.disconnect();
                    }
                    continue;
                }
                _ => {}
            }
            for reply in replies(mode, &message) {
                let _ = peer.send_message(codec, &reply);
            }
        }
        log
    })
}

fn ack(mode: CodecMode) -> Message {
    match mode {
        CodecMode::Binary => Message::Type(MessageType::Ack),
        CodecMode::Text => Message::Text("ACK:TARGET".into()),
    }
}

fn replies(mode: CodecMode, message: &Message) -> Vec<Message> {
    match (mode, message) {
        (CodecMode::Binary, Message::Target(_)) => vec![
            Message::Type(MessageType::Ack),
            Message::Type(MessageType::Ready),
        ],
        (CodecMode::Text, Message::Target(_)) => vec![
            Message::Text("ACK:TARGET".into()),
            Message::Text("READY".into()),
        ],
        (CodecMode::Binary, Message::Type(MessageType::Rtl | MessageType::Land)) => vec![
            Message::Type(MessageType::Ack),
            Message::Type(MessageType::Ready),
        ],
        (CodecMode::Text, Message::Text(token)) if token == "RTL" || token == "LAND" => {
            vec![Message::Text(format!("{token}_COMPLETE"))]
        }
        _ => Vec::new(),
    }
}

/// Runs a mission over `acceptor` with automatic confirmation.
pub async fn run_mission(
    options: MissionOptions,
    targets: TargetTable,
    acceptor: &mut MemoryAcceptor,
    events: EventEmitter,
) -> MissionReport {
    let mut sequencer =
        Sequencer::new(options, Arc::new(events)).with_confirmation(Box::new(AutoConfirmation));
    tokio::time::timeout(TEST_TIMEOUT, sequencer.run(acceptor, targets))
        .await
        .expect("mission did not finish in time")
}

/// Joins every agent task, in participant order.
pub async fn join_agents(handles: Vec<JoinHandle<AgentLog>>) -> Vec<AgentLog> {
    let mut logs = Vec::with_capacity(handles.len());
    for handle in handles {
        let log = tokio::time::timeout(TEST_TIMEOUT, handle)
            .await
            .expect("agent link was never closed")
            .expect("agent task panicked");
        logs.push(log);
    }
    logs
}

/// A cloneable in-memory writer for capturing JSONL events.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Builds an emitter that writes into this buffer.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter::new(Box::new(self.clone()))
    }

    /// Returns every captured event as parsed JSON.
    pub fn events(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Returns the path of a file under `tests/fixtures/`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Runs the `fleetctl` binary to completion with `args`.
pub fn spawn_command(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fleetctl"))
        .args(args)
        .env_remove("FLEETCTL_LOG_LEVEL")
        .output()
        .expect("failed to run fleetctl")
}
