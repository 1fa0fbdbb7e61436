//! Simulated UAV agent.
//!
//! Speaks either wire variant from the participant side: acknowledges a
//! target, "travels" for a fixed time, reports arrival, answers RTL and
//! LAND the same way, and exits on the mission-complete notice. Nothing
//! is actually flown; coordinates are only logged.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{info, warn};

use crate::codec::text::TARGET_PREFIX;
use crate::codec::{CodecMode, Message, MessageCodec, MessageType, Target};
use crate::error::TransportError;

/// Default controller address.
pub const DEFAULT_CONNECT: &str = "127.0.0.1:5000";

/// Settings for one agent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOptions {
    /// Controller address.
    pub connect: String,
    /// Wire codec; must match the controller's.
    pub codec: CodecMode,
    /// Simulated time to reach a target, home, or the ground.
    pub travel_time: Duration,
    /// Connection attempts before giving up.
    pub connect_attempts: u32,
    /// Delay between connection attempts.
    pub retry_delay: Duration,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT.to_string(),
            codec: CodecMode::default(),
            travel_time: Duration::from_secs(1),
            connect_attempts: 10,
            retry_delay: Duration::from_secs(3),
        }
    }
}

/// What an agent saw during its run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentSummary {
    /// Targets received, in order.
    pub targets: Vec<Target>,
    /// RTL/LAND commands answered.
    pub commands: usize,
    /// Whether the controller declared the mission complete.
    pub finished: bool,
}

/// Connects to `addr`, retrying on failure.
///
/// # Errors
///
/// Returns the last connection error once `attempts` are exhausted.
pub async fn connect_with_retry(
    addr: &str,
    attempts: u32,
    delay: Duration,
) -> Result<TcpStream, TransportError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                info!(%addr, attempt, "connected to controller");
                return Ok(stream);
            }
            Err(e) if attempt < attempts => {
                warn!(%addr, attempt, attempts, error = %e, "connection failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(TransportError::Io(e)),
        }
    }
}

/// Connects to the controller and runs the agent until the mission ends.
///
/// # Errors
///
/// Returns a transport error if the connection cannot be established or
/// breaks mid-mission.
pub async fn run(options: &AgentOptions) -> Result<AgentSummary, TransportError> {
    let stream =
        connect_with_retry(&options.connect, options.connect_attempts, options.retry_delay).await?;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "could not disable Nagle");
    }
    serve(stream, options.codec, options.travel_time).await
}

/// Runs the agent protocol over an established byte stream.
///
/// # Errors
///
/// Returns a transport error if a frame cannot be decoded or written.
pub async fn serve<S>(
    io: S,
    mode: CodecMode,
    travel_time: Duration,
) -> Result<AgentSummary, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(io, MessageCodec::new(mode));
    let mut summary = AgentSummary::default();

    while let Some(frame) = framed.next().await {
        let message = frame?;
        info!(%message, "received");

        match (mode, message) {
            (_, Message::Target(target)) => {
                summary.targets.push(target);
                send(&mut framed, ack(mode)).await?;
                info!(%target, "travelling to target");
                tokio::time::sleep(travel_time).await;
                send(&mut framed, ready(mode)).await?;
            }
            (CodecMode::Binary, Message::Type(kind @ (MessageType::Rtl | MessageType::Land))) => {
                summary.commands += 1;
                send(&mut framed, Message::Type(MessageType::Ack)).await?;
                info!(command = kind.name(), "executing");
                tokio::time::sleep(travel_time).await;
                send(&mut framed, Message::Type(MessageType::Ready)).await?;
            }
            // Binary controllers signal mission completion with READY.
            (CodecMode::Binary, Message::Type(MessageType::Ready)) | (_, Message::Finished) => {
                summary.finished = true;
                break;
            }
            (CodecMode::Text, Message::Text(token)) if token == "RTL" || token == "LAND" => {
                summary.commands += 1;
                send(&mut framed, Message::Text(format!("ACK:{token}"))).await?;
                info!(command = %token, "executing");
                tokio::time::sleep(travel_time).await;
                send(&mut framed, Message::Text(format!("{token}_COMPLETE"))).await?;
            }
            (CodecMode::Text, Message::Text(token)) if token.starts_with(TARGET_PREFIX) => {
                warn!(%token, "malformed target");
                send(&mut framed, Message::Text("ERROR:invalid target".to_string())).await?;
            }
            (_, other) => warn!(message = %other, "ignoring unexpected message"),
        }
    }

    if summary.finished {
        info!("mission complete");
    } else {
        warn!("controller closed the connection before the mission completed");
    }
    Ok(summary)
}

fn ack(mode: CodecMode) -> Message {
    match mode {
        CodecMode::Binary => Message::Type(MessageType::Ack),
        CodecMode::Text => Message::Text("ACK:TARGET".to_string()),
    }
}

fn ready(mode: CodecMode) -> Message {
    match mode {
        CodecMode::Binary => Message::Type(MessageType::Ready),
        CodecMode::Text => Message::Text("READY".to_string()),
    }
}

async fn send<S>(
    framed: &mut Framed<S, MessageCodec>,
    message: Message,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    framed.send(&message).await?;
    info!(%message, "sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn binary_agent_follows_full_mission() {
        let (agent_io, mut controller) = tokio::io::duplex(256);
        let agent = tokio::spawn(serve(agent_io, CodecMode::Binary, Duration::ZERO));

        let codec = MessageCodec::new(CodecMode::Binary);
        controller
            .write_all(&codec.frame(&Message::Target(Target::new(1.0, 2.0, 3.0))).unwrap())
            .await
            .unwrap();
        let mut reply = [0u8; 2];
        controller.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [2, 3]);

        controller.write_all(&[4]).await.unwrap();
        controller.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [2, 3]);

        controller.write_all(&[3]).await.unwrap();
        let summary = agent.await.unwrap().unwrap();
        assert_eq!(summary.targets, vec![Target::new(1.0, 2.0, 3.0)]);
        assert_eq!(summary.commands, 1);
        assert!(summary.finished);
    }

    #[tokio::test]
    async fn text_agent_answers_with_tokens() {
        let (agent_io, controller) = tokio::io::duplex(256);
        let agent = tokio::spawn(serve(agent_io, CodecMode::Text, Duration::ZERO));
        let mut framed = Framed::new(controller, MessageCodec::new(CodecMode::Text));

        framed
            .send(&Message::Target(Target::new(4.0, 5.0, 6.0)))
            .await
            .unwrap();
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            Message::Text("ACK:TARGET".into())
        );
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            Message::Text("READY".into())
        );

        framed.send(&Message::Text("LAND".into())).await.unwrap();
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            Message::Text("ACK:LAND".into())
        );
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            Message::Text("LAND_COMPLETE".into())
        );

        framed.send(&Message::Text("TARGET:1,2".into())).await.unwrap();
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            Message::Text("ERROR:invalid target".into())
        );

        framed.send(&Message::Finished).await.unwrap();
        let summary = agent.await.unwrap().unwrap();
        assert!(summary.finished);
        assert_eq!(summary.commands, 1);
    }

    #[tokio::test]
    async fn early_close_is_not_finished() {
        let (agent_io, controller) = tokio::io::duplex(64);
        drop(controller);
        let summary = serve(agent_io, CodecMode::Binary, Duration::ZERO)
            .await
            .unwrap();
        assert!(!summary.finished);
    }

    #[tokio::test]
    async fn connect_gives_up_after_attempts() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = connect_with_retry(&addr, 2, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }
}
