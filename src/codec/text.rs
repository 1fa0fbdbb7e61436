//! Text token framing.
//!
//! A frame is one token. When the buffer holds a newline the token runs up
//! to it; otherwise the whole buffered read is the token. Partial text is
//! never carried over to a later read, so a token split across two reads
//! decodes as two (non-matching) tokens.

use bytes::{BufMut, BytesMut};

use super::message::{Message, Target};
use crate::error::TransportError;

/// Prefix of a text TARGET frame (`TARGET:x,y,z`).
pub const TARGET_PREFIX: &str = "TARGET:";

/// End-of-mission token.
pub const FINISHED_TOKEN: &str = "FINISHED";

/// Returns whether `buf` holds at least one non-blank token.
#[must_use]
pub fn frame_ready(buf: &[u8]) -> bool {
    buf.iter().any(|b| !b.is_ascii_whitespace())
}

/// Decodes one token from the front of `src`, skipping blank lines.
pub fn decode(src: &mut BytesMut) -> Option<Message> {
    loop {
        if src.is_empty() {
            return None;
        }

        let frame = match src.iter().position(|&b| b == b'\n') {
            Some(pos) => src.split_to(pos + 1),
            None => src.split(),
        };

        let token = String::from_utf8_lossy(&frame);
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        return Some(parse_token(token));
    }
}

fn parse_token(token: &str) -> Message {
    if let Some(target) = token
        .strip_prefix(TARGET_PREFIX)
        .and_then(Target::parse_csv)
    {
        return Message::Target(target);
    }
    if token == FINISHED_TOKEN {
        return Message::Finished;
    }
    Message::Text(token.to_string())
}

/// Encodes `message` onto `dst` as a newline-terminated token.
///
/// # Errors
///
/// Returns `TransportError::Protocol` for bare type codes, for tokens that
/// would break framing (embedded newlines), and for empty or
/// whitespace-padded tokens, which would not decode back unchanged.
pub fn encode(message: &Message, dst: &mut BytesMut) -> Result<(), TransportError> {
    let token = match message {
        Message::Target(target) => format!("{TARGET_PREFIX}{target}"),
        Message::Text(token) => {
            if token.contains('\n') {
                return Err(TransportError::Protocol(
                    "text tokens must not contain newlines".to_string(),
                ));
            }
            if token.is_empty() || token.trim() != token {
                return Err(TransportError::Protocol(format!(
                    "text token {token:?} is empty or padded with whitespace"
                )));
            }
            token.clone()
        }
        Message::Finished => FINISHED_TOKEN.to_string(),
        Message::Type(kind) => {
            return Err(TransportError::Protocol(format!(
                "type code {kind} is not carried by the text codec"
            )));
        }
    };

    dst.reserve(token.len() + 1);
    dst.put_slice(token.as_bytes());
    dst.put_u8(b'\n');
    Ok(())
}
