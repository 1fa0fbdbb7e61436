//! Binary typed framing.
//!
//! A frame is one tag byte, followed by 24 bytes (three little-endian
//! `f64`) when the tag is TARGET. Every other tag is a complete frame on
//! its own.

use bytes::{Buf, BufMut, BytesMut};

use super::message::{Message, MessageType, Target};
use crate::error::TransportError;

/// Length of a TARGET frame: tag + 3 x f64.
pub const TARGET_FRAME_LEN: usize = 1 + 3 * 8;

/// Returns whether `buf` starts with a complete frame.
#[must_use]
pub fn frame_ready(buf: &[u8]) -> bool {
    match buf.first() {
        None => false,
        Some(&tag) if tag == MessageType::Target.tag() => buf.len() >= TARGET_FRAME_LEN,
        Some(_) => true,
    }
}

/// Decodes one frame from the front of `src`.
///
/// Returns `None` and leaves `src` untouched when the frame is incomplete.
pub fn decode(src: &mut BytesMut) -> Option<Message> {
    if !frame_ready(src) {
        return None;
    }

    let tag = src[0];
    if tag == MessageType::Target.tag() {
        let mut frame = src.split_to(TARGET_FRAME_LEN);
        frame.advance(1);
        let x = frame.get_f64_le();
        let y = frame.get_f64_le();
        let z = frame.get_f64_le();
        return Some(Message::Target(Target::new(x, y, z)));
    }

    src.advance(1);
    Some(Message::Type(MessageType::from_tag(tag)))
}

/// Encodes `message` onto `dst`.
///
/// # Errors
///
/// Returns `TransportError::Protocol` for text tokens and for a bare
/// TARGET type code, neither of which has a binary frame.
pub fn encode(message: &Message, dst: &mut BytesMut) -> Result<(), TransportError> {
    match message {
        Message::Target(target) => {
            dst.reserve(TARGET_FRAME_LEN);
            dst.put_u8(MessageType::Target.tag());
            dst.put_f64_le(target.x);
            dst.put_f64_le(target.y);
            dst.put_f64_le(target.z);
        }
        Message::Type(MessageType::Target) => {
            return Err(TransportError::Protocol(
                "a TARGET frame must carry coordinates".to_string(),
            ));
        }
        Message::Type(kind) => dst.put_u8(kind.tag()),
        // The binary client reads a controller READY as "mission complete".
        Message::Finished => dst.put_u8(MessageType::Ready.tag()),
        Message::Text(_) => {
            return Err(TransportError::Protocol(
                "text tokens are not carried by the binary codec".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_frame_layout() {
        let mut buf = BytesMut::new();
        encode(&Message::Target(Target::new(1.0, 2.0, 3.0)), &mut buf).unwrap();
        assert_eq!(buf.len(), TARGET_FRAME_LEN);
        assert_eq!(buf[0], 1);
        assert_eq!(&buf[1..9], &1.0f64.to_le_bytes());
        assert_eq!(&buf[17..25], &3.0f64.to_le_bytes());
    }

    #[test]
    fn partial_target_consumes_nothing() {
        let mut buf = BytesMut::from(&[1u8, 0, 0, 0][..]);
        assert_eq!(decode(&mut buf), None);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn back_to_back_frames_decode_in_order() {
        let mut buf = BytesMut::from(&[2u8, 3, 9][..]);
        assert_eq!(decode(&mut buf), Some(Message::Type(MessageType::Ack)));
        assert_eq!(decode(&mut buf), Some(Message::Type(MessageType::Ready)));
        assert_eq!(
            decode(&mut buf),
            Some(Message::Type(MessageType::Unknown(9)))
        );
        assert_eq!(decode(&mut buf), None);
    }

    #[test]
    fn finished_is_sent_as_ready_tag() {
        let mut buf = BytesMut::new();
        encode(&Message::Finished, &mut buf).unwrap();
        assert_eq!(&buf[..], &[3]);
    }

    #[test]
    fn text_is_rejected() {
        let mut buf = BytesMut::new();
        let err = encode(&Message::Text("READY".into()), &mut buf).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
        assert!(buf.is_empty());
    }

    #[test]
    fn bare_target_type_is_rejected() {
        let mut buf = BytesMut::new();
        assert!(encode(&Message::Type(MessageType::Target), &mut buf).is_err());
    }

    #[test]
    fn frame_ready_checks_length() {
        assert!(!frame_ready(&[]));
        assert!(frame_ready(&[2]));
        assert!(!frame_ready(&[1; 24]));
        assert!(frame_ready(&[1; 25]));
    }
}
