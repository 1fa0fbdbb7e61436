//! Protocol message model shared by both wire variants.

use std::fmt;

use serde::Serialize;

/// A 3D mission target in the mission's local ENU frame.
///
/// The controller treats coordinates as opaque payload; they are only
/// parsed, logged, and forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Target {
    /// East offset.
    pub x: f64,
    /// North offset.
    pub y: f64,
    /// Up offset.
    pub z: f64,
}

impl Target {
    /// Creates a target from its three components.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Parses `x,y,z` (whitespace around components is ignored).
    ///
    /// Returns `None` unless there are exactly three float components.
    #[must_use]
    pub fn parse_csv(input: &str) -> Option<Self> {
        let mut parts = input.split(',').map(str::trim);
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        let z = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { x, y, z })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// Single-byte message type codes of the binary protocol.
///
/// Any byte outside the known set decodes to [`MessageType::Unknown`]
/// carrying the raw value, so an unrecognised tag is logged instead of
/// treated as a protocol failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Target dispatch (followed by 24 bytes of coordinates).
    Target,
    /// Acknowledgement.
    Ack,
    /// Ready / arrived.
    Ready,
    /// Return to launch.
    Rtl,
    /// Land.
    Land,
    /// Any other tag byte.
    Unknown(u8),
}

impl MessageType {
    /// Maps a wire tag to a message type.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Self {
        match tag {
            1 => Self::Target,
            2 => Self::Ack,
            3 => Self::Ready,
            4 => Self::Rtl,
            5 => Self::Land,
            other => Self::Unknown(other),
        }
    }

    /// Returns the wire tag for this message type.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Target => 1,
            Self::Ack => 2,
            Self::Ready => 3,
            Self::Rtl => 4,
            Self::Land => 5,
            Self::Unknown(tag) => tag,
        }
    }

    /// Returns the display name used in logs and metric labels.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Target => "TARGET",
            Self::Ack => "ACK",
            Self::Ready => "READY",
            Self::Rtl => "RTL",
            Self::Land => "LAND",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.tag())
    }
}

/// A protocol message exchanged with a participant.
///
/// Which variants a mission actually uses depends on its
/// [`CodecMode`](super::CodecMode): the binary variant carries
/// [`Message::Target`] and [`Message::Type`], the text variant carries
/// [`Message::Target`], [`Message::Text`] and [`Message::Finished`].
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Target coordinates for one participant.
    Target(Target),
    /// A bare type code.
    Type(MessageType),
    /// An opaque text token (one line, no newline).
    Text(String),
    /// End-of-mission notice.
    Finished,
}

impl Message {
    /// Returns a bounded, closed-set label for metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Target(_) => "TARGET",
            Self::Type(kind) => kind.name(),
            Self::Text(_) => "TEXT",
            Self::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target(target) => write!(f, "TARGET {target}"),
            Self::Type(kind) => write!(f, "{kind}"),
            Self::Text(token) => write!(f, "{}", sanitize_for_log(token, 120)),
            Self::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Truncates and strips control characters from untrusted input before logging.
fn sanitize_for_log(input: &str, max_len: usize) -> String {
    input
        .chars()
        .take(max_len)
        .map(|c| {
            if c.is_control() && c != '\t' {
                '\u{FFFD}'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_map_both_ways() {
        for tag in 0..=u8::MAX {
            assert_eq!(MessageType::from_tag(tag).tag(), tag);
        }
    }

    #[test]
    fn unknown_tag_keeps_raw_byte() {
        assert_eq!(MessageType::from_tag(42), MessageType::Unknown(42));
        assert_eq!(MessageType::from_tag(0).name(), "UNKNOWN");
        assert_eq!(MessageType::from_tag(42).to_string(), "UNKNOWN (42)");
    }

    #[test]
    fn target_csv_parsing() {
        assert_eq!(
            Target::parse_csv("1.5, -2, 3e2"),
            Some(Target::new(1.5, -2.0, 300.0))
        );
        assert_eq!(Target::parse_csv("1,2"), None);
        assert_eq!(Target::parse_csv("1,2,3,4"), None);
        assert_eq!(Target::parse_csv("a,b,c"), None);
    }

    #[test]
    fn target_display_is_csv() {
        assert_eq!(Target::new(1.0, 2.5, -3.0).to_string(), "1,2.5,-3");
    }

    #[test]
    fn text_display_strips_control_characters() {
        let msg = Message::Text("READY\u{1b}[2J".to_string());
        assert!(!msg.to_string().contains('\u{1b}'));
    }

    #[test]
    fn labels_are_closed_set() {
        assert_eq!(Message::Text("anything".into()).label(), "TEXT");
        assert_eq!(Message::Type(MessageType::Unknown(9)).label(), "UNKNOWN");
        assert_eq!(Message::Finished.label(), "FINISHED");
    }
}
