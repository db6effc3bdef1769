//! Frame header codec and message type tags
//!
//! Every frame on the sway socket starts with a fixed 14-byte header:
//!
//! ```text
//! +----------------+-----------------+-----------------+
//! | magic "i3-ipc" | payload length  | message type    |
//! | 6 bytes        | u32 LE          | u32 LE          |
//! +----------------+-----------------+-----------------+
//! ```
//!
//! followed by exactly `payload length` bytes of UTF-8 JSON. Replies echo
//! the request's type tag; events carry a tag with the high bit set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FramingError;

/// Magic bytes that open every frame header
pub const MAGIC: [u8; 6] = *b"i3-ipc";

/// Size of the fixed frame header in bytes
pub const HEADER_SIZE: usize = 14;

/// High bit marking a message type tag as an event
pub const EVENT_MASK: u32 = 0x8000_0000;

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Number of payload bytes following the header
    pub length: u32,
    /// Raw message type tag
    pub message_type: u32,
}

impl Header {
    pub fn new(length: u32, message_type: u32) -> Self {
        Self {
            length,
            message_type,
        }
    }

    /// Encode the header to its little-endian wire layout
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..6].copy_from_slice(&MAGIC);
        buf[6..10].copy_from_slice(&self.length.to_le_bytes());
        buf[10..14].copy_from_slice(&self.message_type.to_le_bytes());
        buf
    }

    /// Decode a header from the start of `buf`
    ///
    /// Fails with [`FramingError::ShortHeader`] if fewer than
    /// [`HEADER_SIZE`] bytes are given and [`FramingError::BadMagic`] if the
    /// magic does not match. Bytes beyond the header are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, FramingError> {
        if buf.len() < HEADER_SIZE {
            return Err(FramingError::ShortHeader {
                got: buf.len(),
                expected: HEADER_SIZE,
            });
        }

        let mut found = [0u8; 6];
        found.copy_from_slice(&buf[0..6]);
        if found != MAGIC {
            return Err(FramingError::BadMagic { found });
        }

        let length = u32::from_le_bytes([buf[6], buf[7], buf[8], buf[9]]);
        let message_type = u32::from_le_bytes([buf[10], buf[11], buf[12], buf[13]]);

        Ok(Self {
            length,
            message_type,
        })
    }

    /// Whether this header announces an event rather than a reply
    pub fn is_event(&self) -> bool {
        self.message_type & EVENT_MASK != 0
    }
}

/// Encode a header for a payload of `payload_length` bytes
pub fn encode_header(payload_length: u32, message_type: u32) -> [u8; HEADER_SIZE] {
    Header::new(payload_length, message_type).encode()
}

/// Decode a header into `(payload_length, message_type)`
pub fn decode_header(buf: &[u8]) -> Result<(u32, u32), FramingError> {
    let header = Header::decode(buf)?;
    Ok((header.length, header.message_type))
}

/// Request kinds; replies echo the same tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageType {
    RunCommand = 0,
    GetWorkspaces = 1,
    Subscribe = 2,
    GetOutputs = 3,
    GetTree = 4,
    GetMarks = 5,
    GetBarConfig = 6,
    GetVersion = 7,
    GetBindingModes = 8,
    GetConfig = 9,
    SendTick = 10,
    GetInputs = 100,
    GetSeats = 101,
}

impl MessageType {
    pub fn tag(self) -> u32 {
        self as u32
    }
}

impl From<MessageType> for u32 {
    fn from(message_type: MessageType) -> Self {
        message_type.tag()
    }
}

/// Event kinds a subscription can ask for
///
/// Serializes to the names sway expects in the subscribe payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A workspace was created, focused, moved, renamed, emptied or marked urgent
    Workspace,
    /// The binding mode changed
    Mode,
    /// A view was created, focused, moved, closed or otherwise changed
    Window,
    /// A bar config changed
    #[serde(rename = "barconfig_update")]
    BarConfigUpdate,
    /// A configured binding was executed
    Binding,
    /// The IPC is shutting down because sway is exiting
    Shutdown,
    /// A client sent SEND_TICK, or the subscription to ticks just started
    Tick,
    /// A bar's visibility changed due to a modifier
    BarStateUpdate,
    /// Something related to input devices changed
    Input,
}

impl EventType {
    pub const ALL: [EventType; 9] = [
        EventType::Workspace,
        EventType::Mode,
        EventType::Window,
        EventType::BarConfigUpdate,
        EventType::Binding,
        EventType::Shutdown,
        EventType::Tick,
        EventType::BarStateUpdate,
        EventType::Input,
    ];

    /// Wire tag of frames carrying this event
    pub fn tag(self) -> u32 {
        let n = match self {
            EventType::Workspace => 0x00,
            EventType::Mode => 0x02,
            EventType::Window => 0x03,
            EventType::BarConfigUpdate => 0x04,
            EventType::Binding => 0x05,
            EventType::Shutdown => 0x06,
            EventType::Tick => 0x07,
            EventType::BarStateUpdate => 0x14,
            EventType::Input => 0x15,
        };
        EVENT_MASK | n
    }

    /// Map a frame tag back to a known event kind
    ///
    /// Returns `None` for request tags and for event tags added by newer
    /// sway versions.
    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|event_type| event_type.tag() == tag)
    }

    /// Name used in the subscribe payload
    pub fn name(self) -> &'static str {
        match self {
            EventType::Workspace => "workspace",
            EventType::Mode => "mode",
            EventType::Window => "window",
            EventType::BarConfigUpdate => "barconfig_update",
            EventType::Binding => "binding",
            EventType::Shutdown => "shutdown",
            EventType::Tick => "tick",
            EventType::BarStateUpdate => "bar_state_update",
            EventType::Input => "input",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            // bar_status_update is the deprecated spelling of bar_state_update
            "bar_status_update" => Ok(EventType::BarStateUpdate),
            name => Self::ALL
                .into_iter()
                .find(|event_type| event_type.name() == name)
                .ok_or_else(|| format!("Unknown event type: {}", s)),
        }
    }
}
