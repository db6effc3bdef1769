//! Error types for sway IPC operations

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::RunCommandReply;

/// Errors that can occur when communicating with sway
#[derive(Debug, Error)]
pub enum IpcError {
    /// The SWAYSOCK environment variable is not set (or is blank)
    #[error("SWAYSOCK environment variable not set - is sway running?")]
    SocketNotSet,

    /// The socket path does not exist
    #[error("Sway socket not found at {path}")]
    SocketNotFound { path: PathBuf },

    /// Failed to connect to the sway socket
    #[error("Failed to connect to sway socket at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An operation was attempted on a client with no live connection
    #[error("Not connected to sway")]
    NotConnected,

    /// A frame header or payload did not follow the wire format
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    /// Failed to send a frame to sway
    #[error("Failed to send frame to sway: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Failed to receive a frame from sway
    #[error("Failed to receive frame from sway: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The peer closed the connection on a frame boundary
    #[error("Connection to sway closed unexpectedly")]
    ConnectionClosed,

    /// The caller's context was cancelled before the I/O completed
    #[error("Operation canceled")]
    Canceled,

    /// The caller's deadline passed before the I/O completed
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// Failed to serialize a request payload to JSON
    #[error("Failed to serialize request: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    /// The reply or event payload did not match the expected shape
    #[error("Failed to decode payload: {0}")]
    DecodeFailed(#[source] serde_json::Error),

    /// The payload does not fit the header's u32 length field; nothing was sent
    #[error("Payload of {length} bytes exceeds the u32 frame length limit")]
    PayloadTooLarge { length: usize },

    /// SUBSCRIBE was sent through a request/reply client
    #[error("Subscribing is only possible through an EventStream")]
    SubscribeOnRequestConnection,

    /// Sway answered the subscribe handshake with `success: false`
    #[error("Subscription rejected by sway")]
    SubscriptionRejected,

    /// One or more statements of a RUN_COMMAND batch failed
    #[error(transparent)]
    CommandFailed(#[from] CommandFailure),
}

impl IpcError {
    /// Whether the error leaves the connection in an unknown state
    ///
    /// After a cancellation the abandoned read or write may have consumed
    /// part of a frame, so the connection can no longer be trusted to be
    /// frame-aligned. Transport and framing errors are fatal the same way.
    pub fn poisons_connection(&self) -> bool {
        matches!(
            self,
            IpcError::Canceled
                | IpcError::DeadlineExceeded
                | IpcError::Framing(_)
                | IpcError::SendFailed(_)
                | IpcError::ReceiveFailed(_)
                | IpcError::ConnectionClosed
        )
    }
}

/// Violations of the 14-byte header / bounded payload wire format
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// The header did not begin with the `i3-ipc` magic
    #[error("bad magic bytes {found:?}")]
    BadMagic { found: [u8; 6] },

    /// Fewer than 14 header bytes were available
    #[error("short header: got {got} of {expected} bytes")]
    ShortHeader { got: usize, expected: usize },

    /// The stream ended before the declared payload length was read
    #[error("short payload: got {got} of {expected} bytes")]
    ShortPayload { got: usize, expected: usize },
}

/// Aggregated failure of a RUN_COMMAND batch
///
/// The full reply list is kept so callers can still inspect which
/// statements succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct CommandFailure {
    /// Every per-statement result, in reply order
    pub replies: Vec<RunCommandReply>,
    /// One message per failed statement, in reply order
    pub errors: Vec<String>,
}

impl CommandFailure {
    /// Build the aggregate from a reply list, or `None` if every statement succeeded
    pub fn from_replies(command: &str, replies: Vec<RunCommandReply>) -> Option<Self> {
        let errors: Vec<String> = replies
            .iter()
            .filter(|reply| !reply.success)
            .map(|reply| {
                format!(
                    "command {:?} unsuccessful: {}",
                    command,
                    reply.error.as_deref().unwrap_or("")
                )
            })
            .collect();

        if errors.is_empty() {
            None
        } else {
            Some(Self { replies, errors })
        }
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(success: bool, error: Option<&str>) -> RunCommandReply {
        RunCommandReply {
            success,
            error: error.map(String::from),
            parse_error: false,
        }
    }

    #[test]
    fn test_all_successful_replies_produce_no_failure() {
        let replies = vec![reply(true, None), reply(true, None)];
        assert!(CommandFailure::from_replies("nop", replies).is_none());
    }

    #[test]
    fn test_failures_are_aggregated_in_reply_order() {
        let replies = vec![
            reply(false, Some("first broke")),
            reply(true, None),
            reply(false, Some("third broke")),
        ];

        let failure = CommandFailure::from_replies("a; b; c", replies).unwrap();

        assert_eq!(failure.replies.len(), 3);
        assert_eq!(failure.errors.len(), 2);

        let message = failure.to_string();
        let first = message.find("first broke").unwrap();
        let third = message.find("third broke").unwrap();
        assert!(first < third, "order must follow the reply: {}", message);
        assert!(message.contains("command \"a; b; c\" unsuccessful"));
    }

    #[test]
    fn test_poisoning_errors() {
        assert!(IpcError::Canceled.poisons_connection());
        assert!(IpcError::DeadlineExceeded.poisons_connection());
        assert!(IpcError::ConnectionClosed.poisons_connection());
        assert!(IpcError::Framing(FramingError::BadMagic { found: [0; 6] }).poisons_connection());
        assert!(!IpcError::NotConnected.poisons_connection());
        assert!(!IpcError::SubscriptionRejected.poisons_connection());
        assert!(!IpcError::PayloadTooLarge { length: usize::MAX }.poisons_connection());
        assert!(!IpcError::SubscribeOnRequestConnection.poisons_connection());
    }

    #[test]
    fn test_socket_not_set_message_mentions_variable() {
        assert!(IpcError::SocketNotSet.to_string().contains("SWAYSOCK"));
    }
}
