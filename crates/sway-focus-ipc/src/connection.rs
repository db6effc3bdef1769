//! One open byte-stream channel to sway
//!
//! A [`Connection`] moves whole frames: one header plus one payload per call,
//! with no buffering across frames. Each step is wrapped in the caller's
//! [`Context`] so it can be abandoned on cancellation.

use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::codec::{EventType, Header, HEADER_SIZE};
use crate::context::Context;
use crate::error::{FramingError, IpcError};

/// A received frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Raw type tag from the header
    pub message_type: u32,
    /// Exactly the declared number of payload bytes
    pub payload: Vec<u8>,
}

impl Message {
    /// Decode the JSON payload into `T`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, IpcError> {
        serde_json::from_slice(&self.payload).map_err(IpcError::DecodeFailed)
    }

    /// The event kind this frame carries, if it is a known event
    pub fn event_type(&self) -> Option<EventType> {
        EventType::from_tag(self.message_type)
    }
}

/// Frame-level reader/writer over an ordered byte stream
///
/// Single owner: two operations must never interleave on one connection.
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Write one frame: the header, then the payload
    ///
    /// The two writes run as one cancellable step.
    pub async fn write_frame(
        &mut self,
        ctx: &Context,
        message_type: u32,
        payload: &[u8],
    ) -> Result<(), IpcError> {
        let length = frame_length(payload.len())?;
        let header = Header::new(length, message_type).encode();
        let stream = &mut self.stream;

        ctx.run(async move {
            stream.write_all(&header).await.map_err(IpcError::SendFailed)?;
            stream.write_all(payload).await.map_err(IpcError::SendFailed)?;
            stream.flush().await.map_err(IpcError::SendFailed)
        })
        .await?;

        debug!(message_type, length, "Sent frame");
        Ok(())
    }

    /// Read one frame: the header, then exactly `length` payload bytes
    ///
    /// EOF before the first header byte is [`IpcError::ConnectionClosed`];
    /// EOF anywhere later is a framing error.
    pub async fn read_frame(&mut self, ctx: &Context) -> Result<Message, IpcError> {
        let header = ctx.run(read_header(&mut self.stream)).await?;
        let payload = ctx
            .run(read_payload(&mut self.stream, header.length))
            .await?;

        debug!(
            message_type = header.message_type,
            length = header.length,
            "Received frame"
        );

        Ok(Message {
            message_type: header.message_type,
            payload,
        })
    }

    /// Shut down the write side; errors are ignored since the stream is going away
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("Ignoring error while closing sway connection: {}", e);
        }
    }
}

/// Payload length as it goes in the header; checked before any byte is written
fn frame_length(len: usize) -> Result<u32, IpcError> {
    u32::try_from(len).map_err(|_| IpcError::PayloadTooLarge { length: len })
}

async fn read_header<S>(stream: &mut S) -> Result<Header, IpcError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; HEADER_SIZE];
    let mut filled = 0;

    while filled < HEADER_SIZE {
        let n = stream
            .read(&mut buf[filled..])
            .await
            .map_err(IpcError::ReceiveFailed)?;
        if n == 0 {
            if filled == 0 {
                return Err(IpcError::ConnectionClosed);
            }
            return Err(FramingError::ShortHeader {
                got: filled,
                expected: HEADER_SIZE,
            }
            .into());
        }
        filled += n;
    }

    Ok(Header::decode(&buf)?)
}

async fn read_payload<S>(stream: &mut S, length: u32) -> Result<Vec<u8>, IpcError>
where
    S: AsyncRead + Unpin,
{
    let expected = length as usize;
    let mut payload = Vec::with_capacity(expected.min(1 << 20));

    // Bounded to the declared length so the next header starts where it should
    stream
        .take(u64::from(length))
        .read_to_end(&mut payload)
        .await
        .map_err(IpcError::ReceiveFailed)?;

    if payload.len() != expected {
        return Err(FramingError::ShortPayload {
            got: payload.len(),
            expected,
        }
        .into());
    }

    Ok(payload)
}
