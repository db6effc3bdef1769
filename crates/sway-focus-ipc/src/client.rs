//! Sway IPC request/reply client
//!
//! This module provides the `Client` for querying and controlling sway.
//! The client handles socket discovery, connection ownership, and the
//! strictly one-outstanding-request round trip.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tracing::{debug, warn};

use crate::codec::MessageType;
use crate::connection::{Connection, Message};
use crate::context::Context;
use crate::error::{CommandFailure, IpcError};
use crate::tree::Tree;
use crate::types::{
    BarConfig, Config, Input, Node, Output, RunCommandReply, Seat, TickReply, Version, Workspace,
};

/// Environment variable name for the sway socket path
pub const SWAYSOCK_ENV: &str = "SWAYSOCK";

/// Discover the sway IPC socket path from the environment
///
/// Reads `$SWAYSOCK`, trims surrounding whitespace and validates that the
/// path exists.
///
/// # Errors
///
/// Returns `IpcError::SocketNotSet` if `$SWAYSOCK` is unset or blank.
/// Returns `IpcError::SocketNotFound` if the path doesn't exist.
pub fn get_socket_path() -> Result<PathBuf, IpcError> {
    let raw = std::env::var(SWAYSOCK_ENV).map_err(|_| IpcError::SocketNotSet)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IpcError::SocketNotSet);
    }

    let socket_path = PathBuf::from(trimmed);
    if !socket_path.exists() {
        return Err(IpcError::SocketNotFound { path: socket_path });
    }

    Ok(socket_path)
}

/// Cancellably dial the Unix socket at `path`
pub(crate) async fn dial(ctx: &Context, path: &Path) -> Result<UnixStream, IpcError> {
    ctx.run(async {
        UnixStream::connect(path)
            .await
            .map_err(|e| IpcError::ConnectionFailed {
                path: path.to_path_buf(),
                source: e,
            })
    })
    .await
}

/// Client for communicating with sway via IPC
///
/// Owns one connection. Calls take `&mut self`, so two round trips can never
/// interleave on the same socket. After a cancellation, a timeout or any
/// transport/framing error the connection is dropped and later calls fail
/// with `IpcError::NotConnected`; open a new client to continue.
///
/// # Example
///
/// ```ignore
/// let ctx = Context::background().with_timeout(Duration::from_secs(1));
/// let mut client = Client::connect_env(&ctx).await?;
/// let tree = client.get_tree(&ctx).await?;
/// if let Some(node) = tree.focused_node() {
///     println!("Focused: {:?}", node.app_id);
/// }
/// ```
#[derive(Debug)]
pub struct Client<S = UnixStream> {
    conn: Option<Connection<S>>,
    socket_path: Option<PathBuf>,
}

impl Client<UnixStream> {
    /// Connect to the sway socket at `path`
    ///
    /// # Errors
    ///
    /// Returns `IpcError::ConnectionFailed` if the connection fails, or the
    /// context's error if it fires first.
    pub async fn connect(ctx: &Context, path: impl AsRef<Path>) -> Result<Self, IpcError> {
        let path = path.as_ref();
        let stream = dial(ctx, path).await?;
        debug!("Connected to sway at {}", path.display());

        Ok(Self {
            conn: Some(Connection::new(stream)),
            socket_path: Some(path.to_path_buf()),
        })
    }

    /// Connect to the socket named by `$SWAYSOCK`
    pub async fn connect_env(ctx: &Context) -> Result<Self, IpcError> {
        let path = get_socket_path()?;
        Self::connect(ctx, path).await
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-open byte stream
    pub fn from_stream(stream: S) -> Self {
        Self {
            conn: Some(Connection::new(stream)),
            socket_path: None,
        }
    }

    /// The socket path this client dialed, if it dialed one
    pub fn socket_path(&self) -> Option<&Path> {
        self.socket_path.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Close the connection; calling this again is a no-op
    pub async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.shutdown().await;
            debug!("Closed sway connection");
        }
    }

    /// Perform one round trip: write a request frame, read one reply frame
    ///
    /// # Errors
    ///
    /// Returns `IpcError::NotConnected` if there is no live connection.
    /// Returns `IpcError::SubscribeOnRequestConnection` for
    /// `MessageType::Subscribe`; use [`crate::EventStream`] instead.
    /// Returns transport, framing, cancellation and deadline errors as-is,
    /// after discarding the connection.
    pub async fn call(
        &mut self,
        ctx: &Context,
        message_type: MessageType,
        payload: &[u8],
    ) -> Result<Message, IpcError> {
        // A subscribed socket only carries events from then on
        if message_type == MessageType::Subscribe {
            return Err(IpcError::SubscribeOnRequestConnection);
        }

        let conn = self.conn.as_mut().ok_or(IpcError::NotConnected)?;

        let result = async {
            conn.write_frame(ctx, message_type.tag(), payload).await?;
            conn.read_frame(ctx).await
        }
        .await;

        match result {
            Ok(message) => {
                if message.message_type != message_type.tag() {
                    warn!(
                        expected = message_type.tag(),
                        got = message.message_type,
                        "Reply type does not match request type"
                    );
                }
                Ok(message)
            }
            Err(e) => {
                if e.poisons_connection() {
                    debug!("Discarding sway connection after error: {}", e);
                    self.conn = None;
                }
                Err(e)
            }
        }
    }

    async fn call_decode<T: DeserializeOwned>(
        &mut self,
        ctx: &Context,
        message_type: MessageType,
        payload: &[u8],
    ) -> Result<T, IpcError> {
        self.call(ctx, message_type, payload).await?.decode()
    }

    /// Run `command` as sway commands
    ///
    /// Returns one reply per statement. If any statement failed, the result
    /// is `IpcError::CommandFailed` carrying the full reply list and every
    /// failure message in statement order.
    pub async fn run_command(
        &mut self,
        ctx: &Context,
        command: &str,
    ) -> Result<Vec<RunCommandReply>, IpcError> {
        let replies: Vec<RunCommandReply> = self
            .call_decode(ctx, MessageType::RunCommand, command.as_bytes())
            .await?;

        match CommandFailure::from_replies(command, replies.clone()) {
            Some(failure) => Err(failure.into()),
            None => Ok(replies),
        }
    }

    /// Get the list of current workspaces
    pub async fn get_workspaces(&mut self, ctx: &Context) -> Result<Vec<Workspace>, IpcError> {
        self.call_decode(ctx, MessageType::GetWorkspaces, &[]).await
    }

    /// Get the list of current outputs
    pub async fn get_outputs(&mut self, ctx: &Context) -> Result<Vec<Output>, IpcError> {
        self.call_decode(ctx, MessageType::GetOutputs, &[]).await
    }

    /// Get the layout tree as an arena
    pub async fn get_tree(&mut self, ctx: &Context) -> Result<Tree, IpcError> {
        let root: Node = self.call_decode(ctx, MessageType::GetTree, &[]).await?;
        Ok(Tree::from_root(root))
    }

    /// Get the names of all marks currently set
    pub async fn get_marks(&mut self, ctx: &Context) -> Result<Vec<String>, IpcError> {
        self.call_decode(ctx, MessageType::GetMarks, &[]).await
    }

    /// Get the IDs of all configured bars
    pub async fn get_bar_ids(&mut self, ctx: &Context) -> Result<Vec<String>, IpcError> {
        self.call_decode(ctx, MessageType::GetBarConfig, &[]).await
    }

    /// Get the config of the bar with the given ID
    pub async fn get_bar_config(&mut self, ctx: &Context, id: &str) -> Result<BarConfig, IpcError> {
        self.call_decode(ctx, MessageType::GetBarConfig, id.as_bytes())
            .await
    }

    /// Get the version of the sway process owning the socket
    pub async fn get_version(&mut self, ctx: &Context) -> Result<Version, IpcError> {
        self.call_decode(ctx, MessageType::GetVersion, &[]).await
    }

    /// Get the names of all binding modes
    pub async fn get_binding_modes(&mut self, ctx: &Context) -> Result<Vec<String>, IpcError> {
        self.call_decode(ctx, MessageType::GetBindingModes, &[])
            .await
    }

    /// Get the config text that was last loaded
    pub async fn get_config(&mut self, ctx: &Context) -> Result<Config, IpcError> {
        self.call_decode(ctx, MessageType::GetConfig, &[]).await
    }

    /// Send a tick event with `payload` to every tick subscriber
    pub async fn send_tick(&mut self, ctx: &Context, payload: &str) -> Result<TickReply, IpcError> {
        self.call_decode(ctx, MessageType::SendTick, payload.as_bytes())
            .await
    }

    /// Get the list of input devices
    pub async fn get_inputs(&mut self, ctx: &Context) -> Result<Vec<Input>, IpcError> {
        self.call_decode(ctx, MessageType::GetInputs, &[]).await
    }

    /// Get the list of seats
    pub async fn get_seats(&mut self, ctx: &Context) -> Result<Vec<Seat>, IpcError> {
        self.call_decode(ctx, MessageType::GetSeats, &[]).await
    }
}
