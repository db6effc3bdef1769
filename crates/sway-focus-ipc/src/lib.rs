//! Sway/i3 IPC client
//!
//! This crate talks to a running sway (or i3) compositor over its IPC Unix
//! socket. It enables callers to:
//! - Run sway commands and query workspaces, outputs, the layout tree and more
//! - Find the focused node in the layout tree
//! - Subscribe to compositor events
//!
//! ## Architecture
//!
//! - `Client`: request/reply over one owned connection
//! - `EventStream`: a dedicated, subscribed connection that only carries events
//! - `Context`: cancellation and deadline for every blocking step
//! - `Tree`: arena form of the GET_TREE reply, with focus search
//!
//! ## Protocol
//!
//! Sway exposes a Unix socket at `$SWAYSOCK`. Every message is a 14-byte
//! header (`i3-ipc`, payload length and type as little-endian u32) followed
//! by a JSON payload of exactly that length.

mod client;
mod codec;
mod connection;
mod context;
mod error;
mod events;
mod tree;
mod types;

pub use client::{get_socket_path, Client, SWAYSOCK_ENV};
pub use codec::{
    decode_header, encode_header, EventType, Header, MessageType, EVENT_MASK, HEADER_SIZE, MAGIC,
};
pub use connection::{Connection, Message};
pub use context::Context;
pub use error::{CommandFailure, FramingError, IpcError};
pub use events::{
    subscribe, subscribe_env, Event, EventDispatcher, EventHandler, EventReaderHandle,
    EventReceiver, EventStream, DEFAULT_CHANNEL_BUFFER,
};
pub use tree::{focused_node, NodeId, Tree, TreeNode};
pub use types::*;

pub use tokio_util::sync::CancellationToken;
