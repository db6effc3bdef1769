//! Sway IPC event subscription
//!
//! This module provides the `EventStream` for subscribing to sway events.
//! Unlike `Client`, which uses request/reply, an event stream is a dedicated
//! connection that only receives events once the handshake is done.
//!
//! ## Protocol
//!
//! 1. Connect to the sway socket (separate connection from any `Client`)
//! 2. Send SUBSCRIBE with a JSON array of event names
//! 3. Receive `{"success": true}`
//! 4. Continuously receive event frames tagged `0x80000000 | n`
//!
//! Event tags this crate does not know are ignored, and an event whose
//! payload fails to decode is logged and skipped. Only transport, framing,
//! cancellation and deadline errors end the stream.
//!
//! ## Architecture
//!
//! ```text
//! +---------------+      +---------+      +----------------+
//! | EventStream   | ---> | mpsc    | ---> | ReceiverStream |
//! | (reader task) |      | channel |      | consumer       |
//! +---------------+      +---------+      +----------------+
//! ```
//!
//! `subscribe` drives an `EventHandler` directly on the caller's task;
//! `EventDispatcher` runs the same loop on a spawned task and forwards events
//! through a bounded channel.

use std::convert::Infallible;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::client::{dial, get_socket_path};
use crate::codec::{EventType, MessageType};
use crate::connection::{Connection, Message};
use crate::context::Context;
use crate::error::IpcError;
use crate::types::{
    BarConfigUpdateEvent, BarStateUpdateEvent, BindingEvent, InputEvent, ModeEvent,
    ShutdownEvent, TickEvent, WindowEvent, WorkspaceEvent,
};

/// Default buffer size of the dispatcher channel
pub const DEFAULT_CHANNEL_BUFFER: usize = 64;

/// A decoded event, one variant per known event tag
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum Event {
    Workspace(WorkspaceEvent),
    Mode(ModeEvent),
    Window(Box<WindowEvent>),
    #[serde(rename = "barconfig_update")]
    BarConfigUpdate(Box<BarConfigUpdateEvent>),
    Binding(BindingEvent),
    Shutdown(ShutdownEvent),
    Tick(TickEvent),
    BarStateUpdate(BarStateUpdateEvent),
    Input(Box<InputEvent>),
}

impl Event {
    /// Decode an event frame
    ///
    /// Returns `Ok(None)` for tags that are not a known event kind.
    ///
    /// # Errors
    ///
    /// Returns `IpcError::DecodeFailed` if the payload does not match the
    /// record for its tag.
    pub fn from_message(message: &Message) -> Result<Option<Self>, IpcError> {
        let Some(event_type) = message.event_type() else {
            return Ok(None);
        };

        let event = match event_type {
            EventType::Workspace => Event::Workspace(message.decode()?),
            EventType::Mode => Event::Mode(message.decode()?),
            EventType::Window => Event::Window(Box::new(message.decode()?)),
            EventType::BarConfigUpdate => Event::BarConfigUpdate(Box::new(message.decode()?)),
            EventType::Binding => Event::Binding(message.decode()?),
            EventType::Shutdown => Event::Shutdown(message.decode()?),
            EventType::Tick => Event::Tick(message.decode()?),
            EventType::BarStateUpdate => Event::BarStateUpdate(message.decode()?),
            EventType::Input => Event::Input(Box::new(message.decode()?)),
        };

        Ok(Some(event))
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Event::Workspace(_) => EventType::Workspace,
            Event::Mode(_) => EventType::Mode,
            Event::Window(_) => EventType::Window,
            Event::BarConfigUpdate(_) => EventType::BarConfigUpdate,
            Event::Binding(_) => EventType::Binding,
            Event::Shutdown(_) => EventType::Shutdown,
            Event::Tick(_) => EventType::Tick,
            Event::BarStateUpdate(_) => EventType::BarStateUpdate,
            Event::Input(_) => EventType::Input,
        }
    }

    /// Hand the event to the matching handler method
    pub fn dispatch<H: EventHandler + ?Sized>(&self, handler: &mut H) {
        match self {
            Event::Workspace(e) => handler.on_workspace(e),
            Event::Mode(e) => handler.on_mode(e),
            Event::Window(e) => handler.on_window(e),
            Event::BarConfigUpdate(e) => handler.on_barconfig_update(e),
            Event::Binding(e) => handler.on_binding(e),
            Event::Shutdown(e) => handler.on_shutdown(e),
            Event::Tick(e) => handler.on_tick(e),
            Event::BarStateUpdate(e) => handler.on_bar_state_update(e),
            Event::Input(e) => handler.on_input(e),
        }
    }
}

/// Per-kind event callbacks
///
/// Every method defaults to doing nothing, so implementors only override the
/// kinds they subscribed to.
#[allow(unused_variables)]
pub trait EventHandler {
    fn on_workspace(&mut self, event: &WorkspaceEvent) {}
    fn on_mode(&mut self, event: &ModeEvent) {}
    fn on_window(&mut self, event: &WindowEvent) {}
    fn on_barconfig_update(&mut self, event: &BarConfigUpdateEvent) {}
    fn on_binding(&mut self, event: &BindingEvent) {}
    fn on_shutdown(&mut self, event: &ShutdownEvent) {}
    fn on_tick(&mut self, event: &TickEvent) {}
    fn on_bar_state_update(&mut self, event: &BarStateUpdateEvent) {}
    fn on_input(&mut self, event: &InputEvent) {}
}

#[derive(Debug, Deserialize)]
struct SubscribeReply {
    #[serde(default)]
    success: bool,
}

/// Subscribed event connection
///
/// # Example
///
/// ```ignore
/// let ctx = Context::background();
/// let mut stream = EventStream::connect(&ctx, path, &[EventType::Window]).await?;
/// loop {
///     let event = stream.next_event(&ctx).await?;
///     println!("{:?}", event);
/// }
/// ```
#[derive(Debug)]
pub struct EventStream<S = UnixStream> {
    conn: Connection<S>,
}

impl EventStream<UnixStream> {
    /// Open a new connection to `path` and subscribe to `events`
    ///
    /// # Errors
    ///
    /// Returns `IpcError::ConnectionFailed` if the connection fails.
    /// Returns `IpcError::SubscriptionRejected` if sway refuses the list.
    pub async fn connect(
        ctx: &Context,
        path: impl AsRef<Path>,
        events: &[EventType],
    ) -> Result<Self, IpcError> {
        let path = path.as_ref();
        let stream = dial(ctx, path).await?;
        debug!("Opened event connection to {}", path.display());
        Self::handshake(ctx, stream, events).await
    }
}

impl<S> EventStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Subscribe to `events` on an already-open stream
    ///
    /// After this succeeds the stream only carries events.
    pub async fn handshake(ctx: &Context, stream: S, events: &[EventType]) -> Result<Self, IpcError> {
        let mut conn = Connection::new(stream);
        let payload = serde_json::to_vec(events).map_err(IpcError::SerializeFailed)?;

        conn.write_frame(ctx, MessageType::Subscribe.tag(), &payload)
            .await?;
        let reply: SubscribeReply = conn.read_frame(ctx).await?.decode()?;

        if !reply.success {
            warn!("Sway rejected subscription to {:?}", events);
            return Err(IpcError::SubscriptionRejected);
        }

        debug!("Subscribed to {:?}", events);
        Ok(Self { conn })
    }

    /// Read until the next decodable event of a known kind
    ///
    /// # Errors
    ///
    /// Returns the first transport, framing, cancellation or deadline error.
    /// Undecodable events are not errors here.
    pub async fn next_event(&mut self, ctx: &Context) -> Result<Event, IpcError> {
        loop {
            let message = self.conn.read_frame(ctx).await?;

            match Event::from_message(&message) {
                Ok(Some(event)) => {
                    debug!("Received {} event", event.event_type());
                    return Ok(event);
                }
                Ok(None) => {
                    debug!(
                        message_type = message.message_type,
                        "Ignoring frame with unknown event tag"
                    );
                }
                Err(e) => {
                    warn!(
                        message_type = message.message_type,
                        "Skipping undecodable event: {}", e
                    );
                }
            }
        }
    }

    /// Deliver events to `handler` until the stream fails
    pub async fn run<H>(&mut self, ctx: &Context, handler: &mut H) -> Result<Infallible, IpcError>
    where
        H: EventHandler + ?Sized,
    {
        loop {
            let event = self.next_event(ctx).await?;
            event.dispatch(handler);
        }
    }
}

/// Subscribe to `events` on a new connection to `path` and dispatch to
/// `handler` forever
///
/// The only way out is an error: the connection closing, a framing error,
/// cancellation or the deadline.
pub async fn subscribe<H>(
    ctx: &Context,
    path: impl AsRef<Path>,
    handler: &mut H,
    events: &[EventType],
) -> Result<Infallible, IpcError>
where
    H: EventHandler + ?Sized,
{
    let mut stream = EventStream::connect(ctx, path, events).await?;
    stream.run(ctx, handler).await
}

/// [`subscribe`] on the socket named by `$SWAYSOCK`
pub async fn subscribe_env<H>(
    ctx: &Context,
    handler: &mut H,
    events: &[EventType],
) -> Result<Infallible, IpcError>
where
    H: EventHandler + ?Sized,
{
    let path = get_socket_path()?;
    subscribe(ctx, path, handler, events).await
}

/// Receiver for events from the dispatcher
pub type EventReceiver = mpsc::Receiver<Event>;

/// Handle to a spawned event reader task
///
/// The task completes with `Ok(())` once the receiver is dropped, or with
/// the error that ended the stream.
pub type EventReaderHandle = tokio::task::JoinHandle<Result<(), IpcError>>;

/// Event dispatcher that decouples event reading from event handling
///
/// # Example
///
/// ```ignore
/// let (dispatcher, events) = EventDispatcher::with_stream(DEFAULT_CHANNEL_BUFFER);
/// let handle = dispatcher.spawn_reader(&ctx, path, &[EventType::Window]).await?;
/// tokio::pin!(events);
/// while let Some(event) = events.next().await {
///     /* handle event */
/// }
/// handle.await??;
/// ```
#[derive(Debug)]
pub struct EventDispatcher {
    sender: mpsc::Sender<Event>,
}

impl EventDispatcher {
    /// Create a dispatcher and its receiver with the given buffer size
    pub fn new(buffer_size: usize) -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        (Self { sender }, receiver)
    }

    /// Like [`EventDispatcher::new`], with the receiver wrapped as a `Stream`
    pub fn with_stream(buffer_size: usize) -> (Self, ReceiverStream<Event>) {
        let (dispatcher, receiver) = Self::new(buffer_size);
        (dispatcher, ReceiverStream::new(receiver))
    }

    /// Subscribe on a new connection to `path`, then spawn the reader task
    ///
    /// Connection and handshake errors are returned here, before anything
    /// is spawned.
    pub async fn spawn_reader(
        self,
        ctx: &Context,
        path: impl AsRef<Path>,
        events: &[EventType],
    ) -> Result<EventReaderHandle, IpcError> {
        let stream = EventStream::connect(ctx, path, events).await?;
        Ok(self.spawn_with_stream(ctx.clone(), stream))
    }

    /// Spawn the reader task over an already-subscribed stream
    pub fn spawn_with_stream<S>(self, ctx: Context, stream: EventStream<S>) -> EventReaderHandle
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        tokio::spawn(async move { self.run_reader_loop(ctx, stream).await })
    }

    async fn run_reader_loop<S>(self, ctx: Context, mut stream: EventStream<S>) -> Result<(), IpcError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let event = tokio::select! {
                result = stream.next_event(&ctx) => match result {
                    Ok(event) => event,
                    Err(e) => {
                        debug!("Sway event stream ended: {}", e);
                        return Err(e);
                    }
                },
                _ = self.sender.closed() => {
                    debug!("Event receiver dropped, shutting down event reader");
                    return Ok(());
                }
            };

            if self.sender.send(event).await.is_err() {
                debug!("Event receiver dropped, shutting down event reader");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_header, encode_header, HEADER_SIZE};
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    #[derive(Default)]
    struct Recorder {
        seen: Vec<String>,
    }

    impl EventHandler for Recorder {
        fn on_window(&mut self, event: &WindowEvent) {
            self.seen
                .push(format!("window:{}:{}", event.change, event.container.id));
        }

        fn on_tick(&mut self, event: &TickEvent) {
            self.seen.push(format!("tick:{}", event.payload));
        }

        fn on_mode(&mut self, event: &ModeEvent) {
            self.seen.push(format!("mode:{}", event.change));
        }
    }

    async fn write_frame(server: &mut DuplexStream, message_type: u32, payload: &str) {
        server
            .write_all(&encode_header(payload.len() as u32, message_type))
            .await
            .unwrap();
        server.write_all(payload.as_bytes()).await.unwrap();
    }

    /// Read the subscribe request and answer it
    async fn accept_subscription(server: &mut DuplexStream, reply: &str) -> Vec<String> {
        let mut header = [0u8; HEADER_SIZE];
        server.read_exact(&mut header).await.unwrap();
        let (length, message_type) = decode_header(&header).unwrap();
        assert_eq!(message_type, MessageType::Subscribe.tag());

        let mut payload = vec![0u8; length as usize];
        server.read_exact(&mut payload).await.unwrap();
        write_frame(server, message_type, reply).await;

        serde_json::from_slice(&payload).unwrap()
    }

    #[test]
    fn test_event_from_unknown_tag_is_ignored() {
        let message = Message {
            message_type: 0x8000_0042,
            payload: b"{}".to_vec(),
        };
        assert!(Event::from_message(&message).unwrap().is_none());
    }

    #[test]
    fn test_event_from_message_decodes_by_tag() {
        let message = Message {
            message_type: EventType::Shutdown.tag(),
            payload: br#"{"change":"exit"}"#.to_vec(),
        };
        let event = Event::from_message(&message).unwrap().unwrap();
        assert_eq!(
            event,
            Event::Shutdown(ShutdownEvent {
                change: "exit".to_string()
            })
        );
        assert_eq!(event.event_type(), EventType::Shutdown);
    }

    #[test]
    fn test_default_handler_ignores_everything() {
        struct Nothing;
        impl EventHandler for Nothing {}

        let event = Event::Tick(TickEvent::default());
        event.dispatch(&mut Nothing);
    }

    #[test]
    fn test_event_serializes_with_wire_name() {
        let event = Event::BarStateUpdate(BarStateUpdateEvent {
            id: "bar-0".to_string(),
            visible_by_modifier: true,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "bar_state_update");
        assert_eq!(json["payload"]["id"], "bar-0");
    }

    #[tokio::test]
    async fn test_loop_survives_undecodable_event() {
        let (client, mut server) = duplex(8192);

        let fake = tokio::spawn(async move {
            let requested = accept_subscription(&mut server, r#"{"success":true}"#).await;

            let window = EventType::Window.tag();
            write_frame(&mut server, window, r#"{"change":"focus","container":{"id":1}}"#).await;
            write_frame(&mut server, window, r#"{"change":5,"container":[]}"#).await;
            write_frame(&mut server, EventType::Tick.tag(), r#"{"first":false,"payload":"hi"}"#).await;
            write_frame(&mut server, EventType::Mode.tag(), r#"{"change":"resize"}"#).await;
            write_frame(&mut server, window, r#"{"change":"close","container":{"id":5}}"#).await;
            requested
        });

        let ctx = Context::background();
        let mut stream = EventStream::handshake(
            &ctx,
            client,
            &[EventType::Window, EventType::Tick, EventType::Mode],
        )
        .await
        .unwrap();

        let mut recorder = Recorder::default();
        let result = stream.run(&ctx, &mut recorder).await;

        assert!(matches!(result, Err(IpcError::ConnectionClosed)));
        assert_eq!(
            recorder.seen,
            vec!["window:focus:1", "tick:hi", "mode:resize", "window:close:5"]
        );
        assert_eq!(fake.await.unwrap(), vec!["window", "tick", "mode"]);
    }

    #[tokio::test]
    async fn test_unknown_tags_do_not_end_the_stream() {
        let (client, mut server) = duplex(4096);

        tokio::spawn(async move {
            accept_subscription(&mut server, r#"{"success":true}"#).await;
            write_frame(&mut server, 0x8000_0099, r#"{"brand":"new"}"#).await;
            write_frame(&mut server, EventType::Tick.tag(), r#"{"first":true,"payload":""}"#).await;
            // Keep the peer open until the client is done
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let ctx = Context::background().with_timeout(Duration::from_secs(2));
        let mut stream = EventStream::handshake(&ctx, client, &[EventType::Tick])
            .await
            .unwrap();

        match stream.next_event(&ctx).await.unwrap() {
            Event::Tick(tick) => assert!(tick.first),
            other => panic!("Expected tick event, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_subscription_reads_no_events() {
        let (client, mut server) = duplex(4096);

        tokio::spawn(async move {
            accept_subscription(&mut server, r#"{"success":false}"#).await;
            write_frame(&mut server, EventType::Tick.tag(), r#"{"payload":"x"}"#).await;
        });

        let ctx = Context::background();
        let mut recorder = Recorder::default();
        let result = async {
            let mut stream = EventStream::handshake(&ctx, client, &[EventType::Tick]).await?;
            stream.run(&ctx, &mut recorder).await
        }
        .await;

        assert!(matches!(result, Err(IpcError::SubscriptionRejected)));
        assert!(recorder.seen.is_empty());
    }

    #[tokio::test]
    async fn test_framing_error_ends_the_loop() {
        let (client, mut server) = duplex(4096);

        tokio::spawn(async move {
            accept_subscription(&mut server, r#"{"success":true}"#).await;
            write_frame(&mut server, EventType::Tick.tag(), r#"{"payload":"a"}"#).await;
            let mut bad = encode_header(2, EventType::Tick.tag());
            bad[..6].copy_from_slice(b"nope!!");
            server.write_all(&bad).await.unwrap();
            server.write_all(b"{}").await.unwrap();
            write_frame(&mut server, EventType::Tick.tag(), r#"{"payload":"b"}"#).await;
        });

        let ctx = Context::background();
        let mut stream = EventStream::handshake(&ctx, client, &[EventType::Tick])
            .await
            .unwrap();
        let mut recorder = Recorder::default();
        let result = stream.run(&ctx, &mut recorder).await;

        assert!(matches!(result, Err(IpcError::Framing(_))));
        assert_eq!(recorder.seen, vec!["tick:a"]);
    }

    #[tokio::test]
    async fn test_cancellation_ends_the_loop() {
        let (client, mut server) = duplex(4096);

        tokio::spawn(async move {
            accept_subscription(&mut server, r#"{"success":true}"#).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let ctx = Context::background();
        let mut stream = EventStream::handshake(&ctx, client, &[EventType::Window])
            .await
            .unwrap();

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result = stream.run(&ctx, &mut Recorder::default()).await;
        assert!(matches!(result, Err(IpcError::Canceled)));
    }

    #[tokio::test]
    async fn test_subscribe_over_real_unix_socket() {
        let temp_dir = tempfile::tempdir().unwrap();
        let socket_path = temp_dir.path().join("sway-ipc.sock");
        let listener = tokio::net::UnixListener::bind(&socket_path).unwrap();

        tokio::spawn(async move {
            let (mut stream, _addr) = listener.accept().await.unwrap();
            let mut header = [0u8; HEADER_SIZE];
            stream.read_exact(&mut header).await.unwrap();
            let (length, message_type) = decode_header(&header).unwrap();
            let mut payload = vec![0u8; length as usize];
            stream.read_exact(&mut payload).await.unwrap();

            let reply = r#"{"success":true}"#;
            stream
                .write_all(&encode_header(reply.len() as u32, message_type))
                .await
                .unwrap();
            stream.write_all(reply.as_bytes()).await.unwrap();

            let tick = r#"{"first":true,"payload":""}"#;
            stream
                .write_all(&encode_header(tick.len() as u32, EventType::Tick.tag()))
                .await
                .unwrap();
            stream.write_all(tick.as_bytes()).await.unwrap();
        });

        let ctx = Context::background();
        let mut recorder = Recorder::default();
        let result = subscribe(&ctx, &socket_path, &mut recorder, &[EventType::Tick]).await;

        assert!(matches!(result, Err(IpcError::ConnectionClosed)));
        assert_eq!(recorder.seen, vec!["tick:"]);
    }

    #[tokio::test]
    async fn test_dispatcher_forwards_events_through_channel() {
        let (client, mut server) = duplex(4096);

        tokio::spawn(async move {
            accept_subscription(&mut server, r#"{"success":true}"#).await;
            write_frame(&mut server, EventType::Mode.tag(), r#"{"change":"default"}"#).await;
            write_frame(&mut server, EventType::Mode.tag(), r#"{"change":"resize"}"#).await;
        });

        let ctx = Context::background();
        let stream = EventStream::handshake(&ctx, client, &[EventType::Mode])
            .await
            .unwrap();

        let (dispatcher, events) = EventDispatcher::with_stream(DEFAULT_CHANNEL_BUFFER);
        let handle = dispatcher.spawn_with_stream(ctx, stream);

        let received: Vec<Event> = events.collect().await;
        assert_eq!(received.len(), 2);
        assert!(matches!(&received[1], Event::Mode(mode) if mode.change == "resize"));

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(IpcError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_dispatcher_stops_when_receiver_dropped() {
        let (client, mut server) = duplex(4096);

        tokio::spawn(async move {
            accept_subscription(&mut server, r#"{"success":true}"#).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let ctx = Context::background();
        let stream = EventStream::handshake(&ctx, client, &[EventType::Mode])
            .await
            .unwrap();

        let (dispatcher, receiver) = EventDispatcher::new(1);
        let handle = dispatcher.spawn_with_stream(ctx, stream);
        drop(receiver);

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
