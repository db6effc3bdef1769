//! Focus watcher
//!
//! Applies the configured rule whenever focus moves to another view.

use std::time::Duration;

use sway_focus_config::Config;
use sway_focus_ipc::{focused_node, Client, Context, Event, IpcError, Node};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

/// Runs focus rules over a request/reply client
#[derive(Debug)]
pub struct FocusWatcher<S = UnixStream> {
    client: Client<S>,
    config: Config,
    /// Deadline applied to every query and command
    timeout: Duration,
}

impl<S> FocusWatcher<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(client: Client<S>, config: Config, timeout: Duration) -> Self {
        Self {
            client,
            config,
            timeout,
        }
    }

    /// Apply the rule for whatever is focused right now
    pub async fn apply_current(&mut self, ctx: &Context) -> Result<(), IpcError> {
        let tree = self.client.get_tree(&ctx.with_timeout(self.timeout)).await?;
        let node = tree.focused_node().cloned();
        self.apply(ctx, node.as_ref()).await
    }

    /// React to one event; only window focus changes matter
    pub async fn handle_event(&mut self, ctx: &Context, event: &Event) -> Result<(), IpcError> {
        let Event::Window(window) = event else {
            return Ok(());
        };
        if !window.is_focus() {
            return Ok(());
        }

        let node = focused_node(Some(window.container.clone()));
        self.apply(ctx, node.as_ref()).await
    }

    /// Handle events until the stream ends or `ctx` is cancelled
    ///
    /// Cancellation is a clean stop, even mid-command. A failing rule
    /// command is logged and skipped. Losing the query connection ends the
    /// loop with the error.
    pub async fn run<E>(&mut self, ctx: &Context, mut events: E) -> Result<(), IpcError>
    where
        E: Stream<Item = Event> + Unpin,
    {
        loop {
            let event = tokio::select! {
                biased;
                _ = ctx.token().cancelled() => {
                    debug!("Focus watcher cancelled");
                    return Ok(());
                }
                next = events.next() => match next {
                    Some(event) => event,
                    None => {
                        debug!("Event stream ended");
                        return Ok(());
                    }
                },
            };

            if let Err(e) = self.handle_event(ctx, &event).await {
                // Shutdown arrived while a command was in flight
                if ctx.err().is_some() {
                    debug!(
                        "Focus watcher cancelled during {} event: {}",
                        event.event_type(),
                        e
                    );
                    return Ok(());
                }
                if !self.client.is_connected() {
                    return Err(e);
                }
                warn!("Failed to handle {} event: {}", event.event_type(), e);
            }
        }
    }

    pub async fn close(&mut self) {
        self.client.close().await;
    }

    async fn apply(&mut self, ctx: &Context, node: Option<&Node>) -> Result<(), IpcError> {
        let Some(node) = node else {
            debug!("No focused node");
            return Ok(());
        };

        let Some(command) = self
            .config
            .command_for(node.app_id.as_deref(), node.window_class())
            .map(String::from)
        else {
            debug!(
                "No rule for {} (node {})",
                node.app_identifier().unwrap_or("<unknown>"),
                node.id
            );
            return Ok(());
        };

        info!(
            "Focus on {}: running {:?}",
            node.app_identifier().unwrap_or("<unknown>"),
            command
        );

        match self
            .client
            .run_command(&ctx.with_timeout(self.timeout), &command)
            .await
        {
            Ok(_) => Ok(()),
            Err(IpcError::CommandFailed(failure)) => {
                warn!("{}", failure);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
