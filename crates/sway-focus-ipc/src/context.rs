//! Cancellation and deadlines for blocking IPC steps
//!
//! Every write, header read and payload read runs through [`Context::run`],
//! which races the I/O against the caller's cancellation token and optional
//! deadline.
//!
//! ## Cancellation is not interruption
//!
//! When the signal wins, the in-flight I/O future is dropped where it stands.
//! A write may have pushed half a frame, a read may have consumed half a
//! header. The connection is therefore no longer frame-aligned and MUST be
//! discarded; [`crate::Client`] does this itself and reports
//! [`IpcError::NotConnected`] on the next call. Never hand a connection that
//! saw a cancellation back to anyone else.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::IpcError;

/// Cancellation token plus optional deadline, passed to every operation
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A context that is never cancelled on its own and has no deadline
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Wrap an existing token, e.g. one cancelled by a signal handler
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a context whose token is a child of this one
    ///
    /// Cancelling the child leaves the parent untouched; cancelling the
    /// parent cancels the child.
    pub fn with_cancel(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a context that expires `timeout` from now
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that expires at `deadline`, or at the parent's
    /// deadline if that comes first
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancel this context and every context derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The error of a signal that already fired, without waiting
    pub fn err(&self) -> Option<IpcError> {
        if self.token.is_cancelled() {
            return Some(IpcError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(IpcError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Wait until the context is cancelled or its deadline passes
    pub async fn done(&self) -> IpcError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => IpcError::Canceled,
                    _ = sleep_until(deadline) => IpcError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                IpcError::Canceled
            }
        }
    }

    /// Run one blocking step, giving up as soon as the context fires
    ///
    /// An already-fired context returns its error without polling `op` at
    /// all. Otherwise whichever of `op` and the signal finishes first decides
    /// the outcome. A losing `op` is abandoned mid-flight; see the module
    /// docs for what that means for the connection.
    pub async fn run<F, T>(&self, op: F) -> Result<T, IpcError>
    where
        F: Future<Output = Result<T, IpcError>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        tokio::select! {
            biased;
            result = op => result,
            err = self.done() => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_runs_to_completion() {
        let ctx = Context::background();
        let result = ctx.run(async { Ok::<_, IpcError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert!(ctx.err().is_none());
    }

    #[tokio::test]
    async fn test_expired_deadline_never_polls_the_operation() {
        let ctx = Context::background().with_timeout(Duration::ZERO);
        let mut polled = false;

        let result = ctx
            .run(async {
                polled = true;
                Ok::<_, IpcError>(())
            })
            .await;

        assert!(matches!(result, Err(IpcError::DeadlineExceeded)));
        assert!(!polled);
    }

    #[tokio::test]
    async fn test_deadline_beats_pending_operation() {
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        let start = std::time::Instant::now();

        let result = ctx
            .run(std::future::pending::<Result<(), IpcError>>())
            .await;

        assert!(matches!(result, Err(IpcError::DeadlineExceeded)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancel_beats_pending_operation() {
        let ctx = Context::background();
        let child = ctx.with_cancel();

        let canceller = child.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result = child
            .run(std::future::pending::<Result<(), IpcError>>())
            .await;

        assert!(matches!(result, Err(IpcError::Canceled)));
        assert!(ctx.err().is_none(), "cancelling a child must not cancel the parent");
    }

    #[tokio::test]
    async fn test_parent_cancel_reaches_children() {
        let parent = Context::background();
        let child = parent.with_timeout(Duration::from_secs(60));
        parent.cancel();
        assert!(matches!(child.err(), Some(IpcError::Canceled)));
    }

    #[tokio::test]
    async fn test_child_deadline_never_extends_parent() {
        let parent = Context::background().with_timeout(Duration::from_millis(5));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test]
    async fn test_operation_error_is_returned_verbatim() {
        let ctx = Context::background().with_timeout(Duration::from_secs(60));
        let result = ctx
            .run(async { Err::<(), _>(IpcError::ConnectionClosed) })
            .await;
        assert!(matches!(result, Err(IpcError::ConnectionClosed)));
    }
}
