//! Pluggable per-session event handling.

use std::sync::Arc;

use crate::server::BackendServer;

/// Carries the outcome of a cancellable event back to the session.
#[derive(Debug, Default)]
pub struct Context {
    cancelled: bool,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the action that raised the event.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Receives lifecycle callbacks for a single session.
///
/// Every method has a no-op default, so implementors only override what
/// they care about. Callbacks run on the session's tasks and must not block.
pub trait Handler: Send + Sync {
    /// Called before any network I/O of a transfer to `server`. Calling
    /// [`Context::cancel`] aborts the transfer.
    fn handle_transfer(&self, ctx: &mut Context, server: &Arc<BackendServer>) {
        let _ = (ctx, server);
    }

    /// Called once when the session closes.
    fn handle_quit(&self) {}
}

/// The handler every session starts with.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopHandler;

impl Handler for NopHandler {}
