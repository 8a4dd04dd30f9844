//! Cooperative cancellation for in-flight exchanges.
//!
//! One token exists per in-flight exchange. Cancellation is cooperative: the
//! stream loop checks the token at each suspension point (the next chunk
//! read), so a transport that never yields can only be stopped by the
//! transport's own timeout. A cancellation-triggered termination is a
//! distinct, non-error outcome everywhere in this crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared cancellation token for one exchange.
///
/// Clones observe the same state. Signalling is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    /// Create a fresh, unsignalled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Safe to call any number of times.
    pub fn signal(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            tracing::debug!("cancellation token signalled");
        }
        // Wake every pending and future waiter.
        self.inner.notify.notify_waiters();
    }

    /// Whether cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve when cancellation is signalled.
    ///
    /// Usable inside `tokio::select!` against the next chunk read.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            let notified = self.inner.notify.notified();
            // Re-check after registering so a signal between the check and
            // the await is not lost.
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Whether two tokens share the same underlying state.
    pub fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Owner of the single active token for a conversation.
///
/// `begin()` enforces the one-active-exchange rule: creating the token for a
/// new exchange signals the previous one, which downgrades any still-running
/// transport read into a cancellation outcome at its next suspension point.
#[derive(Debug, Default)]
pub struct CancellationController {
    active: Option<CancelToken>,
}

impl CancellationController {
    /// Create a controller with no active token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new exchange: invalidate the previous token (if any) and
    /// return a fresh one.
    pub fn begin(&mut self) -> CancelToken {
        if let Some(previous) = self.active.take() {
            previous.signal();
        }
        let token = CancelToken::new();
        self.active = Some(token.clone());
        token
    }

    /// Cancel the active exchange. Idempotent; a no-op when idle.
    pub fn cancel(&mut self) {
        if let Some(token) = &self.active {
            token.signal();
        }
    }

    /// Drop the token reference once the exchange has finished.
    pub fn clear(&mut self) {
        self.active = None;
    }

    /// Release `token` if it is still the active one.
    ///
    /// A finished exchange must not clear a token that a newer `begin()`
    /// already replaced; the newer exchange still owns the slot.
    pub fn finish(&mut self, token: &CancelToken) {
        if self.active.as_ref().is_some_and(|t| t.same_as(token)) {
            self.active = None;
        }
    }

    /// Whether an exchange is currently in flight.
    pub fn is_active(&self) -> bool {
        self.active.as_ref().is_some_and(|t| !t.is_cancelled())
    }
}
