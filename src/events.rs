//! Lifecycle notifications emitted by the session orchestrator.
//!
//! External observers (rendering, the debug bus) subscribe through a typed
//! channel instead of a callback emitter. There are exactly four lifecycle
//! points - started, processing, finished, failed - plus draft-change
//! notifications carrying the one-shot first-delta flag the UI uses for its
//! scroll-to-bottom side effect.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::correlation::CorrelationState;

/// One notification from an exchange.
///
/// Lifecycle variants carry the correlation snapshot at the time of
/// emission, so observers can re-fetch server-side records (spans, runs)
/// without reaching into live session state. `Delta` is high-frequency and
/// carries only the exchange id.
///
/// A cancelled exchange emits no terminal event: the stream of notifications
/// simply stops after the last `Delta`. Observers must not wait for
/// `Finished` or `Failed` to conclude an exchange is over; the submit
/// call's returned outcome is the authoritative terminal signal.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// Submission accepted; the user message has been appended and the
    /// request is being opened.
    Started {
        exchange_id: Uuid,
        correlation: CorrelationState,
    },
    /// Response headers resolved; the stream is being consumed.
    Processing {
        exchange_id: Uuid,
        correlation: CorrelationState,
    },
    /// The draft changed. `first` is true exactly once per exchange, on the
    /// first applied delta.
    Delta {
        exchange_id: Uuid,
        first: bool,
    },
    /// The exchange completed and the draft was finalized.
    Finished {
        exchange_id: Uuid,
        correlation: CorrelationState,
    },
    /// The exchange failed. Never emitted for cancellation.
    Failed {
        exchange_id: Uuid,
        correlation: CorrelationState,
        message: String,
    },
}

/// Sender half of the notification channel.
///
/// A dropped receiver is not an error: notifications are fire-and-forget.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ChatEvent>,
}

impl EventSink {
    /// Create a sink/receiver pair.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A sink whose notifications go nowhere.
    pub fn discard() -> Self {
        let (sink, _rx) = Self::channel();
        sink
    }

    /// Emit an event, ignoring a closed channel.
    pub fn emit(&self, event: ChatEvent) {
        let _ = self.tx.send(event);
    }
}
