//! Cooperative cancellation for converter workers.
//!
//! [`stop_channel`] returns a [`StopHandle`] kept by whoever owns the worker
//! and a [`StopSignal`] moved into the worker.  The signal can be polled
//! ([`StopSignal::is_stopped`]) at the top of each iteration, or awaited
//! ([`StopSignal::stopped`]) inside `tokio::select!` so that a pending receive
//! or sleep is abandoned as soon as stop is requested.
//!
//! Dropping the handle counts as a stop request: a worker whose owner went
//! away has nobody left to stop it otherwise.

use tokio::sync::watch;

/// Creates a connected handle/signal pair.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

/// Owner side of the stop channel.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Requests the worker to stop.  Idempotent.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` once [`stop`](Self::stop) has been called.
    pub fn is_stop_requested(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Worker side of the stop channel.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Returns `true` if stop was requested or the handle was dropped.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once stop is requested or the handle is dropped.
    ///
    /// Cancel-safe: dropping the future before it resolves loses nothing.
    pub async fn stopped(&mut self) {
        // `wait_for` errors only when the sender is gone, which also means stop.
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
