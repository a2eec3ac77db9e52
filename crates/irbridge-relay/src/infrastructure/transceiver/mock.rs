//! Scripted transceiver for tests.
//!
//! # Why a mock transceiver?
//!
//! The real [`LineLinkTransceiver`](super::LineLinkTransceiver) needs an IR
//! device on a serial port or a network bridge.  `MockTransceiver` replaces
//! the device with in-memory queues:
//!
//! - signals the "device" receives are queued with [`push_signal`](MockTransceiver::push_signal),
//! - every transmitted signal is recorded in `transmitted`,
//! - every receiver switch is recorded in `receiver_toggles`.
//!
//! # Usage in tests
//!
//! ```ignore
//! let device = Arc::new(MockTransceiver::new());
//! let converter = Arc::new(SignalConverter::new(table, device.clone()));
//! let handle = converter.start()?;
//!
//! device.push_signal(Signal::new(NEC, "E0E040BF", 32));
//! device.wait_for_transmits(1).await;
//! assert_eq!(device.transmitted()[0].value, "A90");
//! ```
//!
//! # `should_fail` flag
//!
//! Set `should_fail = true` (or build with [`MockTransceiver::failing`]) to
//! make every transmit and receiver switch fail with
//! [`TransceiverError::Other`].

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use irbridge_core::Signal;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::application::convert_signals::{Transceiver, TransceiverError};

/// A transceiver double fed from in-memory queues.
pub struct MockTransceiver {
    signal_tx: Mutex<Option<mpsc::UnboundedSender<Signal>>>,
    signal_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Signal>>,
    frame_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    frame_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    passive: watch::Sender<bool>,
    transmit_count: watch::Sender<usize>,
    /// Every signal passed to `transmit`, in call order.
    pub transmitted: Mutex<Vec<Signal>>,
    /// When each entry of `transmitted` was recorded.
    transmit_times: Mutex<Vec<Instant>>,
    /// Every value passed to `enable_receiver`, in call order.
    pub receiver_toggles: Mutex<Vec<bool>>,
    /// When `true`, `transmit` and `enable_receiver` fail.
    pub should_fail: bool,
}

impl Default for MockTransceiver {
    fn default() -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        Self {
            signal_tx: Mutex::new(Some(signal_tx)),
            signal_rx: tokio::sync::Mutex::new(signal_rx),
            frame_tx: Mutex::new(Some(frame_tx)),
            frame_rx: tokio::sync::Mutex::new(frame_rx),
            passive: watch::channel(false).0,
            transmit_count: watch::channel(0).0,
            transmitted: Mutex::new(Vec::new()),
            transmit_times: Mutex::new(Vec::new()),
            receiver_toggles: Mutex::new(Vec::new()),
            should_fail: false,
        }
    }
}

impl MockTransceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transceiver whose transmits and receiver switches always fail.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Queues a decoded signal for `receive`.  Ignored after [`close`](Self::close).
    pub fn push_signal(&self, signal: Signal) {
        if let Some(tx) = lock(&self.signal_tx).as_ref() {
            let _ = tx.send(signal);
        }
    }

    /// Queues a raw line for `wait_for_frame`.  Ignored after [`close`](Self::close).
    ///
    /// Queued lines are still delivered after passive mode is switched off.
    pub fn push_frame(&self, frame: impl Into<String>) {
        if let Some(tx) = lock(&self.frame_tx).as_ref() {
            let _ = tx.send(frame.into());
        }
    }

    /// Simulates the device link going away.  Queued items are still
    /// delivered; after that every read reports [`TransceiverError::Closed`].
    pub fn close(&self) {
        lock(&self.signal_tx).take();
        lock(&self.frame_tx).take();
    }

    /// Switches passive-listen mode.  Turning it off wakes a suspended `receive`.
    pub fn set_passive_listen(&self, on: bool) {
        self.passive.send_replace(on);
    }

    /// Snapshot of the transmitted signals.
    pub fn transmitted(&self) -> Vec<Signal> {
        lock(&self.transmitted).clone()
    }

    /// Instants at which the transmitted signals were recorded, in call
    /// order.  Follows the paused clock in `start_paused` tests.
    pub fn transmit_times(&self) -> Vec<Instant> {
        lock(&self.transmit_times).clone()
    }

    pub fn receiver_toggles(&self) -> Vec<bool> {
        lock(&self.receiver_toggles).clone()
    }

    /// Waits until at least `n` signals were transmitted.
    pub async fn wait_for_transmits(&self, n: usize) {
        let mut rx = self.transmit_count.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Transceiver for MockTransceiver {
    async fn enable_receiver(&self, enabled: bool) -> Result<(), TransceiverError> {
        if self.should_fail {
            return Err(TransceiverError::Other("mock receiver failure".to_string()));
        }
        lock(&self.receiver_toggles).push(enabled);
        Ok(())
    }

    fn is_passive_listen_mode(&self) -> bool {
        *self.passive.borrow()
    }

    async fn receive(&self) -> Result<Signal, TransceiverError> {
        let mut passive = self.passive.subscribe();
        let _ = passive.wait_for(|on| !*on).await;
        self.signal_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransceiverError::Closed)
    }

    async fn transmit(&self, signal: &Signal) -> Result<(), TransceiverError> {
        if self.should_fail {
            return Err(TransceiverError::Other("mock transmit failure".to_string()));
        }
        if self.is_passive_listen_mode() {
            return Err(TransceiverError::PassiveListen);
        }
        let count = {
            let mut sent = lock(&self.transmitted);
            sent.push(signal.clone());
            lock(&self.transmit_times).push(Instant::now());
            sent.len()
        };
        self.transmit_count.send_replace(count);
        Ok(())
    }

    async fn wait_for_frame(&self) -> Result<String, TransceiverError> {
        let mut frames = self.frame_rx.lock().await;
        let mut passive = self.passive.subscribe();
        tokio::select! {
            biased;
            frame = frames.recv() => frame.ok_or(TransceiverError::Closed),
            _ = passive.wait_for(|on| !*on) => Err(TransceiverError::NotPassive),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use irbridge_core::domain::protocol::NEC;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_records_transmits_in_order() {
        let device = MockTransceiver::new();
        device.transmit(&Signal::new(NEC, "01", 32)).await.unwrap();
        device.transmit(&Signal::new(NEC, "02", 32)).await.unwrap();

        device.wait_for_transmits(2).await;
        let values: Vec<String> = device.transmitted().into_iter().map(|s| s.value).collect();
        assert_eq!(values, vec!["01", "02"]);
        let times = device.transmit_times();
        assert_eq!(times.len(), 2);
        assert!(times[0] <= times[1]);
    }

    #[tokio::test]
    async fn test_should_fail_rejects_and_records_nothing() {
        let device = MockTransceiver::failing();
        assert!(device.transmit(&Signal::new(NEC, "01", 32)).await.is_err());
        assert!(device.enable_receiver(true).await.is_err());
        assert!(device.transmitted().is_empty());
        assert!(device.receiver_toggles().is_empty());
    }

    #[tokio::test]
    async fn test_receive_after_close_drains_then_reports_closed() {
        let device = MockTransceiver::new();
        device.push_signal(Signal::new(NEC, "01", 32));
        device.close();

        assert_eq!(device.receive().await.unwrap().value, "01");
        assert!(matches!(device.receive().await, Err(TransceiverError::Closed)));
    }

    #[tokio::test]
    async fn test_receive_waits_while_passive() {
        // Arrange
        let device = Arc::new(MockTransceiver::new());
        device.set_passive_listen(true);
        device.push_signal(Signal::new(NEC, "01", 32));

        // Act
        let blocked = tokio::time::timeout(Duration::from_millis(50), device.receive()).await;
        device.set_passive_listen(false);
        let resumed = device.receive().await;

        // Assert
        assert!(blocked.is_err());
        assert_eq!(resumed.unwrap().value, "01");
    }

    #[tokio::test]
    async fn test_passive_mode_refuses_transmit_and_serves_frames() {
        let device = MockTransceiver::new();
        device.set_passive_listen(true);
        device.push_frame("+9000 -4500");

        let result = device.transmit(&Signal::new(NEC, "01", 32)).await;

        assert!(matches!(result, Err(TransceiverError::PassiveListen)));
        assert_eq!(device.wait_for_frame().await.unwrap(), "+9000 -4500");
    }

    #[tokio::test]
    async fn test_wait_for_frame_outside_passive_mode() {
        let device = MockTransceiver::new();
        device.push_frame("late frame");

        assert_eq!(device.wait_for_frame().await.unwrap(), "late frame");
        assert!(matches!(
            device.wait_for_frame().await,
            Err(TransceiverError::NotPassive)
        ));
    }
}
