//! Converter observability events.
//!
//! The converter reports what it does through an [`EventSink`].  Receive,
//! resolve, send and no-match events are only emitted while debug mode is on;
//! raw frames seen in passive-listen mode are always emitted because showing
//! them is the whole point of that mode.
//!
//! The [`Display`](std::fmt::Display) form of each event is the log line
//! operators are used to, e.g.
//!
//! ```text
//! SUCCESS => Received: (1, E0E040BF, 32)
//! SUCCESS => (1, E0E040BF, 32) resolved to (2, A90, 12)
//! SUCCESS => Sent: (2, A90, 12)
//! FAIL => No rule matching for (1, E0E0D02F, 32)
//! ```

use std::fmt;
use std::sync::Mutex;

use irbridge_core::Signal;
use tokio::sync::watch;
use tracing::info;

/// Something the converter observed or did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConverterEvent {
    /// A signal arrived from the transceiver.
    Received(Signal),
    /// A rule matched `input`; `output` is the rule's output signal.
    Resolved { input: Signal, output: Signal },
    /// `output` was handed to the transceiver successfully.
    Sent(Signal),
    /// No rule exists for the received signal.
    NoRuleMatching(Signal),
    /// Uninterpreted device output captured in passive-listen mode.
    RawFrame(String),
}

impl fmt::Display for ConverterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received(s) => write!(f, "SUCCESS => Received: {s}"),
            Self::Resolved { input, output } => {
                write!(f, "SUCCESS => {input} resolved to {output}")
            }
            Self::Sent(s) => write!(f, "SUCCESS => Sent: {s}"),
            Self::NoRuleMatching(s) => write!(f, "FAIL => No rule matching for {s}"),
            Self::RawFrame(line) => f.write_str(line.trim_end()),
        }
    }
}

/// Receiver of converter events.
///
/// Called on the converter's worker task; implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ConverterEvent);
}

/// Default sink: writes every event as an `info`-level log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &ConverterEvent) {
        match event {
            ConverterEvent::RawFrame(_) => info!(target: "irbridge::sniffer", "{event}"),
            _ => info!("{event}"),
        }
    }
}

/// Sink that keeps every event in memory.
///
/// Used by tests and by embedders that want to inspect converter activity.
/// [`wait_for_count`](Self::wait_for_count) lets async callers wait until a
/// given number of events has been recorded.
#[derive(Debug)]
pub struct RecordingEventSink {
    events: Mutex<Vec<ConverterEvent>>,
    count: watch::Sender<usize>,
}

impl Default for RecordingEventSink {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            count: watch::channel(0).0,
        }
    }
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far, oldest first.
    pub fn events(&self) -> Vec<ConverterEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Waits until at least `n` events have been recorded.
    pub async fn wait_for_count(&self, n: usize) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so `wait_for` cannot fail here.
        let _ = rx.wait_for(|count| *count >= n).await;
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &ConverterEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event.clone());
        self.count.send_modify(|count| *count += 1);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use irbridge_core::domain::protocol::{NEC, SONY};

    fn nec() -> Signal {
        Signal::new(NEC, "E0E040BF", 32)
    }

    fn sony() -> Signal {
        Signal::new(SONY, "A90", 12)
    }

    #[test]
    fn test_display_matches_operator_log_lines() {
        assert_eq!(
            ConverterEvent::Received(nec()).to_string(),
            "SUCCESS => Received: (1, E0E040BF, 32)"
        );
        assert_eq!(
            ConverterEvent::Resolved {
                input: nec(),
                output: sony()
            }
            .to_string(),
            "SUCCESS => (1, E0E040BF, 32) resolved to (2, A90, 12)"
        );
        assert_eq!(
            ConverterEvent::Sent(sony()).to_string(),
            "SUCCESS => Sent: (2, A90, 12)"
        );
        assert_eq!(
            ConverterEvent::NoRuleMatching(nec()).to_string(),
            "FAIL => No rule matching for (1, E0E040BF, 32)"
        );
    }

    #[test]
    fn test_raw_frame_display_strips_line_ending() {
        let event = ConverterEvent::RawFrame("+8950 -4450 +550\r\n".to_string());
        assert_eq!(event.to_string(), "+8950 -4450 +550");
    }

    #[test]
    fn test_recording_sink_keeps_order() {
        // Arrange
        let sink = RecordingEventSink::new();

        // Act
        sink.emit(&ConverterEvent::Received(nec()));
        sink.emit(&ConverterEvent::Sent(sony()));

        // Assert
        assert_eq!(
            sink.events(),
            vec![ConverterEvent::Received(nec()), ConverterEvent::Sent(sony())]
        );
    }

    #[tokio::test]
    async fn test_wait_for_count_returns_once_reached() {
        let sink = std::sync::Arc::new(RecordingEventSink::new());
        let writer = std::sync::Arc::clone(&sink);

        tokio::spawn(async move {
            writer.emit(&ConverterEvent::Received(nec()));
            writer.emit(&ConverterEvent::NoRuleMatching(nec()));
        });

        tokio::time::timeout(std::time::Duration::from_secs(2), sink.wait_for_count(2))
            .await
            .expect("two events must be recorded");
        assert_eq!(sink.events().len(), 2);
    }

    #[test]
    fn test_tracing_sink_accepts_every_event_kind() {
        let sink = TracingEventSink;
        sink.emit(&ConverterEvent::Received(nec()));
        sink.emit(&ConverterEvent::RawFrame("raw".to_string()));
    }
}
