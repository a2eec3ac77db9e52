//! SignalConverter: receives IR signals and re-emits their translation.
//!
//! This use case is the heart of the relay.  It owns a [`SignalRuleTable`],
//! pulls signals from a [`Transceiver`], and for every signal that matches a
//! rule transmits the rule's output after two delays:
//!
//! 1. the **settle delay** (default [`DEFAULT_SETTLE_DELAY`]), which lets the
//!    burst of repeat codes a remote sends while a button is held die down;
//! 2. the rule's own **forwarding delay** (`delay_ms`).
//!
//! The rule is looked up again after the settle delay, so a rule removed or
//! disabled in the meantime is not forwarded.
//!
//! # Architecture
//!
//! The converter depends only on the [`Transceiver`] and
//! [`EventSink`] traits.  The serial/TCP line-link adapter and the scripted
//! test transceiver live in the infrastructure layer and are injected at
//! construction time.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start()/run()──▶ Running ──stop signal──▶ Stopped
//! ```
//!
//! A converter runs at most once.  Rules and debug mode can be changed from
//! any task while it runs; the rule table lock is only ever held for a single
//! lookup or mutation and never across an `.await`.
//!
//! # Failure handling
//!
//! Nothing the transceiver does is fatal.  A failed receive is logged and
//! retried after [`ConverterSettings::receive_retry_interval`]; a failed
//! transmit is logged and the command is dropped.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use irbridge_core::{
    FrameError, ProtocolId, RuleKey, RuleRejected, Signal, SignalRule, SignalRuleTable,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::{ConverterEvent, EventSink, TracingEventSink};
use super::stop::{stop_channel, StopHandle, StopSignal};

/// Pause after a rule matches and before anything is transmitted.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Pause after a failed receive before trying again.
pub const DEFAULT_RECEIVE_RETRY_INTERVAL: Duration = Duration::from_secs(1);

// ── Transceiver seam ──────────────────────────────────────────────────────────

/// Error type for transceiver operations.
#[derive(Debug, Error)]
pub enum TransceiverError {
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device link was closed (EOF or the reader stopped).
    #[error("device link closed")]
    Closed,

    /// The device did not answer a command in time.
    #[error("device did not answer {command:?} within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The device answered a command without the acknowledgement marker.
    #[error("device rejected {command:?}: {response:?}")]
    NotAcknowledged { command: String, response: String },

    /// Transmitting is refused while the device only sniffs.
    #[error("cannot transmit while passive listen mode is on")]
    PassiveListen,

    /// Passive-listen mode is off, so no raw frames will arrive.
    #[error("passive listen mode is off")]
    NotPassive,

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("transceiver error: {0}")]
    Other(String),
}

/// An IR device that can receive and transmit signals.
///
/// Receiver, LED and passive-listen state belong to the implementing handle,
/// not to any process-wide state.
#[async_trait]
pub trait Transceiver: Send + Sync {
    /// Switches IR reception on or off.
    async fn enable_receiver(&self, enabled: bool) -> Result<(), TransceiverError>;

    /// Returns `true` while the device reports raw output instead of signals.
    fn is_passive_listen_mode(&self) -> bool;

    /// Waits for the next decoded signal.
    ///
    /// Suspends while passive-listen mode is on.  Must be cancel-safe: the
    /// converter drops a pending `receive` when it is asked to stop.
    async fn receive(&self) -> Result<Signal, TransceiverError>;

    /// Emits `signal`.
    async fn transmit(&self, signal: &Signal) -> Result<(), TransceiverError>;

    /// Waits for the next raw output line.
    ///
    /// Returns [`TransceiverError::NotPassive`] once passive-listen mode is
    /// off and no captured frame is left.  Must be cancel-safe.
    async fn wait_for_frame(&self) -> Result<String, TransceiverError>;
}

// ── Converter types ───────────────────────────────────────────────────────────

/// Error type for converter lifecycle operations.
#[derive(Debug, Error)]
pub enum ConverterError {
    #[error("converter is already running")]
    AlreadyRunning,

    #[error("converter has stopped and cannot be restarted")]
    AlreadyStopped,

    #[error("converter worker failed: {0}")]
    Worker(String),
}

/// Lifecycle state of a [`SignalConverter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterState {
    /// Constructed, not yet started.
    Idle,
    /// The worker loop is active.
    Running,
    /// The worker loop has exited after a stop request.
    Stopped,
}

/// Timing knobs of the converter loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterSettings {
    /// Pause between a rule match and the forwarding delay.
    pub settle_delay: Duration,
    /// Pause after a failed receive.
    pub receive_retry_interval: Duration,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            receive_retry_interval: DEFAULT_RECEIVE_RETRY_INTERVAL,
        }
    }
}

/// Handle to a converter worker spawned with [`SignalConverter::start`].
#[derive(Debug)]
pub struct ConverterHandle {
    stop: StopHandle,
    task: JoinHandle<()>,
}

impl ConverterHandle {
    /// Asks the worker to stop.  Returns immediately.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Waits for the worker to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ConverterError::Worker`] if the worker task panicked or was
    /// cancelled by the runtime.
    pub async fn join(self) -> Result<(), ConverterError> {
        // Keep the handle alive while joining; dropping it would also stop
        // the worker, which is not what a plain `join` asks for.
        let Self { stop, task } = self;
        let result = task.await;
        drop(stop);
        result.map_err(|e| ConverterError::Worker(e.to_string()))
    }

    /// Stops the worker and waits for it to exit.
    pub async fn shutdown(self) -> Result<(), ConverterError> {
        self.stop();
        self.join().await
    }
}

// ── SignalConverter ───────────────────────────────────────────────────────────

/// The signal conversion use case.
pub struct SignalConverter {
    id: Uuid,
    table: Mutex<SignalRuleTable>,
    transceiver: Arc<dyn Transceiver>,
    sink: Arc<dyn EventSink>,
    settings: ConverterSettings,
    debug_mode: AtomicBool,
    state: Mutex<ConverterState>,
}

impl SignalConverter {
    /// Creates an idle converter owning `table` and driving `transceiver`.
    ///
    /// Debug mode starts off; events go to a [`TracingEventSink`] unless
    /// another sink is installed with [`with_event_sink`](Self::with_event_sink).
    pub fn new(table: SignalRuleTable, transceiver: Arc<dyn Transceiver>) -> Self {
        Self {
            id: Uuid::new_v4(),
            table: Mutex::new(table),
            transceiver,
            sink: Arc::new(TracingEventSink),
            settings: ConverterSettings::default(),
            debug_mode: AtomicBool::new(false),
            state: Mutex::new(ConverterState::Idle),
        }
    }

    pub fn with_settings(mut self, settings: ConverterSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Identifier of this converter, used to tell workers apart in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &ConverterSettings {
        &self.settings
    }

    pub fn state(&self) -> ConverterState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Rule management ──────────────────────────────────────────────────────

    fn lock_table(&self) -> MutexGuard<'_, SignalRuleTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a rule to the owned table.  Same no-overwrite policy as
    /// [`SignalRuleTable::add`].
    pub fn add_rule(&self, rule: SignalRule) -> Result<SignalRule, RuleRejected> {
        self.lock_table().add(rule)
    }

    pub fn add_mapping(&self, input: Signal, output: Signal) -> Result<SignalRule, RuleRejected> {
        self.add_rule(SignalRule::new(input, output))
    }

    pub fn add_with_delay(
        &self,
        input: Signal,
        output: Signal,
        delay_ms: u64,
    ) -> Result<SignalRule, RuleRejected> {
        self.add_rule(SignalRule::with_delay(input, output, delay_ms))
    }

    pub fn add_with_enabled(
        &self,
        input: Signal,
        output: Signal,
        enabled: bool,
    ) -> Result<SignalRule, RuleRejected> {
        self.add_rule(SignalRule::with_enabled(input, output, enabled))
    }

    pub fn add_with_options(
        &self,
        input: Signal,
        output: Signal,
        delay_ms: u64,
        enabled: bool,
    ) -> Result<SignalRule, RuleRejected> {
        self.add_rule(SignalRule::with_options(input, output, delay_ms, enabled))
    }

    /// Removes the rule for `(protocol, value)`; returns the empty rule if
    /// there was none.
    pub fn remove_rule(&self, protocol: ProtocolId, value: &str) -> SignalRule {
        self.lock_table().remove(protocol, value)
    }

    /// Returns the output a received `signal` translates to, or the empty
    /// signal if no rule matches.
    pub fn resolve(&self, signal: &Signal) -> Signal {
        self.lock_table().lookup_signal(signal).output
    }

    /// Copy of the current rule table.
    pub fn rules_snapshot(&self) -> SignalRuleTable {
        self.lock_table().clone()
    }

    pub fn rule_count(&self) -> usize {
        self.lock_table().len()
    }

    // ── Debug mode ───────────────────────────────────────────────────────────

    /// Turns per-signal event reporting on or off.  Takes effect on the next
    /// event, even while running.
    pub fn set_debug_mode(&self, on: bool) {
        self.debug_mode.store(on, Ordering::Relaxed);
    }

    pub fn is_debug_mode(&self) -> bool {
        self.debug_mode.load(Ordering::Relaxed)
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    fn begin_running(&self) -> Result<(), ConverterError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            ConverterState::Idle => {
                *state = ConverterState::Running;
                Ok(())
            }
            ConverterState::Running => Err(ConverterError::AlreadyRunning),
            ConverterState::Stopped => Err(ConverterError::AlreadyStopped),
        }
    }

    /// Spawns the worker loop on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// [`ConverterError::AlreadyRunning`] or [`ConverterError::AlreadyStopped`]
    /// if the converter is not idle.
    pub fn start(self: &Arc<Self>) -> Result<ConverterHandle, ConverterError> {
        self.begin_running()?;
        let (stop, signal) = stop_channel();
        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.run_loop(signal).await });
        Ok(ConverterHandle { stop, task })
    }

    /// Runs the worker loop on the caller's task until `stop` fires.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub async fn run(&self, stop: StopSignal) -> Result<(), ConverterError> {
        self.begin_running()?;
        self.run_loop(stop).await;
        Ok(())
    }

    async fn run_loop(&self, mut stop: StopSignal) {
        info!(
            "converter {}: starting with {} rule(s)",
            self.id,
            self.rule_count()
        );

        if let Err(e) = self.transceiver.enable_receiver(true).await {
            warn!("converter {}: could not enable receiver: {e}", self.id);
        }

        loop {
            if stop.is_stopped() {
                break;
            }

            if self.transceiver.is_passive_listen_mode() {
                let frame = tokio::select! {
                    frame = self.transceiver.wait_for_frame() => frame,
                    _ = stop.stopped() => break,
                };
                match frame {
                    Ok(line) => self.sink.emit(&ConverterEvent::RawFrame(line)),
                    Err(TransceiverError::NotPassive) => {
                        debug!("converter {}: passive listen mode ended", self.id);
                    }
                    Err(e) => {
                        warn!("converter {}: reading raw frame failed: {e}", self.id);
                        if self.pause(self.settings.receive_retry_interval, &mut stop).await {
                            break;
                        }
                    }
                }
                continue;
            }

            let received = tokio::select! {
                received = self.transceiver.receive() => received,
                _ = stop.stopped() => break,
            };
            let signal = match received {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("converter {}: receive failed: {e}", self.id);
                    if self.pause(self.settings.receive_retry_interval, &mut stop).await {
                        break;
                    }
                    continue;
                }
            };

            if self.translate_and_send(signal, &mut stop).await.is_break() {
                break;
            }
        }

        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = ConverterState::Stopped;
        info!("converter {}: stopped", self.id);
    }

    /// Handles one received signal.  Breaks when stop was requested during a
    /// wait.
    async fn translate_and_send(&self, signal: Signal, stop: &mut StopSignal) -> ControlFlow<()> {
        self.report(ConverterEvent::Received(signal.clone()));

        let matched = self.lock_table().get(&RuleKey::from_signal(&signal)).is_some();
        if !matched {
            self.report(ConverterEvent::NoRuleMatching(signal));
            return ControlFlow::Continue(());
        }

        if self.pause(self.settings.settle_delay, stop).await {
            return ControlFlow::Break(());
        }

        // The table may have changed during the settle delay; a rule removed
        // meanwhile resolves to the empty rule.
        let rule = self.lock_table().lookup_signal(&signal);
        self.report(ConverterEvent::Resolved {
            input: signal.clone(),
            output: rule.output.clone(),
        });

        if !rule.forwards() {
            debug!("converter {}: no forwarding for {signal}", self.id);
            return ControlFlow::Continue(());
        }

        if self.pause(Duration::from_millis(rule.delay_ms), stop).await || stop.is_stopped() {
            return ControlFlow::Break(());
        }

        match self.transceiver.transmit(&rule.output).await {
            Ok(()) => self.report(ConverterEvent::Sent(rule.output)),
            Err(e) => warn!(
                "converter {}: failed to transmit {}: {e}",
                self.id, rule.output
            ),
        }
        ControlFlow::Continue(())
    }

    /// Sleeps for `duration` unless stop fires first.  Returns `true` if the
    /// converter should stop.
    async fn pause(&self, duration: Duration, stop: &mut StopSignal) -> bool {
        if duration.is_zero() {
            return stop.is_stopped();
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = stop.stopped() => true,
        }
    }

    fn report(&self, event: ConverterEvent) {
        if self.is_debug_mode() {
            self.sink.emit(&event);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
