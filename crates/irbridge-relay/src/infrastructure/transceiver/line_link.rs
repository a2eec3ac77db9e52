//! Transceiver adapter for the device's line-based text protocol.
//!
//! # How the link is driven
//!
//! One background task owns the read half and sorts every line the device
//! prints into one of three queues:
//!
//! ```text
//!                        ┌─ contains "250 OK" ───────────▶ responses
//! device ── lines ──▶ reader ─ passive mode ─────────────▶ raw frames
//!                        ├─ parses as HEX,PROTO,BITS ────▶ signals
//!                        └─ anything else ───────────────▶ responses
//! ```
//!
//! Commands are written under the writer lock and answered from the
//! `responses` queue, so a command issued from another task while the
//! converter is waiting in [`receive`](Transceiver::receive) still gets its
//! acknowledgement.  All three queues are tokio channels, which makes every
//! receiving operation cancel-safe.
//!
//! # Device state
//!
//! Receiver, receiver-LED and passive-listen flags are fields of the handle
//! and change only after the device acknowledged the matching command.
//!
//! The reader switches between decoded and raw routing on the acknowledgement
//! line itself, so the first lines after the switch already land in the
//! right queue even before [`set_passive_listen`](LineLinkTransceiver::set_passive_listen)
//! returns.
//!
//! # Line noise
//!
//! Bytes that are not UTF-8 (baud mismatch, board reset) only cost the line
//! they appear on; the reader logs and skips it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use irbridge_core::{
    encode_command, is_ack, parse_signal_frame, DeviceCommand, DeviceSetting, Signal,
};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, WriteHalf};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::convert_signals::{Transceiver, TransceiverError};

/// How long a command waits for the device's answer by default.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Passive-listen switch requested from the device and not acknowledged yet.
type PendingPassive = Arc<std::sync::Mutex<Option<bool>>>;

/// Reader-side routing state and the queues it fills.
struct LineRouter {
    signals: mpsc::UnboundedSender<Signal>,
    raw: mpsc::UnboundedSender<String>,
    responses: mpsc::UnboundedSender<String>,
    passive: bool,
    pending_passive: PendingPassive,
}

/// [`Transceiver`] speaking the IRLib2 sketch's line protocol.
pub struct LineLinkTransceiver<W> {
    writer: Mutex<W>,
    signals: Mutex<mpsc::UnboundedReceiver<Signal>>,
    raw: Mutex<mpsc::UnboundedReceiver<String>>,
    responses: Mutex<mpsc::UnboundedReceiver<String>>,
    passive: watch::Sender<bool>,
    pending_passive: PendingPassive,
    receiver_enabled: AtomicBool,
    receiver_led: AtomicBool,
    response_timeout: Duration,
    reader: JoinHandle<()>,
}

impl<W> LineLinkTransceiver<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps separate read and write halves of a device link and spawns the
    /// line reader.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<R>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (responses_tx, responses_rx) = mpsc::unbounded_channel();
        let pending_passive = PendingPassive::default();

        let router = LineRouter {
            signals: signals_tx,
            raw: raw_tx,
            responses: responses_tx,
            passive: false,
            pending_passive: Arc::clone(&pending_passive),
        };
        let reader = tokio::spawn(read_lines(reader, router));

        Self {
            writer: Mutex::new(writer),
            signals: Mutex::new(signals_rx),
            raw: Mutex::new(raw_rx),
            responses: Mutex::new(responses_rx),
            passive: watch::channel(false).0,
            pending_passive,
            receiver_enabled: AtomicBool::new(false),
            receiver_led: AtomicBool::new(false),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            reader,
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn is_receiver_enabled(&self) -> bool {
        self.receiver_enabled.load(Ordering::Relaxed)
    }

    pub fn is_receiver_led_on(&self) -> bool {
        self.receiver_led.load(Ordering::Relaxed)
    }

    /// Switches the device's receive-indicator LED.
    pub async fn set_receiver_led(&self, on: bool) -> Result<(), TransceiverError> {
        self.set(DeviceSetting::ReceiverLed, on).await?;
        self.receiver_led.store(on, Ordering::Relaxed);
        Ok(())
    }

    /// Switches passive-listen (sniffer) mode.
    ///
    /// While on, the device prints raw output instead of decoded signals,
    /// [`receive`](Transceiver::receive) suspends and transmitting is refused.
    /// Turning it off wakes suspended receivers.
    pub async fn set_passive_listen(&self, on: bool) -> Result<(), TransceiverError> {
        let line = encode_command(&DeviceCommand::Set {
            setting: DeviceSetting::PassiveListen,
            enabled: on,
        })?;
        self.exec(&line, Some(on)).await?;
        self.passive.send_replace(on);
        Ok(())
    }

    async fn set(&self, setting: DeviceSetting, enabled: bool) -> Result<(), TransceiverError> {
        let line = encode_command(&DeviceCommand::Set { setting, enabled })?;
        self.exec(&line, None).await
    }

    /// Writes one command line and waits for the device's answer.
    ///
    /// `passive_on_ack` is handed to the reader, which switches its routing
    /// when it sees the acknowledgement.
    async fn exec(
        &self,
        line: &str,
        passive_on_ack: Option<bool>,
    ) -> Result<(), TransceiverError> {
        let mut writer = self.writer.lock().await;
        let mut responses = self.responses.lock().await;

        while let Ok(stale) = responses.try_recv() {
            debug!("discarding unsolicited device output {stale:?}");
        }

        *lock_pending(&self.pending_passive) = passive_on_ack;
        let result = self.exchange(&mut *writer, &mut *responses, line).await;
        if result.is_err() {
            lock_pending(&self.pending_passive).take();
        }
        result
    }

    async fn exchange(
        &self,
        writer: &mut W,
        responses: &mut mpsc::UnboundedReceiver<String>,
        line: &str,
    ) -> Result<(), TransceiverError> {
        let command = line.trim_end().to_string();
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        debug!("sent device command {command:?}");

        match tokio::time::timeout(self.response_timeout, responses.recv()).await {
            Ok(Some(response)) if is_ack(&response) => Ok(()),
            Ok(Some(response)) => Err(TransceiverError::NotAcknowledged { command, response }),
            Ok(None) => Err(TransceiverError::Closed),
            Err(_) => Err(TransceiverError::Timeout {
                command,
                timeout: self.response_timeout,
            }),
        }
    }
}

impl<S> LineLinkTransceiver<WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Splits a bidirectional stream and wraps it.
    pub fn from_stream(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer)
    }
}

impl<W> Drop for LineLinkTransceiver<W> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl<W> Transceiver for LineLinkTransceiver<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn enable_receiver(&self, enabled: bool) -> Result<(), TransceiverError> {
        self.set(DeviceSetting::Receiver, enabled).await?;
        self.receiver_enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    fn is_passive_listen_mode(&self) -> bool {
        *self.passive.borrow()
    }

    async fn receive(&self) -> Result<Signal, TransceiverError> {
        let mut passive = self.passive.subscribe();
        // The sender lives in `self`, so this only returns once passive is off.
        let _ = passive.wait_for(|on| !*on).await;

        let mut signals = self.signals.lock().await;
        signals.recv().await.ok_or(TransceiverError::Closed)
    }

    /// Transmits `signal`, pausing the receiver around the send so the device
    /// does not decode its own emission.
    async fn transmit(&self, signal: &Signal) -> Result<(), TransceiverError> {
        if self.is_passive_listen_mode() {
            return Err(TransceiverError::PassiveListen);
        }
        let line = encode_command(&DeviceCommand::Transmit(signal.clone()))?;

        let resume_receiver = self.is_receiver_enabled();
        if resume_receiver {
            self.enable_receiver(false).await?;
        }

        let sent = self.exec(&line, None).await;

        if resume_receiver {
            let resumed = self.enable_receiver(true).await;
            if let Err(e) = &resumed {
                warn!("could not re-enable receiver after transmit: {e}");
            }
            return sent.and(resumed);
        }
        sent
    }

    async fn wait_for_frame(&self) -> Result<String, TransceiverError> {
        let mut raw = self.raw.lock().await;
        let mut passive = self.passive.subscribe();
        tokio::select! {
            biased;
            frame = raw.recv() => frame.ok_or(TransceiverError::Closed),
            _ = passive.wait_for(|on| !*on) => Err(TransceiverError::NotPassive),
        }
    }
}

// ── Reader task ───────────────────────────────────────────────────────────────

fn lock_pending(pending: &PendingPassive) -> std::sync::MutexGuard<'_, Option<bool>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn read_lines<R>(reader: R, mut router: LineRouter)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("device link reached end of stream");
                break;
            }
            Ok(_) => {
                let Some(line) = decode_line(&buf) else {
                    warn!(
                        "skipping undecodable device output {:?}",
                        String::from_utf8_lossy(&buf)
                    );
                    continue;
                };
                if !router.route(line) {
                    debug!("transceiver dropped; stopping line reader");
                    break;
                }
            }
            Err(e) => {
                warn!("device link read error: {e}");
                break;
            }
        }
    }
}

/// Strips the line terminator.  `None` if the line is not valid UTF-8.
fn decode_line(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    std::str::from_utf8(bytes).ok().map(str::to_owned)
}

impl LineRouter {
    /// Sorts one line into its queue.  Returns `false` once the receiving
    /// side is gone.
    fn route(&mut self, line: String) -> bool {
        if line.trim().is_empty() {
            return true;
        }
        if is_ack(&line) {
            if let Some(on) = lock_pending(&self.pending_passive).take() {
                self.passive = on;
            }
            return self.responses.send(line).is_ok();
        }
        if self.passive {
            return self.raw.send(line).is_ok();
        }
        match parse_signal_frame(&line) {
            Ok(signal) => self.signals.send(signal).is_ok(),
            Err(_) => self.responses.send(line).is_ok(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
