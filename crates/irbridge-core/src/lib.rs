//! # irbridge-core
//!
//! Shared library for IR-Bridge containing the signal value model, the
//! translation rule table, key-set descriptions of remote controls, and the
//! line protocol spoken by the external IR transceiver.
//!
//! This crate is used by the relay application and by tooling that builds
//! rule tables offline.  It has zero dependencies on serial ports, sockets,
//! timers, or the async runtime.
//!
//! # Architecture overview
//!
//! IR-Bridge is a universal-remote relay: an IR transceiver receives a
//! command from one remote control, the relay looks the command up in a rule
//! table, and the transceiver re-emits the equivalent command in the dialect
//! of a second device.
//!
//! - **`domain`** – Pure business logic.  [`Signal`] is one IR command
//!   identified by protocol and hex value; [`SignalRule`] maps an input signal
//!   to an output signal with a forwarding delay and an enabled flag;
//!   [`SignalRuleTable`] indexes rules by their input.  [`KeySet`] describes
//!   the named keys of one remote and lets a table be derived from two remotes.
//!
//! - **`protocol`** – How signals and commands travel as text lines between
//!   the host and the transceiver firmware.

pub mod domain;
pub mod protocol;

pub use domain::keyset::{KeyEntry, KeyEvent, KeySet, KeySetError, KeySource};
pub use domain::protocol::ProtocolId;
pub use domain::rule::{RuleKey, SignalRule};
pub use domain::rule_table::{RuleRejected, SignalRuleTable};
pub use domain::signal::Signal;
pub use protocol::frame::{
    encode_command, is_ack, parse_signal_frame, DeviceCommand, DeviceSetting, FrameError,
};
