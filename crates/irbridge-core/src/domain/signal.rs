//! The IR signal value type.
//!
//! A [`Signal`] is a single remote-control command as reported by the
//! transceiver firmware: a protocol number, the command value as hex text,
//! and the bit width of the command.
//!
//! # Why is the value a string?
//!
//! The firmware reports values such as `E0E040BF` or `00FF` and expects the
//! same text back when asked to transmit.  Leading zeros and letter case are
//! part of what a remote sends, so the value is kept as opaque text and is
//! never parsed as a number for comparison.  `"0A90"` and `"A90"` are two
//! different signals.
//!
//! # Identity
//!
//! Two signals are equal when their `protocol` and `value` are equal.  The
//! `bits` field is informational: a Sony command reported as 12 bits and the
//! same command reported as 15 bits still address the same rule.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::protocol::{self, ProtocolId};

/// One IR remote-control command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Protocol number as understood by the transceiver firmware.
    /// `0` is reserved for "unknown / no command".
    pub protocol: ProtocolId,
    /// Command value as hexadecimal text, compared verbatim.
    pub value: String,
    /// Bit width of the command.  Not part of equality.
    #[serde(default)]
    pub bits: u16,
}

impl Signal {
    /// Creates a signal from its three components.
    ///
    /// No validation is performed; well-formedness of `value` is the concern
    /// of whoever produced it.
    pub fn new(protocol: ProtocolId, value: impl Into<String>, bits: u16) -> Self {
        Self {
            protocol,
            value: value.into(),
            bits,
        }
    }

    /// Returns the canonical empty signal `(0, "0", 0)`.
    ///
    /// The empty signal stands for "no command": it is what a failed lookup
    /// resolves to, and a rule whose output is empty never transmits.
    pub fn empty() -> Self {
        Self::new(protocol::UNKNOWN, "0", 0)
    }

    /// Returns `true` if this signal equals [`Signal::empty`].
    pub fn is_empty(&self) -> bool {
        self.protocol == protocol::UNKNOWN && self.value == "0"
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        self.protocol == other.protocol && self.value == other.value
    }
}

impl Eq for Signal {}

impl Hash for Signal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.protocol.hash(state);
        self.value.hash(state);
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.protocol, self.value, self.bits)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
