//! Translation rule entity.
//!
//! A [`SignalRule`] says "when `input` is received, transmit `output` after
//! `delay_ms`, provided the rule is `enabled`".
//!
//! ```text
//!  ---------------------------------------
//! |  INPUT  |  OUTPUT  |  DELAY  | ENABLED |
//!  ---------------------------------------
//! ```
//!
//! # Identity
//!
//! A rule is identified by its input signal alone.  Two rules with the same
//! input `(protocol, value)` are the same rule even if their outputs, delays
//! or enabled flags differ.  The rule table relies on this to refuse a second
//! rule for an input it already translates.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::protocol::ProtocolId;
use super::signal::Signal;

/// Composite key of a rule: the protocol and value of its input signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    pub protocol: ProtocolId,
    pub value: String,
}

impl RuleKey {
    pub fn new(protocol: ProtocolId, value: impl Into<String>) -> Self {
        Self {
            protocol,
            value: value.into(),
        }
    }

    /// Key addressing rules whose input equals `signal`.
    pub fn from_signal(signal: &Signal) -> Self {
        Self::new(signal.protocol, signal.value.clone())
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.protocol, self.value)
    }
}

/// One translation entry of a [`SignalRuleTable`](super::rule_table::SignalRuleTable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRule {
    /// Signal that triggers the rule.
    pub input: Signal,
    /// Signal transmitted when the rule fires.
    pub output: Signal,
    /// Pause before transmitting `output`, in milliseconds.
    #[serde(default)]
    pub delay_ms: u64,
    /// When `false` the rule still resolves but nothing is transmitted.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SignalRule {
    /// Enabled rule with no forwarding delay.
    pub fn new(input: Signal, output: Signal) -> Self {
        Self::with_options(input, output, 0, true)
    }

    /// Enabled rule forwarding after `delay_ms`.
    pub fn with_delay(input: Signal, output: Signal, delay_ms: u64) -> Self {
        Self::with_options(input, output, delay_ms, true)
    }

    /// Rule with no forwarding delay and an explicit enabled flag.
    pub fn with_enabled(input: Signal, output: Signal, enabled: bool) -> Self {
        Self::with_options(input, output, 0, enabled)
    }

    pub fn with_options(input: Signal, output: Signal, delay_ms: u64, enabled: bool) -> Self {
        Self {
            input,
            output,
            delay_ms,
            enabled,
        }
    }

    /// The empty rule: two empty signals, returned for lookup misses.
    pub fn empty() -> Self {
        Self::new(Signal::empty(), Signal::empty())
    }

    /// The disabled empty rule used as the collision marker.
    pub fn rejected() -> Self {
        Self::with_enabled(Signal::empty(), Signal::empty(), false)
    }

    /// Returns `true` if both signals are empty.
    pub fn is_empty(&self) -> bool {
        self.input.is_empty() && self.output.is_empty()
    }

    /// Key of this rule, derived from the input signal only.
    pub fn key(&self) -> RuleKey {
        RuleKey::from_signal(&self.input)
    }

    /// Returns `true` when firing this rule transmits something.
    pub fn forwards(&self) -> bool {
        self.enabled && !self.output.is_empty()
    }
}

impl PartialEq for SignalRule {
    fn eq(&self, other: &Self) -> bool {
        self.input == other.input
    }
}

impl Eq for SignalRule {}

impl Hash for SignalRule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.input.hash(state);
    }
}

impl fmt::Display for SignalRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[ IN: {}, OUT: {}, DELAY: {}, ENABLED: {} ]",
            self.input, self.output, self.delay_ms, self.enabled
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
