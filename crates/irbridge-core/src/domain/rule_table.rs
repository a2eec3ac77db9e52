//! The signal rule table.
//!
//! [`SignalRuleTable`] maps the input `(protocol, value)` of each rule to the
//! rule itself.  At most one rule exists per input.
//!
//! # No-overwrite policy
//!
//! Adding a rule whose input is already translated is rejected and leaves the
//! table unchanged, so a later rule can never silently shadow an earlier one.
//! Replacing a rule takes an explicit [`remove`](SignalRuleTable::remove)
//! followed by an [`add`](SignalRuleTable::add).
//!
//! # Misses are not errors
//!
//! [`lookup`](SignalRuleTable::lookup) and [`remove`](SignalRuleTable::remove)
//! return [`SignalRule::empty`] for an unknown input.  The converter treats
//! the empty output as "nothing to send".
//!
//! # Ordering
//!
//! Lookups are hash-based.  Each entry also records an insertion sequence
//! number so that [`iter`](SignalRuleTable::iter) and exports list rules in
//! the order they were added.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use super::keyset::KeySource;
use super::protocol::ProtocolId;
use super::rule::{RuleKey, SignalRule};
use super::signal::Signal;

/// Returned by [`SignalRuleTable::add`] when the input key is already taken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("a rule for input {key} already exists")]
pub struct RuleRejected {
    /// Key of the rule that was refused.
    pub key: RuleKey,
}

impl RuleRejected {
    /// The disabled empty rule, for callers that want a sentinel value
    /// instead of an error.
    pub fn marker(&self) -> SignalRule {
        SignalRule::rejected()
    }
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    rule: SignalRule,
}

/// Keyed collection of [`SignalRule`]s.
#[derive(Debug, Clone, Default)]
pub struct SignalRuleTable {
    rules: HashMap<RuleKey, Entry>,
    next_seq: u64,
}

impl SignalRuleTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `rule` unless a rule with the same input already exists.
    ///
    /// Returns a copy of the stored rule on success.
    ///
    /// # Errors
    ///
    /// Returns [`RuleRejected`] on an input-key collision; the existing rule
    /// is kept untouched.
    pub fn add(&mut self, rule: SignalRule) -> Result<SignalRule, RuleRejected> {
        let key = rule.key();
        if self.rules.contains_key(&key) {
            debug!("rejected rule for already mapped input {key}");
            return Err(RuleRejected { key });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.rules.insert(
            key,
            Entry {
                seq,
                rule: rule.clone(),
            },
        );
        Ok(rule)
    }

    /// Adds an enabled rule with no forwarding delay.
    pub fn add_mapping(&mut self, input: Signal, output: Signal) -> Result<SignalRule, RuleRejected> {
        self.add(SignalRule::new(input, output))
    }

    /// Adds an enabled rule forwarding after `delay_ms`.
    pub fn add_with_delay(
        &mut self,
        input: Signal,
        output: Signal,
        delay_ms: u64,
    ) -> Result<SignalRule, RuleRejected> {
        self.add(SignalRule::with_delay(input, output, delay_ms))
    }

    /// Adds a rule with no forwarding delay and an explicit enabled flag.
    pub fn add_with_enabled(
        &mut self,
        input: Signal,
        output: Signal,
        enabled: bool,
    ) -> Result<SignalRule, RuleRejected> {
        self.add(SignalRule::with_enabled(input, output, enabled))
    }

    pub fn add_with_options(
        &mut self,
        input: Signal,
        output: Signal,
        delay_ms: u64,
        enabled: bool,
    ) -> Result<SignalRule, RuleRejected> {
        self.add(SignalRule::with_options(input, output, delay_ms, enabled))
    }

    /// Returns the stored rule for a key, if any.
    pub fn get(&self, key: &RuleKey) -> Option<&SignalRule> {
        self.rules.get(key).map(|e| &e.rule)
    }

    /// Returns the rule translating `(protocol, value)`, or the empty rule.
    pub fn lookup(&self, protocol: ProtocolId, value: &str) -> SignalRule {
        self.get(&RuleKey::new(protocol, value))
            .cloned()
            .unwrap_or_else(SignalRule::empty)
    }

    /// Returns the rule translating `signal`, or the empty rule.
    pub fn lookup_signal(&self, signal: &Signal) -> SignalRule {
        self.get(&RuleKey::from_signal(signal))
            .cloned()
            .unwrap_or_else(SignalRule::empty)
    }

    pub fn contains(&self, protocol: ProtocolId, value: &str) -> bool {
        self.rules.contains_key(&RuleKey::new(protocol, value))
    }

    pub fn contains_signal(&self, signal: &Signal) -> bool {
        self.rules.contains_key(&RuleKey::from_signal(signal))
    }

    /// Returns `true` if a rule with the same input as `rule` is stored.
    pub fn contains_rule(&self, rule: &SignalRule) -> bool {
        self.rules.contains_key(&rule.key())
    }

    /// Removes and returns the rule translating `(protocol, value)`, or the
    /// empty rule if there was none.
    pub fn remove(&mut self, protocol: ProtocolId, value: &str) -> SignalRule {
        self.rules
            .remove(&RuleKey::new(protocol, value))
            .map(|e| e.rule)
            .unwrap_or_else(SignalRule::empty)
    }

    pub fn remove_signal(&mut self, signal: &Signal) -> SignalRule {
        self.remove(signal.protocol, &signal.value)
    }

    /// Number of rules in the table.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterates over the rules in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SignalRule> + '_ {
        let mut entries: Vec<&Entry> = self.rules.values().collect();
        entries.sort_unstable_by_key(|e| e.seq);
        entries.into_iter().map(|e| &e.rule)
    }

    /// Consumes the table, returning its rules in insertion order.
    pub fn into_rules(self) -> Vec<SignalRule> {
        let mut entries: Vec<Entry> = self.rules.into_values().collect();
        entries.sort_unstable_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.rule).collect()
    }

    /// Builds a table translating the keys two remotes have in common.
    ///
    /// Walks the key names of `target` in order; for each name `source` also
    /// has, adds an enabled rule from the source's press signal to the
    /// target's press signal with the given delay.  Names known to only one
    /// side are skipped.  If two source keys share a press signal, the first
    /// one wins.
    pub fn derive<S, T>(source: &S, target: &T, delay_ms: u64) -> Self
    where
        S: KeySource + ?Sized,
        T: KeySource + ?Sized,
    {
        let mut table = Self::new();
        for name in target.available_keys() {
            if !source.has_key(name) {
                continue;
            }
            let (Some(input), Some(output)) = (source.key_press(name), target.key_press(name))
            else {
                continue;
            };
            if let Err(rejected) = table.add(SignalRule::with_delay(input, output, delay_ms)) {
                debug!("key {name}: source signal already mapped ({rejected})");
            }
        }
        table
    }
}

impl FromIterator<SignalRule> for SignalRuleTable {
    /// Collects rules into a table; later rules colliding with earlier ones
    /// are dropped.
    fn from_iter<I: IntoIterator<Item = SignalRule>>(iter: I) -> Self {
        let mut table = Self::new();
        for rule in iter {
            let _ = table.add(rule);
        }
        table
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
