//! Assembles the converter's rule table from several sources.
//!
//! A deployment usually combines rules from up to three places, in this
//! priority order:
//!
//! 1. rules derived from two key sets (the bulk of a mapping),
//! 2. a rule profile file (hand-tuned exceptions kept separately),
//! 3. inline `[[rules]]` in the relay configuration.
//!
//! Layers are merged with the table's own first-wins policy.  A rule that
//! collides with an earlier one is dropped and reported, never applied.

use irbridge_core::{KeySource, RuleKey, SignalRule, SignalRuleTable};
use tracing::{info, warn};

/// One named group of rules.
#[derive(Debug, Clone)]
pub struct RuleLayer {
    /// Where the rules came from, used in log messages.
    pub origin: String,
    pub rules: Vec<SignalRule>,
}

impl RuleLayer {
    pub fn new(origin: impl Into<String>, rules: Vec<SignalRule>) -> Self {
        Self {
            origin: origin.into(),
            rules,
        }
    }

    /// Layer holding the rules [`SignalRuleTable::derive`] produces for two
    /// key sources.
    pub fn derived<S, T>(origin: impl Into<String>, source: &S, target: &T, delay_ms: u64) -> Self
    where
        S: KeySource + ?Sized,
        T: KeySource + ?Sized,
    {
        Self::new(
            origin,
            SignalRuleTable::derive(source, target, delay_ms).into_rules(),
        )
    }
}

/// A rule dropped because an earlier layer already translates its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowedRule {
    pub origin: String,
    pub key: RuleKey,
}

/// Result of [`merge_rule_layers`].
#[derive(Debug, Clone)]
pub struct MergedRules {
    pub table: SignalRuleTable,
    pub shadowed: Vec<ShadowedRule>,
}

/// Merges `layers` in order into a single table.
pub fn merge_rule_layers(layers: impl IntoIterator<Item = RuleLayer>) -> MergedRules {
    let mut table = SignalRuleTable::new();
    let mut shadowed = Vec::new();

    for layer in layers {
        let mut added = 0usize;
        for rule in layer.rules {
            match table.add(rule) {
                Ok(_) => added += 1,
                Err(rejected) => {
                    warn!(
                        "{}: ignoring rule for {}, input already mapped by an earlier rule",
                        layer.origin, rejected.key
                    );
                    shadowed.push(ShadowedRule {
                        origin: layer.origin.clone(),
                        key: rejected.key,
                    });
                }
            }
        }
        info!("{}: {added} rule(s) added", layer.origin);
    }

    MergedRules { table, shadowed }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use irbridge_core::domain::protocol::{NEC, RC6, SONY};
    use irbridge_core::{KeyEntry, KeySet, Signal};

    fn rule(input: &str, output: &str) -> SignalRule {
        SignalRule::new(Signal::new(NEC, input, 32), Signal::new(SONY, output, 12))
    }

    #[test]
    fn test_earlier_layer_wins_on_collision() {
        // Arrange
        let derived = RuleLayer::new("derived", vec![rule("01", "A"), rule("02", "B")]);
        let profile = RuleLayer::new("profile", vec![rule("02", "X"), rule("03", "C")]);
        let inline = RuleLayer::new("inline", vec![rule("03", "Y")]);

        // Act
        let merged = merge_rule_layers([derived, profile, inline]);

        // Assert
        assert_eq!(merged.table.len(), 3);
        assert_eq!(merged.table.lookup(NEC, "02").output.value, "B");
        assert_eq!(merged.table.lookup(NEC, "03").output.value, "C");
        assert_eq!(
            merged.shadowed,
            vec![
                ShadowedRule {
                    origin: "profile".to_string(),
                    key: RuleKey::new(NEC, "02")
                },
                ShadowedRule {
                    origin: "inline".to_string(),
                    key: RuleKey::new(NEC, "03")
                },
            ]
        );
    }

    #[test]
    fn test_merge_keeps_layer_order_in_table() {
        let merged = merge_rule_layers([
            RuleLayer::new("a", vec![rule("09", "A")]),
            RuleLayer::new("b", vec![rule("01", "B")]),
        ]);
        let order: Vec<&str> = merged.table.iter().map(|r| r.input.value.as_str()).collect();
        assert_eq!(order, vec!["09", "01"]);
    }

    #[test]
    fn test_derived_layer_uses_key_sets() {
        let mut source = KeySet::new("dvd", RC6, 20);
        source.add_key(KeyEntry::new("POWER", "1000C")).unwrap();
        let mut target = KeySet::new("hifi", NEC, 32);
        target.add_key(KeyEntry::new("POWER", "E0E040BF")).unwrap();

        let layer = RuleLayer::derived("key sets", &source, &target, 40);

        assert_eq!(layer.rules.len(), 1);
        assert_eq!(layer.rules[0].output, Signal::new(NEC, "E0E040BF", 32));
        assert_eq!(layer.rules[0].delay_ms, 40);
    }

    #[test]
    fn test_no_layers_gives_empty_table() {
        let merged = merge_rule_layers(Vec::new());
        assert!(merged.table.is_empty());
        assert!(merged.shadowed.is_empty());
    }
}
