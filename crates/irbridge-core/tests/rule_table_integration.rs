//! Integration tests for the irbridge-core rule table.
//!
//! These tests drive the public API the way the relay does: a table is derived
//! from two key sets loaded as TOML, extended by hand, and then queried with
//! signals parsed from device frames.

use irbridge_core::domain::protocol::{NEC, RC6, SONY};
use irbridge_core::{parse_signal_frame, KeySet, KeySource, Signal, SignalRule, SignalRuleTable};

const PHILIPS_DVP: &str = r#"
device_name = "PHILIPS_DVP3350"
protocol_id = 4
bits = 20

[[keys]]
name = "POWER"
press = "1000C"

[[keys]]
name = "VOL_UP"
press = "10010"

[[keys]]
name = "EJECT"
press = "10042"
"#;

const DAEWOO_HIFI: &str = r#"
device_name = "DAEWOO_HIFI"
protocol_id = 1
bits = 32

[[keys]]
name = "MUTE"
press = "E0E0F00F"

[[keys]]
name = "POWER"
press = "E0E040BF"

[[keys]]
name = "VOL_UP"
press = "E0E0E01F"
"#;

fn load(text: &str) -> KeySet {
    toml::from_str(text).expect("key set must deserialize")
}

#[test]
fn test_derive_produces_one_rule_per_common_key() {
    // Arrange
    let source = load(PHILIPS_DVP);
    let target = load(DAEWOO_HIFI);

    // Act
    let table = SignalRuleTable::derive(&source, &target, 20);

    // Assert
    let common: Vec<&str> = target
        .available_keys()
        .into_iter()
        .filter(|k| source.has_key(k))
        .collect();
    assert_eq!(table.len(), common.len());
    for key in common {
        let input = source.key_press(key).unwrap();
        let rule = table.lookup_signal(&input);
        assert_eq!(rule.output, target.key_press(key).unwrap());
        assert_eq!(rule.delay_ms, 20);
        assert!(rule.enabled);
    }
    assert!(!table.contains(RC6, "10042"), "EJECT exists only on the source");
}

#[test]
fn test_derived_table_resolves_parsed_device_frames() {
    let table = SignalRuleTable::derive(&load(PHILIPS_DVP), &load(DAEWOO_HIFI), 0);

    let received = parse_signal_frame("1000C,4,20\r\n").unwrap();
    let rule = table.lookup_signal(&received);

    assert_eq!(rule.output, Signal::new(NEC, "E0E040BF", 32));
    assert_eq!(rule.output.bits, 32);
}

#[test]
fn test_every_rule_resolves_to_its_output() {
    // Arrange
    let mut table = SignalRuleTable::derive(&load(PHILIPS_DVP), &load(DAEWOO_HIFI), 0);
    table
        .add_with_options(Signal::new(NEC, "E0E0D02F", 32), Signal::new(SONY, "290", 12), 50, false)
        .unwrap();

    // Act / Assert
    for rule in table.iter() {
        assert_eq!(table.lookup_signal(&rule.input).output, rule.output);
    }
    assert_eq!(
        table.lookup_signal(&Signal::new(SONY, "FFF", 12)).output,
        Signal::empty()
    );
}

#[test]
fn test_second_add_with_same_input_is_rejected() {
    // Arrange
    let mut table = SignalRuleTable::new();
    let input = Signal::new(NEC, "E0E040BF", 32);

    // Act
    let first = table.add_mapping(input.clone(), Signal::new(SONY, "A90", 12));
    let second = table.add_mapping(input.clone(), Signal::new(SONY, "290", 12));

    // Assert
    assert!(first.is_ok());
    let rejected = second.unwrap_err();
    assert_eq!(rejected.marker(), SignalRule::rejected());
    assert!(!rejected.marker().enabled);
    assert_eq!(table.len(), 1);
    assert_eq!(table.lookup_signal(&input).output.value, "A90");
}

#[test]
fn test_repeated_colliding_adds_never_change_lookup() {
    let mut table = SignalRuleTable::new();
    let input = Signal::new(NEC, "E0E040BF", 32);
    table.add_mapping(input.clone(), Signal::new(SONY, "A90", 12)).unwrap();

    for i in 0..10u64 {
        let _ = table.add_with_options(input.clone(), Signal::new(SONY, format!("{i}"), 12), i, i % 2 == 0);
        let rule = table.lookup(NEC, "E0E040BF");
        assert_eq!(rule.output.value, "A90");
        assert_eq!((rule.delay_ms, rule.enabled), (0, true));
    }
}

#[test]
fn test_remove_then_lookup_yields_empty_rule() {
    let mut table = SignalRuleTable::derive(&load(PHILIPS_DVP), &load(DAEWOO_HIFI), 0);

    let removed = table.remove(RC6, "1000C");

    assert_eq!(removed.output.value, "E0E040BF");
    assert_eq!(table.lookup(RC6, "1000C"), SignalRule::empty());
    assert!(table.lookup(RC6, "1000C").is_empty());
}
