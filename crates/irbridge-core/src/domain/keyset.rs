//! Named keys of one remote control.
//!
//! A [`KeySet`] describes a remote: the protocol it speaks, its bit width,
//! and for every button the value sent on a press (and optionally on
//! key-down and key-release, for remotes that distinguish them).
//!
//! Key sets are the input to [`SignalRuleTable::derive`], which pairs two
//! remotes by button name.  Anything that can answer "which keys do you have
//! and what does pressing one send" can take part through the [`KeySource`]
//! trait.
//!
//! [`SignalRuleTable::derive`]: super::rule_table::SignalRuleTable::derive

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::protocol::{self, ProtocolId};
use super::signal::Signal;

/// Errors produced while editing or validating a [`KeySet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeySetError {
    #[error("key '{0}' is already defined")]
    DuplicateKey(String),

    #[error("key '{name}' has an empty press value")]
    EmptyValue { name: String },
}

/// Read access to a named set of keys.
pub trait KeySource {
    /// Returns `true` if a key called `name` exists.
    fn has_key(&self, name: &str) -> bool;

    /// All key names, in definition order.
    fn available_keys(&self) -> Vec<&str>;

    /// Signal sent when key `name` is pressed, or `None` if the key is unknown.
    fn key_press(&self, name: &str) -> Option<Signal>;
}

/// One button of a remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub name: String,
    /// Hex value sent on a normal press.
    pub press: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
}

impl KeyEntry {
    pub fn new(name: impl Into<String>, press: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            press: press.into(),
            down: None,
            release: None,
        }
    }
}

/// Which of a key's values a received signal is compared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyEvent {
    #[default]
    Press,
    Down,
    Release,
}

impl KeyEvent {
    /// Parses `press`, `down` or `release`, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "press" => Some(Self::Press),
            "down" => Some(Self::Down),
            "release" => Some(Self::Release),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Press => "press",
            Self::Down => "down",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote control profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    pub device_name: String,
    pub protocol_id: ProtocolId,
    /// Human-readable protocol name.  Falls back to the firmware table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_name: Option<String>,
    #[serde(default)]
    pub bits: u16,
    #[serde(default)]
    pub keys: Vec<KeyEntry>,
}

impl KeySet {
    /// Creates a key set without any keys.
    pub fn new(device_name: impl Into<String>, protocol_id: ProtocolId, bits: u16) -> Self {
        Self {
            device_name: device_name.into(),
            protocol_id,
            protocol_name: None,
            bits,
            keys: Vec::new(),
        }
    }

    /// The configured protocol name, or the well-known name of `protocol_id`.
    pub fn protocol_name(&self) -> Option<&str> {
        self.protocol_name
            .as_deref()
            .or_else(|| protocol::protocol_name(self.protocol_id))
    }

    fn entry(&self, name: &str) -> Option<&KeyEntry> {
        self.keys.iter().find(|k| k.name == name)
    }

    fn signal(&self, value: &str) -> Signal {
        Signal::new(self.protocol_id, value, self.bits)
    }

    /// Signal sent when the key goes down, for remotes that report it.
    pub fn key_down(&self, name: &str) -> Option<Signal> {
        self.entry(name)?.down.as_deref().map(|v| self.signal(v))
    }

    /// Signal sent when the key is released, for remotes that report it.
    pub fn key_release(&self, name: &str) -> Option<Signal> {
        self.entry(name)?.release.as_deref().map(|v| self.signal(v))
    }

    /// Signal the key sends for `event`.
    pub fn key_event(&self, name: &str, event: KeyEvent) -> Option<Signal> {
        match event {
            KeyEvent::Press => self.key_press(name),
            KeyEvent::Down => self.key_down(name),
            KeyEvent::Release => self.key_release(name),
        }
    }

    /// Returns `true` if `signal` is what key `name` sends for `event`.
    ///
    /// Protocol and value must both match; bit widths are ignored like
    /// everywhere else signals are compared.
    pub fn matches_key(&self, name: &str, event: KeyEvent, signal: &Signal) -> bool {
        self.key_event(name, event).is_some_and(|own| own == *signal)
    }

    /// Appends a key.
    ///
    /// # Errors
    ///
    /// [`KeySetError::DuplicateKey`] if a key with the same name exists.
    pub fn add_key(&mut self, entry: KeyEntry) -> Result<(), KeySetError> {
        if self.has_key(&entry.name) {
            return Err(KeySetError::DuplicateKey(entry.name));
        }
        self.keys.push(entry);
        Ok(())
    }

    /// Removes and returns the key called `name`.
    pub fn remove_key(&mut self, name: &str) -> Option<KeyEntry> {
        let idx = self.keys.iter().position(|k| k.name == name)?;
        Some(self.keys.remove(idx))
    }

    /// Checks a key set loaded from disk.
    ///
    /// Deserialization cannot enforce unique names, so a hand-edited file may
    /// define a key twice.  Lookups would silently use the first definition.
    pub fn validate(&self) -> Result<(), KeySetError> {
        let mut seen = HashSet::new();
        for key in &self.keys {
            if key.press.trim().is_empty() {
                return Err(KeySetError::EmptyValue {
                    name: key.name.clone(),
                });
            }
            if !seen.insert(key.name.as_str()) {
                return Err(KeySetError::DuplicateKey(key.name.clone()));
            }
        }
        Ok(())
    }
}

impl KeySource for KeySet {
    fn has_key(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    fn available_keys(&self) -> Vec<&str> {
        self.keys.iter().map(|k| k.name.as_str()).collect()
    }

    fn key_press(&self, name: &str) -> Option<Signal> {
        self.entry(name).map(|k| self.signal(&k.press))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::protocol::{NEC, RC6};

    fn philips() -> KeySet {
        let mut set = KeySet::new("PHILIPS_DVP3350", RC6, 20);
        set.add_key(KeyEntry::new("POWER", "1000C")).unwrap();
        set.add_key(KeyEntry {
            name: "PLAY".to_string(),
            press: "1002C".to_string(),
            down: Some("1002D".to_string()),
            release: Some("1002E".to_string()),
        })
        .unwrap();
        set
    }

    #[test]
    fn test_key_press_builds_signal_from_set_protocol_and_bits() {
        let set = philips();
        let signal = set.key_press("POWER").unwrap();
        assert_eq!(signal, Signal::new(RC6, "1000C", 20));
        assert_eq!(signal.bits, 20);
    }

    #[test]
    fn test_key_down_and_release_are_optional() {
        let set = philips();
        assert_eq!(set.key_down("PLAY").unwrap().value, "1002D");
        assert_eq!(set.key_release("PLAY").unwrap().value, "1002E");
        assert!(set.key_down("POWER").is_none());
        assert!(set.key_release("MISSING").is_none());
    }

    #[test]
    fn test_unknown_key_has_no_press_signal() {
        let set = philips();
        assert!(!set.has_key("EJECT"));
        assert!(set.key_press("EJECT").is_none());
    }

    #[test]
    fn test_available_keys_in_definition_order() {
        assert_eq!(philips().available_keys(), vec!["POWER", "PLAY"]);
    }

    #[test]
    fn test_add_duplicate_key_is_rejected() {
        // Arrange
        let mut set = philips();

        // Act
        let err = set.add_key(KeyEntry::new("POWER", "FFFFF")).unwrap_err();

        // Assert
        assert_eq!(err, KeySetError::DuplicateKey("POWER".to_string()));
        assert_eq!(set.key_press("POWER").unwrap().value, "1000C");
    }

    #[test]
    fn test_remove_key_returns_entry() {
        let mut set = philips();
        let removed = set.remove_key("POWER").unwrap();
        assert_eq!(removed.press, "1000C");
        assert!(!set.has_key("POWER"));
        assert!(set.remove_key("POWER").is_none());
    }

    #[test]
    fn test_matches_key_per_event() {
        // Arrange
        let set = philips();
        let play_down = Signal::new(RC6, "1002D", 20);

        // Act / Assert
        assert!(set.matches_key("PLAY", KeyEvent::Down, &play_down));
        assert!(!set.matches_key("PLAY", KeyEvent::Press, &play_down));
        assert!(set.matches_key("PLAY", KeyEvent::Release, &Signal::new(RC6, "1002E", 16)));
        assert!(!set.matches_key("POWER", KeyEvent::Down, &Signal::new(RC6, "1000C", 20)));
        assert!(!set.matches_key("POWER", KeyEvent::Press, &Signal::new(NEC, "1000C", 20)));
        assert!(!set.matches_key("EJECT", KeyEvent::Press, &play_down));
    }

    #[test]
    fn test_key_event_names() {
        assert_eq!(KeyEvent::from_name("Release"), Some(KeyEvent::Release));
        assert_eq!(KeyEvent::from_name("press"), Some(KeyEvent::Press));
        assert_eq!(KeyEvent::from_name("hold"), None);
        assert_eq!(KeyEvent::default().to_string(), "press");
    }

    #[test]
    fn test_validate_reports_duplicates_and_empty_values() {
        let mut set = KeySet::new("dup", NEC, 32);
        set.keys.push(KeyEntry::new("POWER", "E0E040BF"));
        set.keys.push(KeyEntry::new("POWER", "E0E0F00F"));
        assert_eq!(
            set.validate(),
            Err(KeySetError::DuplicateKey("POWER".to_string()))
        );

        let mut set = KeySet::new("empty", NEC, 32);
        set.keys.push(KeyEntry::new("MUTE", " "));
        assert!(matches!(set.validate(), Err(KeySetError::EmptyValue { .. })));

        assert!(philips().validate().is_ok());
    }

    #[test]
    fn test_protocol_name_falls_back_to_firmware_table() {
        let mut set = KeySet::new("tv", NEC, 32);
        assert_eq!(set.protocol_name(), Some("NEC"));
        set.protocol_name = Some("NEC1".to_string());
        assert_eq!(set.protocol_name(), Some("NEC1"));
    }

    #[test]
    fn test_deserialize_from_toml() {
        // Arrange
        let text = r#"
device_name = "DAEWOO_HIFI"
protocol_id = 1
bits = 32

[[keys]]
name = "POWER"
press = "E0E040BF"

[[keys]]
name = "VOL_UP"
press = "E0E0E01F"
"#;

        // Act
        let set: KeySet = toml::from_str(text).expect("deserialize");

        // Assert
        assert_eq!(set.available_keys(), vec!["POWER", "VOL_UP"]);
        assert_eq!(set.key_press("VOL_UP").unwrap(), Signal::new(NEC, "E0E0E01F", 32));
        assert!(set.protocol_name.is_none());
    }
}
