//! Rule profile files.
//!
//! A rule profile is the on-disk form of a [`SignalRuleTable`]: an optional
//! name plus the rules in table order.
//!
//! ```toml
//! name = "living room"
//!
//! [[rules]]
//! input = { protocol = 4, value = "1000C", bits = 20 }
//! output = { protocol = 1, value = "E0E040BF", bits = 32 }
//! delay_ms = 0
//! enabled = true
//! ```

use std::path::Path;

use irbridge_core::{SignalRule, SignalRuleTable};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::config::{read_file, write_toml, ConfigError};

/// Serialised form of a rule table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub rules: Vec<SignalRule>,
}

impl RuleProfile {
    pub fn from_table(table: &SignalRuleTable, name: Option<&str>) -> Self {
        Self {
            name: name.map(str::to_string),
            rules: table.iter().cloned().collect(),
        }
    }

    /// Builds a table, keeping the first of several rules with the same input.
    pub fn into_table(self) -> SignalRuleTable {
        let origin = self.name.unwrap_or_else(|| "rule profile".to_string());
        let mut table = SignalRuleTable::new();
        for rule in self.rules {
            if let Err(rejected) = table.add(rule) {
                warn!("{origin}: duplicate rule for {} skipped", rejected.key);
            }
        }
        table
    }
}

/// Loads the rule profile at `path` into a table.
///
/// Rules whose input is already mapped by an earlier rule in the file are
/// logged and skipped.
pub fn load_rule_file(path: &Path) -> Result<SignalRuleTable, ConfigError> {
    let profile: RuleProfile = toml::from_str(&read_file(path)?)?;
    let table = profile.into_table();
    info!("loaded {} rule(s) from {}", table.len(), path.display());
    Ok(table)
}

/// Renders `table` as a rule profile.
pub fn rule_file_to_string(
    table: &SignalRuleTable,
    name: Option<&str>,
) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(&RuleProfile::from_table(table, name))?)
}

/// Writes `table` to `path` as a rule profile, in table order.
pub fn save_rule_file(
    path: &Path,
    table: &SignalRuleTable,
    name: Option<&str>,
) -> Result<(), ConfigError> {
    write_toml(path, &RuleProfile::from_table(table, name))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
