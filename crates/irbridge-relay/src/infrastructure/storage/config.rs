//! TOML-based configuration for the relay.
//!
//! The default location of the config file is platform dependent:
//! - Windows:  `%APPDATA%\IRBridge\relay.toml`
//! - Linux:    `~/.config/irbridge/relay.toml`
//! - macOS:    `~/Library/Application Support/IRBridge/relay.toml`
//!
//! Any other path can be passed on the command line.
//!
//! # What is in the file? (for beginners)
//!
//! ```toml
//! [relay]
//! log_level = "info"
//! debug_mode = false
//! settle_delay_ms = 300
//!
//! [device]
//! kind = "serial"
//! path = "/dev/ttyACM0"
//!
//! [mapping]
//! source_keyset = "keysets/PHILIPS_DVP3350.toml"
//! target_keyset = "keysets/DAEWOO_HIFI.toml"
//!
//! [[rules]]
//! input = { protocol = 1, value = "E0E040BF", bits = 32 }
//! output = { protocol = 2, value = "A90", bits = 12 }
//! ```
//!
//! Every section and every field may be left out; missing values fall back to
//! the defaults defined below via `#[serde(default = "some_fn")]`.  This keeps
//! a first run without any config file working, and lets older files load
//! after new fields are added.
//!
//! # Relative paths
//!
//! Key-set and rule-file paths in `[mapping]` are resolved against the
//! directory of the config file they were read from, so a config directory
//! can be moved as a whole.

use std::path::{Path, PathBuf};
use std::time::Duration;

use irbridge_core::{KeySetError, SignalRule};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::convert_signals::ConverterSettings;
use crate::infrastructure::transceiver::DeviceEndpoint;

/// Error type for every storage operation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value could not be serialized to TOML.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A key-set file parsed but is not usable.
    #[error("invalid key set {path}: {source}")]
    KeySet {
        path: PathBuf,
        #[source]
        source: KeySetError,
    },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    /// Inline rules, applied after the key-set and rule-file rules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<SignalRule>,
}

/// Converter behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Report every received, resolved and sent signal.
    #[serde(default)]
    pub debug_mode: bool,
    /// Pause between a matched input and its output.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Pause after a failed receive before trying again.
    #[serde(default = "default_receive_retry_ms")]
    pub receive_retry_ms: u64,
}

/// Kind of link to the IR transceiver.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Serial,
    Tcp,
}

/// Where the IR transceiver is and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    #[serde(default)]
    pub kind: DeviceKind,
    /// Serial device node, used when `kind = "serial"`.
    #[serde(default = "default_device_path")]
    pub path: PathBuf,
    /// `host:port` of a serial bridge, used when `kind = "tcp"`.
    #[serde(default = "default_device_address")]
    pub address: String,
    /// Switch the device's receive LED on after connecting.
    #[serde(default)]
    pub receiver_led: bool,
    /// How long to wait for the device to acknowledge a command.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

/// Sources of translation rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MappingConfig {
    /// Key set of the remote whose signals are received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_keyset: Option<PathBuf>,
    /// Key set of the device the translated signals are meant for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_keyset: Option<PathBuf>,
    /// Forwarding delay given to every rule derived from the key sets.
    #[serde(default)]
    pub forward_delay_ms: u64,
    /// Rule profile loaded after the derived rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_settle_delay_ms() -> u64 {
    300
}
fn default_receive_retry_ms() -> u64 {
    1000
}
fn default_device_path() -> PathBuf {
    PathBuf::from("/dev/ttyACM0")
}
fn default_device_address() -> String {
    "127.0.0.1:4000".to_string()
}
fn default_response_timeout_ms() -> u64 {
    2000
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            debug_mode: false,
            settle_delay_ms: default_settle_delay_ms(),
            receive_retry_ms: default_receive_retry_ms(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            kind: DeviceKind::default(),
            path: default_device_path(),
            address: default_device_address(),
            receiver_led: false,
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

impl RelayConfig {
    pub fn converter_settings(&self) -> ConverterSettings {
        ConverterSettings {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            receive_retry_interval: Duration::from_millis(self.receive_retry_ms),
        }
    }
}

impl DeviceConfig {
    /// The endpoint selected by `kind`.
    pub fn endpoint(&self) -> DeviceEndpoint {
        match self.kind {
            DeviceKind::Serial => DeviceEndpoint::Serial(self.path.clone()),
            DeviceKind::Tcp => DeviceEndpoint::Tcp(self.address.clone()),
        }
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl MappingConfig {
    /// Both key sets, when both are configured.
    pub fn keyset_pair(&self) -> Option<(&Path, &Path)> {
        Some((self.source_keyset.as_deref()?, self.target_keyset.as_deref()?))
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [
            &mut self.source_keyset,
            &mut self.target_keyset,
            &mut self.rules_file,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Path of the config file in the platform config directory.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(platform_config_dir()
        .ok_or(ConfigError::NoPlatformConfigDir)?
        .join("relay.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let mut cfg: AppConfig = toml::from_str(&content)?;
            if let Some(dir) = path.parent() {
                cfg.mapping.resolve_relative_to(dir);
            }
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    write_toml(path, config)
}

/// Serializes `value` and writes it to `path`.
pub(crate) fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(value)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads `path` to a string.
pub(crate) fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("IRBridge"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("irbridge"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("IRBridge")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
