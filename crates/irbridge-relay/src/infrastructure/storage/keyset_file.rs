//! Key-set files: one remote control per TOML file.
//!
//! ```toml
//! device_name = "DAEWOO_HIFI"
//! protocol_id = 1
//! bits = 32
//!
//! [[keys]]
//! name = "POWER"
//! press = "E0E040BF"
//! ```

use std::borrow::Borrow;
use std::path::{Path, PathBuf};

use irbridge_core::KeySet;
use tracing::{debug, warn};

use super::config::{read_file, write_toml, ConfigError};

/// Reads and validates the key set stored at `path`.
///
/// # Errors
///
/// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`] for
/// malformed TOML and [`ConfigError::KeySet`] when the set defines a key
/// twice or has a key without a press value.
pub fn load_keyset(path: &Path) -> Result<KeySet, ConfigError> {
    let set: KeySet = toml::from_str(&read_file(path)?)?;
    set.validate().map_err(|source| ConfigError::KeySet {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        "loaded key set {} ({} keys) from {}",
        set.device_name,
        set.keys.len(),
        path.display()
    );
    Ok(set)
}

pub fn save_keyset(path: &Path, set: &KeySet) -> Result<(), ConfigError> {
    write_toml(path, set)
}

/// A key set found by [`list_keysets`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredKeySet {
    /// File name without the `.toml` extension.
    pub name: String,
    pub path: PathBuf,
    pub set: KeySet,
}

impl Borrow<KeySet> for StoredKeySet {
    fn borrow(&self) -> &KeySet {
        &self.set
    }
}

/// Loads every `*.toml` key set in `dir`, sorted by file name.
///
/// Files that fail to load are logged at `warn` and skipped.
///
/// # Errors
///
/// [`ConfigError::Io`] if `dir` cannot be read.
pub fn list_keysets(dir: &Path) -> Result<Vec<StoredKeySet>, ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut found = Vec::with_capacity(paths.len());
    for path in paths {
        match load_keyset(&path) {
            Ok(set) => found.push(StoredKeySet {
                name: path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path,
                set,
            }),
            Err(e) => warn!("skipping key set {}: {e}", path.display()),
        }
    }
    Ok(found)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
