//! Storage infrastructure: the relay's TOML files.
//!
//! Three kinds of file are read and written here:
//!
//! - **`config`** – the relay configuration (`relay.toml`): log level,
//!   converter timing, device link and where the rules come from.
//! - **`keyset_file`** – one remote control per file, keys listed by name.
//! - **`rule_file`** – a named rule profile, the serialised form of a
//!   [`SignalRuleTable`](irbridge_core::SignalRuleTable).
//!
//! All three share [`config::ConfigError`], so callers deal with a single
//! error type for anything that touches the disk.

pub mod config;
pub mod keyset_file;
pub mod rule_file;
