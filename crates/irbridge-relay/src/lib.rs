//! irbridge-relay library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the relay do? (for beginners)
//!
//! Many pieces of consumer electronics only understand the remote control
//! they shipped with.  The relay lets one remote drive another device:
//!
//! 1. An IR transceiver (a microcontroller running an IRLib2 sketch) decodes
//!    what the user's remote sends and reports it over a serial line.
//! 2. The relay looks the command up in a rule table.
//! 3. If a rule matches, the relay waits for the remote's repeat burst to
//!    settle, then asks the transceiver to emit the translated command in the
//!    other device's protocol.
//!
//! The rule table can be derived from two key sets (one per remote), loaded
//! from a rule profile, or written inline in the configuration file.

/// Application layer: the converter use case and its collaborator traits.
pub mod application;

/// Infrastructure layer: transceiver adapters and file storage.
pub mod infrastructure;
