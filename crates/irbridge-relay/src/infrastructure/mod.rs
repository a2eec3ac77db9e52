//! Infrastructure layer for the relay.
//!
//! Contains adapters to the outside world: the IR transceiver link and the
//! TOML files that configure the relay.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `irbridge_core`, but MUST NOT be imported by the `application` or domain
//! layers.
//!
//! # Sub-modules
//!
//! - **`transceiver`** – Implementations of the
//!   [`Transceiver`](crate::application::convert_signals::Transceiver) trait.
//!   `LineLinkTransceiver` speaks the device's line protocol over a serial
//!   device node or a TCP serial bridge; `MockTransceiver` is a scripted
//!   stand-in for tests.
//!
//! - **`storage`** – Relay configuration, key-set files and rule profiles.

pub mod storage;
pub mod transceiver;
