//! Domain entities for IR-Bridge.
//!
//! This module contains pure business logic with no infrastructure
//! dependencies: nothing here opens a port, sleeps, or spawns a task.
//!
//! Leaves first:
//!
//! - [`signal`] – one IR command, compared by protocol and value only.
//! - [`protocol`] – well-known protocol identifiers of the transceiver firmware.
//! - [`rule`] – one translation entry, identified by its input signal.
//! - [`rule_table`] – the keyed rule collection with a no-overwrite policy.
//! - [`keyset`] – named keys of a remote control, used to derive tables.

pub mod keyset;
pub mod protocol;
pub mod rule;
pub mod rule_table;
pub mod signal;
