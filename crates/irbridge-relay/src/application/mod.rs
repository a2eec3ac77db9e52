//! Application layer use cases for the relay.
//!
//! # What use cases does the relay have?
//!
//! - **`convert_signals`** – The long-running converter.  Receives signals
//!   from a [`Transceiver`](convert_signals::Transceiver), resolves them
//!   against the owned rule table, and transmits the translated signal after
//!   the settle and forwarding delays.  The transceiver is injected at
//!   construction time.
//!
//! - **`build_rules`** – Merges rule layers (derived from key sets, loaded
//!   from a profile, written inline) into one table with first-wins
//!   semantics, reporting every rule that lost a collision.
//!
//! - **`key_sets`** – Learning a remote's key set from received signals and
//!   searching stored key sets for the one a pressed key belongs to.
//!
//! - **`events`** – Observability events emitted by the converter and the
//!   sinks that consume them.
//!
//! - **`stop`** – The cancellation handle/signal pair used to stop a worker.

pub mod build_rules;
pub mod convert_signals;
pub mod events;
pub mod key_sets;
pub mod stop;
