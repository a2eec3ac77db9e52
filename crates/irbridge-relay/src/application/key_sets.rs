//! Key-set tools driven by the transceiver.
//!
//! - [`learn_keyset`] records a new remote: for every key name of a template
//!   it waits for one received signal and stores its value.
//! - [`identify_key`] waits for one press of a named key and reports which of
//!   the known key sets send exactly that signal for it.

use std::borrow::Borrow;

use irbridge_core::{KeyEntry, KeyEvent, KeySet, KeySetError, KeySource, Signal};
use thiserror::Error;
use tracing::{info, warn};

use super::convert_signals::{Transceiver, TransceiverError};

/// Error type for [`learn_keyset`].
#[derive(Debug, Error)]
pub enum LearnError {
    #[error("template has no keys to learn")]
    EmptyTemplate,

    #[error(transparent)]
    KeySet(#[from] KeySetError),

    #[error(transparent)]
    Transceiver(#[from] TransceiverError),
}

/// Builds a key set named `device_name` with the key names of `template`.
///
/// Protocol and bit width come from the first received signal.  A signal of
/// another protocol, or one already learned for an earlier key (a held
/// button repeating), is logged and the key is asked for again.  `prompt` is
/// called with each key name before waiting for it.
pub async fn learn_keyset<T, F>(
    transceiver: &dyn Transceiver,
    template: &T,
    device_name: &str,
    mut prompt: F,
) -> Result<KeySet, LearnError>
where
    T: KeySource + ?Sized,
    F: FnMut(&str),
{
    let names: Vec<String> = template
        .available_keys()
        .into_iter()
        .map(str::to_owned)
        .collect();
    if names.is_empty() {
        return Err(LearnError::EmptyTemplate);
    }

    transceiver.enable_receiver(true).await?;

    let mut learned: Option<KeySet> = None;
    for name in names {
        prompt(&name);
        let signal = loop {
            let signal = transceiver.receive().await?;
            match learned.as_ref().and_then(|set| rejection(set, &signal)) {
                Some(reason) => warn!("ignoring {signal} for key {name}: {reason}"),
                None => break signal,
            }
        };
        info!("learned {name} = {}", signal.value);
        let set = learned
            .get_or_insert_with(|| KeySet::new(device_name, signal.protocol, signal.bits));
        set.add_key(KeyEntry::new(name, signal.value))?;
    }
    learned.ok_or(LearnError::EmptyTemplate)
}

fn rejection(set: &KeySet, signal: &Signal) -> Option<String> {
    if signal.protocol != set.protocol_id {
        return Some(format!("expected protocol {}", set.protocol_id));
    }
    set.keys
        .iter()
        .find(|key| key.press == signal.value)
        .map(|key| format!("already learned for {}", key.name))
}

/// Outcome of [`identify_key`].
#[derive(Debug)]
pub struct KeyMatches<'a, S> {
    /// The signal the key sent.
    pub signal: Signal,
    /// Candidates whose key sends `signal` for the requested event.
    pub matches: Vec<&'a S>,
}

/// Waits for one signal and returns the candidates in which `key` sends it
/// for `event`.
pub async fn identify_key<'a, S>(
    transceiver: &dyn Transceiver,
    candidates: &'a [S],
    key: &str,
    event: KeyEvent,
) -> Result<KeyMatches<'a, S>, TransceiverError>
where
    S: Borrow<KeySet>,
{
    transceiver.enable_receiver(true).await?;
    let signal = transceiver.receive().await?;
    let matches = candidates
        .iter()
        .filter(|c| <S as Borrow<KeySet>>::borrow(c).matches_key(key, event, &signal))
        .collect();
    Ok(KeyMatches { signal, matches })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
