//! Registry snapshot via subscription drain
//!
//! The registry's key-value bucket exposes each entry as a message on
//! `$KV.<store>.<key>`. Discovery subscribes to `$KV.<store>.>` and pulls
//! buffered messages until a bounded wait passes with nothing received. That
//! timeout is the only end-of-data signal: there is no explicit marker.
//!
//! The result is a best-effort snapshot. Writes made by another process while
//! the drain runs may or may not be observed.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::error::Result;

/// Wait used when no explicit discovery wait is configured
pub const DEFAULT_DISCOVERY_WAIT: Duration = Duration::from_millis(500);

/// Subject prefix under which bucket `store` publishes its entries
pub fn key_prefix(store: &str) -> String {
    format!("$KV.{}", store)
}

/// Wildcard subject matching every entry of bucket `store`
pub fn wildcard_subject(store: &str) -> String {
    format!("{}.>", key_prefix(store))
}

/// A message delivered on a bucket subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub subject: String,
    pub payload: Vec<u8>,
}

impl RawEntry {
    pub fn new(subject: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
        }
    }
}

/// Registry contents as observed by discovery, keyed by logical name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingSet {
    entries: BTreeMap<String, Vec<u8>>,
}

impl ExistingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest payload seen for `name`. Empty payloads are tombstones.
    pub fn observe(&mut self, name: String, payload: Vec<u8>) {
        if payload.is_empty() {
            self.entries.remove(&name);
        } else {
            self.entries.insert(name, payload);
        }
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Vec<u8>)> for ExistingSet {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        let mut set = ExistingSet::new();
        for (name, payload) in iter {
            set.observe(name, payload);
        }
        set
    }
}

/// Drain `messages` into an [`ExistingSet`].
///
/// Stops when `wait` elapses without a message or when the stream ends. The
/// caller owns the subscription and must tear it down afterwards.
pub async fn drain<S>(mut messages: S, store: &str, wait: Duration) -> Result<ExistingSet>
where
    S: Stream<Item = Result<RawEntry>> + Unpin,
{
    let prefix = format!("{}.", key_prefix(store));
    let mut existing = ExistingSet::new();
    let mut received = 0usize;

    loop {
        let entry = match tokio::time::timeout(wait, messages.next()).await {
            Err(_) => {
                debug!("No message within {:?}, discovery complete", wait);
                break;
            }
            Ok(None) => {
                debug!("Discovery subscription closed");
                break;
            }
            Ok(Some(entry)) => entry?,
        };
        received += 1;

        match entry.subject.strip_prefix(&prefix) {
            Some(name) if !name.is_empty() => existing.observe(name.to_string(), entry.payload),
            _ => warn!("Ignoring message on unexpected subject '{}'", entry.subject),
        }
    }

    debug!(
        "Drained {} messages, {} live entries in '{}'",
        received,
        existing.len(),
        store
    );
    Ok(existing)
}
