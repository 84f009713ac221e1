//! In-memory registry store for dry runs and testing

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;

use super::RegistryStore;
use crate::error::{Result, StoreOp, SyncError};
use crate::snapshot::{self, ExistingSet, RawEntry};

/// A mutation applied to a [`MemoryStore`], in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Put(String),
    Delete(String),
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<String, Vec<u8>>,
    log: Vec<Mutation>,
    failing: HashSet<(StoreOp, String)>,
}

/// In-memory key-value bucket.
///
/// Snapshots go through the same drain as the NATS store, fed from the
/// current entries, so tests exercise the real discovery path.
pub struct MemoryStore {
    name: String,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Seed the store with existing entries
    pub fn with_entries<I, K, V>(name: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let store = Self::new(name);
        {
            let mut inner = store.lock();
            for (key, value) in entries {
                inner.entries.insert(key.into(), value.into());
            }
        }
        store
    }

    /// Make every future `put` of `name` fail
    pub fn fail_put(&self, name: impl Into<String>) {
        self.lock().failing.insert((StoreOp::Put, name.into()));
    }

    /// Make every future `delete` of `name` fail
    pub fn fail_delete(&self, name: impl Into<String>) {
        self.lock().failing.insert((StoreOp::Delete, name.into()));
    }

    /// Current contents
    pub fn entries(&self) -> BTreeMap<String, Vec<u8>> {
        self.lock().entries.clone()
    }

    /// Mutations applied so far
    pub fn mutations(&self) -> Vec<Mutation> {
        self.lock().log.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-mutation.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    fn store_name(&self) -> &str {
        &self.name
    }

    async fn put(&self, name: &str, payload: Vec<u8>) -> Result<()> {
        let mut inner = self.lock();
        if inner.failing.contains(&(StoreOp::Put, name.to_string())) {
            return Err(SyncError::store(StoreOp::Put, name, "injected failure"));
        }
        inner.entries.insert(name.to_string(), payload);
        inner.log.push(Mutation::Put(name.to_string()));
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.failing.contains(&(StoreOp::Delete, name.to_string())) {
            return Err(SyncError::store(StoreOp::Delete, name, "injected failure"));
        }
        inner.entries.remove(name);
        inner.log.push(Mutation::Delete(name.to_string()));
        Ok(())
    }

    async fn snapshot(&self, wait: Duration) -> Result<ExistingSet> {
        let prefix = snapshot::key_prefix(&self.name);
        let messages: Vec<Result<RawEntry>> = self
            .lock()
            .entries
            .iter()
            .map(|(key, value)| Ok(RawEntry::new(format!("{}.{}", prefix, key), value.clone())))
            .collect();

        snapshot::drain(stream::iter(messages), &self.name, wait).await
    }
}
