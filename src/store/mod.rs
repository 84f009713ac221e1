//! Registry stores
//!
//! - **Nats**: the JetStream key-value bucket backing the schema registry
//! - **Memory**: in-process store for dry runs and testing
//!
//! Both are driven through [`RegistryStore`], so reconciliation does not care
//! which one it is talking to.

mod memory;
mod nats;

pub use memory::{MemoryStore, Mutation};
pub use nats::NatsStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::snapshot::ExistingSet;

/// A key-value schema registry
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Bucket name
    fn store_name(&self) -> &str;

    /// Unconditionally overwrite `name` (last write wins)
    async fn put(&self, name: &str, payload: Vec<u8>) -> Result<()>;

    /// Remove `name` from the bucket
    async fn delete(&self, name: &str) -> Result<()>;

    /// Best-effort listing of live entries, bounded by `wait` of silence
    async fn snapshot(&self, wait: Duration) -> Result<ExistingSet>;
}
