//! Schema registry synchronization
//!
//! Runs the stages in order and stops at the first failure:
//! source validation, connect, snapshot, reconcile, puts, deletes.
//! Source validation happens before any connection is opened, and the
//! connection is released on every exit path once it exists.

use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::config::PolynConfig;
use crate::error::Result;
use crate::reconcile::{self, SyncReport};
use crate::source::{self, DesiredSet};
use crate::store::{MemoryStore, NatsStore, RegistryStore};

/// Bring `store` in line with an already validated desired set
pub async fn sync_desired<S>(store: &S, desired: &DesiredSet, wait: Duration) -> Result<SyncReport>
where
    S: RegistryStore + ?Sized,
{
    let existing = store.snapshot(wait).await?;
    info!(
        "Registry '{}' holds {} schemas, source has {}",
        store.store_name(),
        existing.len(),
        desired.len()
    );

    let plan = reconcile::reconcile(desired, &existing);
    reconcile::apply(store, plan).await
}

/// Load `schemas_dir` and mirror it into `store`
pub async fn sync_dir<S>(store: &S, schemas_dir: &Path, wait: Duration) -> Result<SyncReport>
where
    S: RegistryStore + ?Sized,
{
    let desired = source::discover(schemas_dir)?;
    sync_desired(store, &desired, wait).await
}

/// Full run against the NATS registry described by `config`
pub async fn run(config: &PolynConfig, schemas_dir: &Path) -> Result<SyncReport> {
    info!(
        "Loading schemas into the Polyn schema registry from '{}'",
        schemas_dir.display()
    );
    let desired = source::discover(schemas_dir)?;

    let store = NatsStore::connect(&config.nats, &config.registry.store_name).await?;
    let result = sync_desired(&store, &desired, config.registry.discovery_wait()).await;
    let closed = store.close().await;

    let report = result?;
    closed?;
    Ok(report)
}

/// Validate `schemas_dir` and plan against an empty registry without connecting
pub async fn dry_run(config: &PolynConfig, schemas_dir: &Path) -> Result<SyncReport> {
    let store = MemoryStore::new(config.registry.store_name.clone());
    sync_dir(&store, schemas_dir, Duration::ZERO).await
}
