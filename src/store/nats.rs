//! NATS JetStream key-value store
//!
//! Wraps an `async_nats` connection and one key-value bucket. The client has
//! no cheap way to stream every bucket entry with its value, so [`snapshot`]
//! creates a short-lived consumer on the bucket's backing stream filtered to
//! `$KV.<store>.>` and drains it (see [`crate::snapshot::drain`]). The drain
//! is racy against concurrent writers.
//!
//! [`snapshot`]: RegistryStore::snapshot

use std::time::Duration;

use async_nats::jetstream::{self, consumer, kv};
use async_nats::{Client, ConnectOptions, ServerAddr};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::RegistryStore;
use crate::config::NatsConfig;
use crate::error::{Result, StoreOp, SyncError};
use crate::snapshot::{self, ExistingSet, RawEntry};

/// Reconnect attempts before the connection is given up
pub const MAX_RECONNECT_ATTEMPTS: usize = 5;

/// Pause between reconnect attempts
pub const RECONNECT_TIME_WAIT: Duration = Duration::from_millis(500);

/// Consumers left behind by a crashed run are reaped by the server after this
const CONSUMER_INACTIVE_THRESHOLD: Duration = Duration::from_secs(30);

/// A connected key-value bucket
pub struct NatsStore {
    client: Client,
    jetstream: jetstream::Context,
    bucket: kv::Store,
    name: String,
}

impl NatsStore {
    /// Connect to the servers in `config` and open bucket `store_name`
    pub async fn connect(config: &NatsConfig, store_name: &str) -> Result<Self> {
        let client = connect(config).await?;
        let jetstream = jetstream::new(client.clone());

        let bucket = jetstream
            .get_key_value(store_name)
            .await
            .map_err(|e| SyncError::Connection(format!("key-value bucket {}: {}", store_name, e)))?;

        info!("Opened schema registry bucket '{}'", store_name);

        Ok(Self {
            client,
            jetstream,
            bucket,
            name: store_name.to_string(),
        })
    }

    /// Flush pending writes and release the connection
    pub async fn close(self) -> Result<()> {
        self.client
            .flush()
            .await
            .map_err(|e| SyncError::Connection(e.to_string()))?;
        debug!("Closed connection to schema registry '{}'", self.name);
        Ok(())
    }

    fn stream_name(&self) -> String {
        format!("KV_{}", self.name)
    }
}

async fn connect(config: &NatsConfig) -> Result<Client> {
    let servers = config
        .servers
        .iter()
        .map(|s| {
            s.parse::<ServerAddr>()
                .map_err(|e| SyncError::Connection(format!("invalid server URL {}: {}", s, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    if servers.is_empty() {
        return Err(SyncError::Connection("no NATS servers configured".to_string()));
    }

    let mut options = match &config.credentials {
        Some(path) => ConnectOptions::with_credentials_file(path.clone())
            .await
            .map_err(|e| {
                SyncError::Connection(format!("credentials {}: {}", path.display(), e))
            })?,
        None => ConnectOptions::new(),
    };

    options = options
        .max_reconnects(MAX_RECONNECT_ATTEMPTS)
        .reconnect_delay_callback(|_| RECONNECT_TIME_WAIT);

    if config.tls {
        options = options.require_tls(true);
    }
    if let Some(ca_file) = &config.ca_file {
        options = options.add_root_certificates(ca_file.clone());
    }

    info!("Connecting to NATS at {}", config.servers.join(","));
    options
        .connect(&servers[..])
        .await
        .map_err(|e| SyncError::Connection(e.to_string()))
}

#[async_trait]
impl RegistryStore for NatsStore {
    fn store_name(&self) -> &str {
        &self.name
    }

    async fn put(&self, name: &str, payload: Vec<u8>) -> Result<()> {
        self.bucket
            .put(name, payload.into())
            .await
            .map_err(|e| SyncError::store(StoreOp::Put, name, e))?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.bucket
            .delete(name)
            .await
            .map_err(|e| SyncError::store(StoreOp::Delete, name, e))
    }

    async fn snapshot(&self, wait: Duration) -> Result<ExistingSet> {
        let subject = snapshot::wildcard_subject(&self.name);

        let stream = self
            .jetstream
            .get_stream(self.stream_name())
            .await
            .map_err(|e| SyncError::store(StoreOp::Snapshot, &subject, e))?;

        let subscription = stream
            .create_consumer(consumer::pull::Config {
                filter_subject: subject.clone(),
                deliver_policy: consumer::DeliverPolicy::LastPerSubject,
                ack_policy: consumer::AckPolicy::None,
                inactive_threshold: CONSUMER_INACTIVE_THRESHOLD,
                ..Default::default()
            })
            .await
            .map_err(|e| SyncError::store(StoreOp::Snapshot, &subject, e))?;
        let consumer_name = subscription.cached_info().name.clone();
        debug!("Subscribed to '{}' with consumer {}", subject, consumer_name);

        let drained = match subscription.messages().await {
            Ok(messages) => {
                let entries = messages.map(|message| {
                    message
                        .map(|m| RawEntry::new(m.subject.to_string(), m.payload.to_vec()))
                        .map_err(|e| SyncError::store(StoreOp::Snapshot, &subject, e))
                });
                snapshot::drain(Box::pin(entries), &self.name, wait).await
            }
            Err(e) => Err(SyncError::store(StoreOp::Snapshot, &subject, e)),
        };

        // Unsubscribe whether or not the drain succeeded.
        if let Err(e) = stream.delete_consumer(&consumer_name).await {
            warn!("Failed to remove discovery consumer {}: {}", consumer_name, e);
        }

        drained
    }
}
