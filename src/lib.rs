//! Polyn Schema Registry Synchronizer
//!
//! Mirrors a directory of JSON Schema documents into the Polyn schema
//! registry, a NATS JetStream key-value bucket.
//!
//! ## Features
//!
//! - **Validated Sources**: Duplicate names, naming grammar and schema
//!   validity are all checked before the registry is touched
//! - **Exact Mirror**: Every source schema is written and every registry
//!   entry without a source is deleted
//! - **Safe Re-runs**: All entries are rewritten on each run, so a failed run
//!   converges on the next one
//! - **Scaffolding**: Generators for new schema files and consumer configs
//!
//! ## Layout
//!
//! ```text
//! schemas/
//! ├── app.widgets.created.json      -> key "app.widgets.created"
//! └── billing/
//!     └── billing.invoice.paid.json -> key "billing.invoice.paid"
//! ```
//!
//! Subdirectories only organize files. Each file stem must be unique across
//! the whole tree.

pub mod config;
pub mod error;
pub mod naming;
pub mod reconcile;
pub mod scaffold;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod sync;

pub use config::PolynConfig;
pub use error::{Result, SyncError};
pub use reconcile::{Plan, SyncReport};
pub use snapshot::ExistingSet;
pub use source::{DesiredSet, SchemaDocument};
pub use store::{MemoryStore, NatsStore, RegistryStore};
