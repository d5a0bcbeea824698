//! dynaorm core - Catalog, field pipelines, queries and relation loading.
//!
//! This crate maps declared record types onto a key-value document store
//! reachable through the [`store::Store`] trait.

pub mod catalog;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod record;
pub mod session;
pub mod store;
pub mod transaction;

pub use catalog::{
    collection_name, DefaultValue, FieldDescriptor, Junction, Lifecycle, ModelBuilder, ModelId,
    RecordDescriptor, Registry, RelationDescriptor, RelationKind,
};
pub use config::{OrderFallback, SessionConfig};
pub use error::Error;
pub use query::{
    shorthand, FilterCompiler, Include, OrderDirection, QueryExecutor, QueryOptions, Trashed,
};
pub use record::{Record, Related, SyncReport};
pub use session::{Session, Table};
pub use store::{MemoryStore, SledStore, SledStoreConfig, Store, StoreError, StoreStats};
pub use transaction::Transaction;

/// Re-export protocol types.
pub use dynaorm_proto as proto;
