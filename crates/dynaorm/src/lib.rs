//! dynaorm - Declarative records, filters and eager loading over a key-value document store.
//!
//! Record types are plain Rust types registered in a [`Registry`] with
//! their keys, field pipelines, lifecycle fields and relations. A
//! [`Session`] binds the registry to a [`Store`] and exposes per-type
//! [`Table`] operations.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use dynaorm::prelude::*;
//!
//! struct User;
//! struct Order;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), dynaorm::Error> {
//!     let registry = Registry::new();
//!     registry
//!         .model::<User>()
//!         .partition_key("id")
//!         .field("email", |f| {
//!             f.mutate(mutators::trim())
//!                 .mutate(mutators::lowercase())
//!                 .validate(validators::is_email());
//!         })
//!         .has_many::<Order>("orders", "user_id")
//!         .build()?;
//!     registry.model::<Order>().partition_key("id").fields(&["user_id"]).build()?;
//!
//!     let session = Session::open(registry, Arc::new(MemoryStore::new()));
//!     session.provision().await?;
//!
//!     let users = session.table::<User>()?;
//!     users.create([("id", "u1"), ("email", " Ada@Example.com ")]).await?;
//!
//!     let loaded = users.all(&QueryOptions::new().with("orders")).await?;
//!     println!("{}", loaded[0].to_plain_object());
//!     Ok(())
//! }
//! ```

pub use dynaorm_core::{
    catalog, collection_name, config, pipeline, query, record, session, shorthand, store,
    transaction, DefaultValue, Error, FieldDescriptor, FilterCompiler, Include, Junction,
    Lifecycle, MemoryStore, ModelBuilder, ModelId, OrderDirection, OrderFallback, QueryExecutor,
    QueryOptions, Record, RecordDescriptor, Registry, Related, RelationDescriptor, RelationKind,
    Session, SessionConfig, SledStore, SledStoreConfig, Store, StoreError, StoreStats, SyncReport,
    Table, Transaction, Trashed,
};

/// Re-export protocol types.
pub use dynaorm_proto as proto;

pub use dynaorm_proto::{Filter, Item, Operator, Value};

/// Everything needed to declare record types and query them.
pub mod prelude {
    pub use dynaorm_core::pipeline::{defaults, mutators, validators};
    pub use dynaorm_core::{
        shorthand, Include, MemoryStore, OrderDirection, QueryOptions, Record, Registry, Related,
        Session, SessionConfig, SledStore, SledStoreConfig, Store, Table, Transaction, Trashed,
    };
    pub use dynaorm_proto::{Filter, Item, Value};
}
