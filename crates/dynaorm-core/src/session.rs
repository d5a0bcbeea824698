//! Sessions and per-type tables.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use dynaorm_proto::{Filter, KeySchema, Value};

use crate::catalog::{RecordDescriptor, Registry};
use crate::config::SessionConfig;
use crate::error::Error;
use crate::query::{shorthand, OrderDirection, QueryExecutor, QueryOptions};
use crate::record::Record;
use crate::store::Store;
use crate::transaction::Transaction;

/// Connection context shared by every operation.
///
/// Holds the schema registry, the configuration and the store slot. The slot
/// is filled by [`Session::connect`] and emptied by [`Session::disconnect`];
/// operations needing the store fail with [`Error::NotConnected`] while it is
/// empty.
pub struct Session {
    registry: Registry,
    config: SessionConfig,
    store: RwLock<Option<Arc<dyn Store>>>,
}

impl Session {
    /// Create a disconnected session.
    pub fn new(registry: Registry, config: SessionConfig) -> Self {
        Self {
            registry,
            config,
            store: RwLock::new(None),
        }
    }

    /// Create a session connected to `store` with default configuration.
    pub fn open(registry: Registry, store: Arc<dyn Store>) -> Self {
        let session = Self::new(registry, SessionConfig::default());
        session.connect(store);
        session
    }

    /// Install the store, replacing any previous one.
    pub fn connect(&self, store: Arc<dyn Store>) {
        *self.store.write() = Some(store);
        info!("Session connected");
    }

    /// Remove the store. Returns the previous one, if any.
    pub fn disconnect(&self) -> Option<Arc<dyn Store>> {
        let previous = self.store.write().take();
        if previous.is_some() {
            info!("Session disconnected");
        }
        previous
    }

    /// Whether a store is installed.
    pub fn is_connected(&self) -> bool {
        self.store.read().is_some()
    }

    /// The installed store.
    pub fn store(&self) -> Result<Arc<dyn Store>, Error> {
        self.store.read().clone().ok_or(Error::NotConnected)
    }

    /// Schema registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Query executor bound to the installed store.
    pub fn executor(&self) -> Result<QueryExecutor<'_>, Error> {
        Ok(QueryExecutor::new(self.store()?, &self.registry, &self.config))
    }

    /// Operations on the records of type `T`.
    pub fn table<T: 'static>(&self) -> Result<Table<'_>, Error> {
        Ok(Table {
            session: self,
            descriptor: self.registry.descriptor_of::<T>()?,
        })
    }

    /// Create the collections of every registered type and declared junction.
    ///
    /// Creation is idempotent, so provisioning twice is harmless. Returns the
    /// number of collections requested.
    pub async fn provision(&self) -> Result<usize, Error> {
        let store = self.store()?;
        let mut count = 0;
        for descriptor in self.registry.descriptors() {
            store
                .create_collection(descriptor.collection(), descriptor.key_schema()?)
                .await?;
            count += 1;

            for (_, relation) in descriptor.relations() {
                if let Some(junction) = &relation.junction {
                    let schema = KeySchema::new(junction.local_key.clone())
                        .with_sort_key(junction.related_key.clone());
                    store.create_collection(&junction.collection, schema).await?;
                    count += 1;
                }
            }
        }
        debug!(collections = count, "Provisioned collections");
        Ok(count)
    }

    /// Start a transaction.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    /// Run `block` in a transaction and commit if it returns `Ok`.
    ///
    /// Nothing is written when `block` fails or the commit is rejected.
    /// Records passed to the block are never modified; reload them after
    /// the call, or use [`Session::begin`] to get the committed records.
    pub async fn transaction<T>(
        &self,
        block: impl FnOnce(&mut Transaction<'_>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut tx = self.begin();
        let output = block(&mut tx)?;
        tx.commit().await?;
        Ok(output)
    }
}

/// Per-type operations: create, query, bulk update and delete.
pub struct Table<'s> {
    session: &'s Session,
    descriptor: Arc<RecordDescriptor>,
}

impl<'s> Table<'s> {
    /// Descriptor of the record type.
    pub fn descriptor(&self) -> &Arc<RecordDescriptor> {
        &self.descriptor
    }

    /// Build an unsaved record.
    pub fn build<K, V>(&self, data: impl IntoIterator<Item = (K, V)>) -> Result<Record, Error>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        Record::build(self.descriptor.clone(), data)
    }

    /// Build an unsaved record from a plain JSON object.
    pub fn from_plain_object(&self, object: &serde_json::Value) -> Result<Record, Error> {
        Record::from_plain_object(self.descriptor.clone(), object)
    }

    /// Build and save a record.
    pub async fn create<K, V>(&self, data: impl IntoIterator<Item = (K, V)>) -> Result<Record, Error>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = self.build(data)?;
        record.save(self.session).await?;
        Ok(record)
    }

    /// Records matching `filter`.
    pub async fn find(&self, filter: &Filter, options: &QueryOptions) -> Result<Vec<Record>, Error> {
        self.session
            .executor()?
            .find(&self.descriptor, filter, options)
            .await
    }

    /// Every record.
    pub async fn all(&self, options: &QueryOptions) -> Result<Vec<Record>, Error> {
        self.find(&Filter::new(), options).await
    }

    /// Records whose `field` equals `value`.
    pub async fn find_by(&self, field: &str, value: impl Into<Value>) -> Result<Vec<Record>, Error> {
        self.find(&Filter::by(field, value), &QueryOptions::new())
            .await
    }

    /// Records matching `field <operator> value`, e.g. `("age", ">=", 18)`.
    pub async fn find_where(
        &self,
        field: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<Record>, Error> {
        let filter = shorthand(field, operator, value)?;
        self.find(&filter, &QueryOptions::new()).await
    }

    /// The record with primary key `id`.
    pub async fn get(&self, id: impl Into<Value>) -> Result<Option<Record>, Error> {
        let filter = Filter::by(self.descriptor.primary_key_name()?, id);
        let mut records = self.find(&filter, &QueryOptions::new().limit(1)).await?;
        Ok(records.pop())
    }

    /// First record in the requested order, ascending by default.
    pub async fn first(&self, filter: &Filter, options: &QueryOptions) -> Result<Option<Record>, Error> {
        let mut options = options.clone().limit(1);
        options.order.get_or_insert(OrderDirection::Asc);
        let mut records = self.find(filter, &options).await?;
        Ok(records.pop())
    }

    /// Last record in the requested order, ascending by default.
    pub async fn last(&self, filter: &Filter, options: &QueryOptions) -> Result<Option<Record>, Error> {
        let mut options = options.clone().limit(1);
        options.order = Some(match options.order {
            Some(OrderDirection::Desc) => OrderDirection::Asc,
            _ => OrderDirection::Desc,
        });
        let mut records = self.find(filter, &options).await?;
        Ok(records.pop())
    }

    /// Records matching `filter`, soft-deleted ones included.
    pub async fn with_trashed(&self, filter: &Filter, options: &QueryOptions) -> Result<Vec<Record>, Error> {
        self.find(filter, &options.clone().with_trashed()).await
    }

    /// Soft-deleted records matching `filter`.
    pub async fn only_trashed(&self, filter: &Filter, options: &QueryOptions) -> Result<Vec<Record>, Error> {
        self.find(filter, &options.clone().only_trashed()).await
    }

    /// Apply `changes` to every record matching `filter`. Returns the number updated.
    pub async fn update<K, V>(
        &self,
        changes: impl IntoIterator<Item = (K, V)>,
        filter: &Filter,
    ) -> Result<usize, Error>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let changes: Vec<(String, Value)> = changes
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.into()))
            .collect();
        let mut records = self.find(filter, &QueryOptions::new()).await?;
        for record in &mut records {
            record.update(self.session, changes.clone()).await?;
        }
        Ok(records.len())
    }

    /// Destroy every record matching `filter`. Returns the number destroyed.
    pub async fn delete(&self, filter: &Filter) -> Result<usize, Error> {
        let mut records = self.find(filter, &QueryOptions::new()).await?;
        for record in &mut records {
            record.destroy(self.session).await?;
        }
        Ok(records.len())
    }
}
