//! Atomic batches of record writes.

use tracing::{debug, instrument, warn};

use dynaorm_proto::{Value, WriteOp};

use crate::error::Error;
use crate::record::{Record, Values};
use crate::session::Session;

/// Writes queued for one atomic batch.
///
/// Staging runs pipelines, validators and timestamps immediately but leaves
/// the caller's records untouched; nothing reaches the store before
/// [`Transaction::commit`], which hands back the committed records. A
/// transaction dropped without committing writes nothing.
pub struct Transaction<'s> {
    session: &'s Session,
    ops: Vec<WriteOp>,
    staged: Vec<Record>,
}

impl<'s> Transaction<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self {
            session,
            ops: Vec::new(),
            staged: Vec::new(),
        }
    }

    /// Build a record of type `T` and queue its insert.
    pub fn create<T: 'static>(
        &mut self,
        data: impl IntoIterator<Item = (impl AsRef<str>, impl Into<Value>)>,
    ) -> Result<(), Error> {
        let descriptor = self.session.registry().descriptor_of::<T>()?;
        let record = Record::build(descriptor, data)?;
        self.save(&record)
    }

    /// Queue an upsert of `record`.
    pub fn save(&mut self, record: &Record) -> Result<(), Error> {
        let (op, values) = record.stage_save()?;
        self.push(op, record.clone(), Some(values));
        Ok(())
    }

    /// Queue an upsert of `record` with `changes` assigned.
    pub fn update<K, V>(
        &mut self,
        record: &Record,
        changes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<(), Error>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut draft = record.clone();
        draft.assign(changes)?;
        let (op, values) = draft.stage_save()?;
        self.push(op, draft, Some(values));
        Ok(())
    }

    /// Queue a destroy, soft or physical depending on the record type.
    pub fn destroy(&mut self, record: &Record) -> Result<(), Error> {
        let (op, staged) = record.stage_destroy()?;
        self.push(op, record.clone(), staged);
        Ok(())
    }

    /// Queue a physical delete.
    pub fn force_destroy(&mut self, record: &Record) -> Result<(), Error> {
        let op = record.stage_force_destroy()?;
        self.push(op, record.clone(), None);
        Ok(())
    }

    fn push(&mut self, op: WriteOp, mut record: Record, values: Option<Values>) {
        record.commit_staged(values);
        self.ops.push(op);
        self.staged.push(record);
    }

    /// Queued operations.
    pub fn operations(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every queued operation in one atomic batch.
    ///
    /// A batch above the configured bound fails before reaching the store.
    /// Returns the records as they stand after the batch, in staging order.
    /// On failure no record reports the queued state.
    #[instrument(skip(self), fields(size = self.ops.len()))]
    pub async fn commit(self) -> Result<Vec<Record>, Error> {
        let size = self.ops.len();
        let max = self.session.config().max_batch_size;
        if size > max {
            warn!(size, max, "Batch exceeds the atomic bound");
            return Err(Error::BatchTooLarge { size, max });
        }
        if size == 0 {
            return Ok(Vec::new());
        }

        let store = self.session.store()?;
        if let Err(e) = store.batch_apply(self.ops).await {
            warn!(error = %e, size, "Batch rejected");
            return Err(e.into());
        }
        debug!(size, "Batch committed");
        Ok(self.staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::catalog::Registry;
    use crate::config::SessionConfig;
    use crate::store::MemoryStore;

    struct Tag;

    async fn session(max_batch_size: usize) -> (Session, Arc<MemoryStore>) {
        let registry = Registry::new();
        registry
            .model::<Tag>()
            .partition_key("id")
            .field("label", |f| {
                f.not_null();
            })
            .build()
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let session = Session::new(
            registry,
            SessionConfig::new().with_max_batch_size(max_batch_size),
        );
        session.connect(store.clone());
        session.provision().await.unwrap();
        (session, store)
    }

    #[tokio::test]
    async fn test_commit_applies_all() {
        let (session, store) = session(25).await;
        let mut tx = session.begin();
        let mut first = Record::build(
            session.registry().descriptor_of::<Tag>().unwrap(),
            [("id", "t1"), ("label", "a")],
        )
        .unwrap();
        tx.update(&first, [("label", "c")]).unwrap();
        tx.create::<Tag>([("id", "t2"), ("label", "b")]).unwrap();
        tx.create::<Tag>([("id", "t3"), ("label", "b")]).unwrap();
        assert_eq!(tx.len(), 3);
        assert!(!first.is_persisted());
        assert_eq!(first.peek("label").unwrap(), Value::from("a"));
        assert_eq!(store.len("tags"), 0);

        let committed = tx.commit().await.unwrap();
        assert_eq!(committed.len(), 3);
        assert!(committed.iter().all(Record::is_persisted));
        assert_eq!(committed[0].peek("label").unwrap(), Value::from("c"));
        assert_eq!(store.len("tags"), 3);
        assert_eq!(store.stats().batches, 1);
    }

    #[tokio::test]
    async fn test_rejected_batch_applies_nothing() {
        let (session, store) = session(25).await;
        let mut tx = session.begin();
        let descriptor = session.registry().descriptor_of::<Tag>().unwrap();
        let draft = Record::build(descriptor, [("id", "t2"), ("label", "b")]).unwrap();
        tx.create::<Tag>([("id", "t1"), ("label", "a")]).unwrap();
        tx.save(&draft).unwrap();
        tx.update(&draft, [("label", "c")]).unwrap();

        assert!(matches!(tx.commit().await, Err(Error::Store(_))));
        assert_eq!(store.len("tags"), 0);
        assert!(!draft.is_persisted());
        assert_eq!(draft.peek("label").unwrap(), Value::from("b"));
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_records_unsaved() {
        struct Owner;

        let registry = Registry::new();
        registry.model::<Tag>().partition_key("id").build().unwrap();
        registry
            .model::<Owner>()
            .partition_key("id")
            .belongs_to_many::<Tag>("tags", "owner_tags", "owner_id", "tag_id")
            .build()
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let session = Session::new(registry, SessionConfig::new().with_max_batch_size(1));
        session.connect(store.clone());
        session.provision().await.unwrap();
        store.reset_stats();

        let descriptor = session.registry().descriptor_of::<Owner>().unwrap();
        let owner = Record::build(descriptor, [("id", "o1")]).unwrap();
        let mut tx = session.begin();
        tx.save(&owner).unwrap();
        tx.create::<Tag>([("id", "t1")]).unwrap();
        assert!(matches!(
            tx.commit().await,
            Err(Error::BatchTooLarge { size: 2, max: 1 })
        ));

        assert!(!owner.is_persisted());
        let attached = owner.attach::<Tag>(&session, "t1").await;
        assert!(matches!(attached, Err(Error::NotPersisted(_))));
        assert_eq!(store.stats().total_calls(), 0);
    }

    #[tokio::test]
    async fn test_oversized_batch_fails_before_the_store() {
        let (session, store) = session(2).await;
        store.reset_stats();

        let mut tx = session.begin();
        for i in 0..3 {
            tx.create::<Tag>([("id", format!("t{i}")), ("label", "x".to_string())])
                .unwrap();
        }
        assert!(matches!(
            tx.commit().await,
            Err(Error::BatchTooLarge { size: 3, max: 2 })
        ));
        assert_eq!(store.stats().total_calls(), 0);
        assert_eq!(store.len("tags"), 0);
    }

    #[tokio::test]
    async fn test_failed_block_writes_nothing() {
        let (session, store) = session(25).await;
        let result = session
            .transaction(|tx| {
                tx.create::<Tag>([("id", "t1"), ("label", "a")])?;
                tx.create::<Tag>([("id", "t2")])?;
                Ok(())
            })
            .await;
        assert!(result.unwrap_err().is_validation());
        assert_eq!(store.len("tags"), 0);
    }

    #[tokio::test]
    async fn test_dropped_transaction_writes_nothing() {
        let (session, store) = session(25).await;
        {
            let mut tx = session.begin();
            tx.create::<Tag>([("id", "t1"), ("label", "a")]).unwrap();
        }
        assert_eq!(store.len("tags"), 0);
        assert_eq!(store.stats().batches, 0);
    }
}
