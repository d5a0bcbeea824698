//! In-memory store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use dynaorm_proto::{Item, KeySchema, ScanPage, ScanRequest, WriteOp};

use super::key::encode_key;
use super::{collect_page, validate_request, Store, StoreError, DEFAULT_PAGE_LIMIT};

/// Call counters of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// `create_collection` calls.
    pub creates: usize,
    /// `put_item` calls.
    pub puts: usize,
    /// `delete_item` calls.
    pub deletes: usize,
    /// `batch_apply` calls.
    pub batches: usize,
    /// `scan` calls per collection.
    pub scans: HashMap<String, usize>,
}

impl StoreStats {
    /// Scan calls against one collection.
    pub fn scans_of(&self, collection: &str) -> usize {
        self.scans.get(collection).copied().unwrap_or(0)
    }

    /// Scan calls across all collections.
    pub fn total_scans(&self) -> usize {
        self.scans.values().sum()
    }

    /// Every store call.
    pub fn total_calls(&self) -> usize {
        self.creates + self.puts + self.deletes + self.batches + self.total_scans()
    }
}

struct Collection {
    schema: KeySchema,
    items: BTreeMap<Vec<u8>, Item>,
}

/// Store keeping every collection in a key-ordered map.
///
/// Scans examine at most `page_limit` items per call, so callers see the
/// same pagination behavior as a remote store.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    page_limit: usize,
    stats: Mutex<StoreStats>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            page_limit: DEFAULT_PAGE_LIMIT,
            stats: Mutex::new(StoreStats::default()),
        }
    }

    /// Bound the number of items examined per scan page.
    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    /// Snapshot of the call counters.
    pub fn stats(&self) -> StoreStats {
        self.stats.lock().clone()
    }

    /// Reset the call counters.
    pub fn reset_stats(&self) {
        *self.stats.lock() = StoreStats::default();
    }

    /// Number of items stored in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |c| c.items.len())
    }

    /// Whether a collection is empty or missing.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// All items of a collection in key order.
    pub fn items(&self, collection: &str) -> Vec<Item> {
        self.collections
            .read()
            .get(collection)
            .map(|c| c.items.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether the collection exists.
    pub fn has_collection(&self, collection: &str) -> bool {
        self.collections.read().contains_key(collection)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A write op resolved to its encoded key.
enum Prepared {
    Put(String, Vec<u8>, Item),
    Delete(String, Vec<u8>),
}

fn prepare(
    collections: &HashMap<String, Collection>,
    ops: Vec<WriteOp>,
) -> Result<Vec<Prepared>, StoreError> {
    let mut seen = HashSet::new();
    let mut prepared = Vec::with_capacity(ops.len());
    for op in ops {
        let collection = collections
            .get(op.collection())
            .ok_or_else(|| StoreError::CollectionNotFound(op.collection().to_string()))?;
        let entry = match op {
            WriteOp::Put { collection: name, item } => {
                let key = encode_key(&name, &collection.schema, &item)?;
                Prepared::Put(name, key, item)
            }
            WriteOp::Delete { collection: name, key } => {
                let key = encode_key(&name, &collection.schema, &key)?;
                Prepared::Delete(name, key)
            }
        };
        let target = match &entry {
            Prepared::Put(name, key, _) | Prepared::Delete(name, key) => (name.clone(), key.clone()),
        };
        if !seen.insert(target) {
            return Err(StoreError::BatchRejected(
                "batch contains more than one operation on the same item".to_string(),
            ));
        }
        prepared.push(entry);
    }
    Ok(prepared)
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_collection(
        &self,
        name: &str,
        key_schema: KeySchema,
    ) -> Result<(), StoreError> {
        self.stats.lock().creates += 1;
        let mut collections = self.collections.write();
        if !collections.contains_key(name) {
            debug!(collection = name, "Creating collection");
            collections.insert(
                name.to_string(),
                Collection {
                    schema: key_schema,
                    items: BTreeMap::new(),
                },
            );
        }
        Ok(())
    }

    async fn put_item(&self, collection: &str, item: Item) -> Result<(), StoreError> {
        self.stats.lock().puts += 1;
        let mut collections = self.collections.write();
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        let key = encode_key(collection, &target.schema, &item)?;
        target.items.insert(key, item);
        Ok(())
    }

    async fn delete_item(&self, collection: &str, key: Item) -> Result<(), StoreError> {
        self.stats.lock().deletes += 1;
        let mut collections = self.collections.write();
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        let key = encode_key(collection, &target.schema, &key)?;
        target.items.remove(&key);
        Ok(())
    }

    async fn scan(&self, collection: &str, request: ScanRequest) -> Result<ScanPage, StoreError> {
        *self
            .stats
            .lock()
            .scans
            .entry(collection.to_string())
            .or_insert(0) += 1;
        validate_request(&request)?;

        let collections = self.collections.read();
        let target = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        let start = match &request.cursor {
            Some(cursor) => Bound::Excluded(encode_key(collection, &target.schema, cursor.key())?),
            None => Bound::Unbounded,
        };
        let limit = request
            .limit
            .map_or(self.page_limit, |l| l.min(self.page_limit));
        let entries = target
            .items
            .range((start, Bound::Unbounded))
            .map(|(_, item)| Ok(item.clone()));

        collect_page(entries, &target.schema, &request, limit)
    }

    async fn batch_apply(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        self.stats.lock().batches += 1;
        let mut collections = self.collections.write();
        let prepared = prepare(&collections, ops)?;

        for op in prepared {
            match op {
                Prepared::Put(name, key, item) => {
                    if let Some(target) = collections.get_mut(&name) {
                        target.items.insert(key, item);
                    }
                }
                Prepared::Delete(name, key) => {
                    if let Some(target) = collections.get_mut(&name) {
                        target.items.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }
}
