//! Durable store backed by sled.

use std::collections::HashSet;
use std::ops::Bound;
use std::path::PathBuf;

use async_trait::async_trait;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Tree};
use tracing::{debug, warn};

use dynaorm_proto::{decode_item, encode_item, Item, KeySchema, ScanPage, ScanRequest, WriteOp};

use super::key::encode_key;
use super::{collect_page, validate_request, Store, StoreError, DEFAULT_PAGE_LIMIT};

/// Tree holding all items, keyed by collection name, a separator and the encoded key.
const ITEMS_TREE: &str = "items";

/// Tree holding collection key schemas.
const SCHEMA_TREE: &str = "schemas";

/// Separates the collection name from the encoded item key.
const SEPARATOR: u8 = 0x00;

/// Configuration for [`SledStore`].
#[derive(Debug, Clone)]
pub struct SledStoreConfig {
    /// Path to the database directory.
    pub path: PathBuf,

    /// Page cache capacity in bytes.
    pub cache_capacity: u64,

    /// Enable zstd compression.
    pub compression: bool,

    /// Temporary database (deleted on drop).
    pub temporary: bool,

    /// Items examined per scan page.
    pub page_limit: usize,
}

impl Default for SledStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./dynaorm_data"),
            cache_capacity: 256 * 1024 * 1024, // 256MB
            compression: false,
            temporary: false,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl SledStoreConfig {
    /// Create a new configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Temporary database for testing.
    pub fn temporary() -> Self {
        Self {
            path: PathBuf::from(""),
            temporary: true,
            ..Default::default()
        }
    }

    /// Set the scan page limit.
    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    /// Enable or disable compression.
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    fn to_sled_config(&self) -> sled::Config {
        let config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression);

        if self.temporary {
            config.temporary(true)
        } else {
            config.path(&self.path)
        }
    }
}

/// Store persisting collections in sled trees.
pub struct SledStore {
    db: Db,
    items: Tree,
    schemas: Tree,
    page_limit: usize,
}

impl SledStore {
    /// Open or create a store.
    pub fn open(config: SledStoreConfig) -> Result<Self, StoreError> {
        let db = config.to_sled_config().open()?;
        let items = db.open_tree(ITEMS_TREE)?;
        let schemas = db.open_tree(SCHEMA_TREE)?;
        Ok(Self {
            db,
            items,
            schemas,
            page_limit: config.page_limit,
        })
    }

    /// Flush pending writes to disk.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.db.flush_async().await?;
        Ok(())
    }

    /// Names of all created collections.
    pub fn collections(&self) -> Result<Vec<String>, StoreError> {
        self.schemas
            .iter()
            .keys()
            .map(|key| -> Result<String, StoreError> {
                Ok(String::from_utf8_lossy(&key?).into_owned())
            })
            .collect()
    }

    fn schema(&self, collection: &str) -> Result<KeySchema, StoreError> {
        let bytes = self
            .schemas
            .get(collection.as_bytes())?
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        Ok(KeySchema::from_bytes(&bytes)?)
    }

    fn item_key(collection: &str, schema: &KeySchema, item: &Item) -> Result<Vec<u8>, StoreError> {
        let mut key = Self::prefix(collection);
        key.extend(encode_key(collection, schema, item)?);
        Ok(key)
    }

    fn prefix(collection: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(collection.len() + 1);
        prefix.extend_from_slice(collection.as_bytes());
        prefix.push(SEPARATOR);
        prefix
    }

    /// Resolve a batch into raw tree writes, validating every op first.
    fn prepare(&self, ops: Vec<WriteOp>) -> Result<Vec<(Vec<u8>, Option<Vec<u8>>)>, StoreError> {
        let mut seen = HashSet::new();
        let mut writes = Vec::with_capacity(ops.len());
        for op in ops {
            let schema = self.schema(op.collection())?;
            let write = match op {
                WriteOp::Put { collection, item } => (
                    Self::item_key(&collection, &schema, &item)?,
                    Some(encode_item(&item)?),
                ),
                WriteOp::Delete { collection, key } => {
                    (Self::item_key(&collection, &schema, &key)?, None)
                }
            };
            if !seen.insert(write.0.clone()) {
                return Err(StoreError::BatchRejected(
                    "batch contains more than one operation on the same item".to_string(),
                ));
            }
            writes.push(write);
        }
        Ok(writes)
    }
}

#[async_trait]
impl Store for SledStore {
    async fn create_collection(
        &self,
        name: &str,
        key_schema: KeySchema,
    ) -> Result<(), StoreError> {
        if let Some(existing) = self.schemas.get(name.as_bytes())? {
            let existing = KeySchema::from_bytes(&existing)?;
            if existing != key_schema {
                warn!(collection = name, "Collection exists with a different key schema");
            }
            return Ok(());
        }

        self.schemas.insert(name.as_bytes(), key_schema.to_bytes()?)?;
        debug!(collection = name, "Created collection");
        Ok(())
    }

    async fn put_item(&self, collection: &str, item: Item) -> Result<(), StoreError> {
        let schema = self.schema(collection)?;
        let key = Self::item_key(collection, &schema, &item)?;
        self.items.insert(key, encode_item(&item)?)?;
        Ok(())
    }

    async fn delete_item(&self, collection: &str, key: Item) -> Result<(), StoreError> {
        let schema = self.schema(collection)?;
        self.items
            .remove(Self::item_key(collection, &schema, &key)?)?;
        Ok(())
    }

    async fn scan(&self, collection: &str, request: ScanRequest) -> Result<ScanPage, StoreError> {
        validate_request(&request)?;
        let schema = self.schema(collection)?;

        let start = match &request.cursor {
            Some(cursor) => Bound::Excluded(Self::item_key(collection, &schema, cursor.key())?),
            None => Bound::Included(Self::prefix(collection)),
        };
        let mut end = collection.as_bytes().to_vec();
        end.push(SEPARATOR + 1);

        let limit = request
            .limit
            .map_or(self.page_limit, |l| l.min(self.page_limit));
        let entries = self
            .items
            .range::<Vec<u8>, _>((start, Bound::Excluded(end)))
            .map(|entry| -> Result<Item, StoreError> {
                let (_, bytes) = entry?;
                Ok(decode_item(&bytes)?)
            });

        collect_page(entries, &schema, &request, limit)
    }

    async fn batch_apply(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let writes = self.prepare(ops)?;
        let count = writes.len();

        let result = self.items.transaction(|tx| {
            for (key, value) in &writes {
                match value {
                    Some(bytes) => {
                        tx.insert(key.as_slice(), bytes.as_slice())?;
                    }
                    None => {
                        tx.remove(key.as_slice())?;
                    }
                }
            }
            Ok::<_, ConflictableTransactionError<StoreError>>(())
        });

        match result {
            Ok(()) => {
                debug!(operations = count, "Applied batch");
                Ok(())
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(StoreError::Storage(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynaorm_proto::Value;

    fn open() -> SledStore {
        SledStore::open(SledStoreConfig::temporary().with_page_limit(2)).unwrap()
    }

    fn row(pk: &str, sk: i64) -> Item {
        let mut item = Item::new();
        item.insert("pk".into(), Value::from(pk));
        item.insert("sk".into(), Value::Int(sk));
        item.insert("note".into(), Value::from(format!("{pk}-{sk}")));
        item
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = open();
        let schema = KeySchema::new("pk").with_sort_key("sk");
        store.create_collection("a", schema.clone()).await.unwrap();
        store.create_collection("ab", schema.clone()).await.unwrap();
        store.create_collection("a", schema).await.unwrap();

        store.put_item("a", row("x", 1)).await.unwrap();
        store.put_item("ab", row("x", 2)).await.unwrap();

        let page = store.scan("a", ScanRequest::new()).await.unwrap();
        assert_eq!(page.items, vec![row("x", 1)]);
        assert!(page.cursor.is_none());

        let mut names = store.collections().unwrap();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "ab".to_string()]);
    }

    #[tokio::test]
    async fn test_scan_in_key_order_across_pages() {
        let store = open();
        store
            .create_collection("rows", KeySchema::new("pk").with_sort_key("sk"))
            .await
            .unwrap();
        for sk in [5, -2, 9, 0, 3] {
            store.put_item("rows", row("p", sk)).await.unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = store
                .scan("rows", ScanRequest::new().with_cursor(cursor))
                .await
                .unwrap();
            seen.extend(page.items.iter().filter_map(|i| i.get("sk").and_then(Value::as_i64)));
            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }
        assert_eq!(seen, vec![-2, 0, 3, 5, 9]);
    }

    #[tokio::test]
    async fn test_batch_and_delete() {
        let store = open();
        store
            .create_collection("rows", KeySchema::new("pk").with_sort_key("sk"))
            .await
            .unwrap();

        let bad = vec![WriteOp::put("rows", row("p", 1)), WriteOp::put("missing", row("p", 2))];
        assert!(matches!(
            store.batch_apply(bad).await,
            Err(StoreError::CollectionNotFound(_))
        ));
        assert!(store.scan("rows", ScanRequest::new()).await.unwrap().items.is_empty());

        store
            .batch_apply(vec![WriteOp::put("rows", row("p", 1)), WriteOp::put("rows", row("p", 2))])
            .await
            .unwrap();

        let mut key = Item::new();
        key.insert("pk".into(), Value::from("p"));
        key.insert("sk".into(), Value::Int(1));
        store.delete_item("rows", key).await.unwrap();

        let page = store.scan("rows", ScanRequest::new()).await.unwrap();
        assert_eq!(page.items, vec![row("p", 2)]);
    }
}
