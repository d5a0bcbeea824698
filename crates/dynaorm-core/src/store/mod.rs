//! Store boundary.
//!
//! The mapping layer never owns storage. It talks to a [`Store`] offering the
//! primitives of a key-value document store: idempotent collection creation,
//! put/delete by key, cursor-paginated filtered scans and an atomic batch.
//! Two in-process implementations are provided: [`MemoryStore`] and
//! [`SledStore`].

mod error;
mod memory;
mod sled_store;

pub mod key;

use async_trait::async_trait;

use dynaorm_proto::{Cursor, Item, KeySchema, Predicate, ScanPage, ScanRequest, WriteOp};

pub use error::StoreError;
pub use memory::{MemoryStore, StoreStats};
pub use sled_store::{SledStore, SledStoreConfig};

/// Default number of items a backend examines per scan page.
pub const DEFAULT_PAGE_LIMIT: usize = 1000;

/// Primitives consumed from the external store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create a collection. Creating an existing collection is not an error.
    async fn create_collection(&self, name: &str, key_schema: KeySchema)
        -> Result<(), StoreError>;

    /// Upsert a full item by its key attributes.
    async fn put_item(&self, collection: &str, item: Item) -> Result<(), StoreError>;

    /// Remove an item by key. Removing a missing item is not an error.
    async fn delete_item(&self, collection: &str, key: Item) -> Result<(), StoreError>;

    /// Return one bounded page of matching items.
    async fn scan(&self, collection: &str, request: ScanRequest) -> Result<ScanPage, StoreError>;

    /// Apply all operations atomically, or none of them.
    async fn batch_apply(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;
}

/// Reject requests the store refuses outright.
pub(crate) fn validate_request(request: &ScanRequest) -> Result<(), StoreError> {
    if let Some(projection) = &request.projection {
        if projection.is_empty() {
            return Err(StoreError::InvalidRequest(
                "projection must name at least one attribute".to_string(),
            ));
        }
    }
    if let Some(filter) = &request.filter {
        check_predicate(&filter.predicate)?;
    }
    Ok(())
}

fn check_predicate(predicate: &Predicate) -> Result<(), StoreError> {
    match predicate {
        Predicate::In { values, .. } if values.is_empty() => Err(StoreError::InvalidRequest(
            "IN requires at least one operand".to_string(),
        )),
        Predicate::Not(inner) => check_predicate(inner),
        Predicate::And(children) if children.is_empty() => Err(StoreError::InvalidRequest(
            "empty filter expression".to_string(),
        )),
        Predicate::And(children) => children.iter().try_for_each(check_predicate),
        _ => Ok(()),
    }
}

/// Collect one scan page from key-ordered entries.
///
/// `limit` bounds the number of examined items, matched or not. The cursor is
/// the key of the last examined item and is only set when entries remain.
pub(crate) fn collect_page<I>(
    entries: I,
    schema: &KeySchema,
    request: &ScanRequest,
    limit: usize,
) -> Result<ScanPage, StoreError>
where
    I: Iterator<Item = Result<Item, StoreError>>,
{
    let limit = limit.max(1);
    let mut entries = entries.peekable();
    let mut items = Vec::new();
    let mut examined = 0;
    let mut last_key = None;

    while let Some(entry) = entries.next() {
        let item = entry?;
        examined += 1;

        let matched = match &request.filter {
            Some(filter) => filter
                .evaluate(&item)
                .map_err(|e| StoreError::InvalidRequest(e.to_string()))?,
            None => true,
        };
        last_key = schema.key_of(&item).ok();
        if matched {
            items.push(project(item, request.projection.as_deref()));
        }
        if examined >= limit {
            break;
        }
    }

    let cursor = if examined >= limit && entries.peek().is_some() {
        last_key.map(Cursor)
    } else {
        None
    };
    Ok(ScanPage { items, cursor })
}

fn project(item: Item, projection: Option<&[String]>) -> Item {
    match projection {
        Some(names) => item
            .into_iter()
            .filter(|(name, _)| names.iter().any(|n| n == name))
            .collect(),
        None => item,
    }
}
