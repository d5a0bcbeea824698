//! Scan requests, scan pages and batch write operations.

use crate::expression::CompiledFilter;
use crate::item::Item;

/// Continuation cursor: the key of the last item a scan page examined.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor(pub Item);

impl Cursor {
    /// Key attributes of the last examined item.
    pub fn key(&self) -> &Item {
        &self.0
    }
}

/// Parameters of one scan page request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanRequest {
    /// Optional compiled filter; `None` scans everything.
    pub filter: Option<CompiledFilter>,
    /// Attribute names to return; `None` returns whole items.
    pub projection: Option<Vec<String>>,
    /// Resume after this key.
    pub cursor: Option<Cursor>,
    /// Maximum number of items to examine for this page.
    pub limit: Option<usize>,
}

impl ScanRequest {
    /// Unfiltered, unprojected scan from the beginning.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: Option<CompiledFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Set the projection.
    pub fn with_projection(mut self, projection: Option<Vec<String>>) -> Self {
        self.projection = projection;
        self
    }

    /// Resume from a cursor.
    pub fn with_cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Bound the number of examined items.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One page of scan results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    /// Items that matched the filter on this page.
    pub items: Vec<Item>,
    /// Cursor for the next page; `None` when the scan is exhausted.
    pub cursor: Option<Cursor>,
}

impl ScanPage {
    /// Whether more pages follow.
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }
}

/// One operation of an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Upsert a full item by its key attributes.
    Put {
        /// Target collection.
        collection: String,
        /// Full item.
        item: Item,
    },
    /// Remove an item by key.
    Delete {
        /// Target collection.
        collection: String,
        /// Key attributes.
        key: Item,
    },
}

impl WriteOp {
    /// Create a put operation.
    pub fn put(collection: impl Into<String>, item: Item) -> Self {
        WriteOp::Put {
            collection: collection.into(),
            item,
        }
    }

    /// Create a delete operation.
    pub fn delete(collection: impl Into<String>, key: Item) -> Self {
        WriteOp::Delete {
            collection: collection.into(),
            key,
        }
    }

    /// Collection this operation targets.
    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Put { collection, .. } | WriteOp::Delete { collection, .. } => collection,
        }
    }
}
