//! Store boundary errors.

use thiserror::Error;

/// Errors reported by a [`Store`](super::Store) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The collection has not been created.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// An item or key lacks one of the collection's key attributes.
    #[error("item in '{collection}' is missing key attribute '{attribute}'")]
    MissingKeyAttribute {
        /// Target collection.
        collection: String,
        /// Missing attribute.
        attribute: String,
    },

    /// The request itself is malformed (empty projection, empty IN list, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A batch was rejected as a whole; nothing was applied.
    #[error("batch rejected: {0}")]
    BatchRejected(String),

    /// Key value cannot be encoded.
    #[error("unsupported key value for '{0}'")]
    UnsupportedKey(String),

    /// Underlying sled failure.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Item encoding failure.
    #[error("codec error: {0}")]
    Codec(#[from] dynaorm_proto::Error),
}
