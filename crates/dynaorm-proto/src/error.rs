//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A value cannot be represented in the store's attribute model.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A filter expression references a placeholder missing from its side tables.
    #[error("unresolved placeholder: {0}")]
    UnresolvedPlaceholder(String),
}
