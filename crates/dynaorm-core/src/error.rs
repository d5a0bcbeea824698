//! Core error types.

use thiserror::Error;

use crate::store::StoreError;

/// Errors raised by the mapping layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Schema declaration mistake (duplicate keys, conflicting names, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// A field rejected a value at assignment or persist time.
    #[error("validation failed for '{field}': {message}")]
    Validation {
        /// Field that rejected the value.
        field: String,
        /// Validator message.
        message: String,
    },

    /// Malformed query input (negative limit, bad arguments).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Unrecognized comparison operator.
    #[error("unknown operator '{operator}', expected one of: {valid}")]
    InvalidOperator {
        /// Operator as supplied.
        operator: String,
        /// Canonical operator names.
        valid: String,
    },

    /// Include or attach referenced a relation the record type does not declare.
    #[error("record type '{model}' has no relation '{relation}'")]
    UnknownRelation {
        /// Record type name.
        model: String,
        /// Requested relation.
        relation: String,
    },

    /// A record type was used before being registered.
    #[error("record type '{0}' is not registered")]
    UnknownModel(String),

    /// Unknown field name.
    #[error("record type '{model}' has no field '{field}'")]
    UnknownField {
        /// Record type name.
        model: String,
        /// Requested field.
        field: String,
    },

    /// Operation requires a persisted record.
    #[error("record is not persisted: {0}")]
    NotPersisted(String),

    /// Record was loaded with only some of its fields and cannot be written back.
    #[error("'{0}' record was loaded with a projection; reload it with all fields to save it")]
    PartialRecord(String),

    /// No store connection is available.
    #[error("session is not connected to a store")]
    NotConnected,

    /// Batch exceeds the store's atomic batch bound.
    #[error("batch of {size} operations exceeds the maximum of {max}")]
    BatchTooLarge {
        /// Number of queued operations.
        size: usize,
        /// Configured bound.
        max: usize,
    },

    /// Store rejected or failed an operation.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] dynaorm_proto::Error),
}

impl Error {
    /// Shorthand for a validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}
