//! dynaorm protocol types.
//!
//! This crate defines the data exchanged between the mapping layer and a
//! key-value document store: scalar values, items, structural filters and
//! the store-native filter expressions they compile to.
//!
//! # Modules
//!
//! - [`value`] - Runtime attribute values
//! - [`item`] - Items (attribute maps), key schemas and the binary item codec
//! - [`filter`] - Structural filters written by application code
//! - [`expression`] - Placeholder-based filter expressions understood by stores
//! - [`request`] - Scan requests/pages and batch write operations
//! - [`error`] - Protocol error types
//!
//! # Serialization
//!
//! [`Value`] and the stored item representation derive `rkyv::Archive`,
//! `rkyv::Serialize` and `rkyv::Deserialize` for the binary item codec, and
//! convert to and from `serde_json::Value` for plain-object output:
//!
//! ```ignore
//! use dynaorm_proto::{item, Item, Value};
//!
//! let mut row = Item::new();
//! row.insert("id".into(), Value::from("u1"));
//! let bytes = item::encode_item(&row).unwrap();
//! assert_eq!(item::decode_item(&bytes).unwrap(), row);
//! ```

pub mod error;
pub mod expression;
pub mod filter;
pub mod item;
pub mod request;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use expression::{Comparator, CompiledFilter, Predicate};
pub use filter::{Criterion, Filter, FilterEntry, Operand, Operator};
pub use item::{decode_item, encode_item, FieldValue, Item, KeySchema};
pub use request::{Cursor, ScanPage, ScanRequest, WriteOp};
pub use value::{KeyValue, Value};
