//! Items, key schemas and the binary item codec.

use std::collections::BTreeMap;

use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

use crate::error::Error;
use crate::value::Value;

/// A stored item: attribute (storage) name to value.
pub type Item = BTreeMap<String, Value>;

/// An attribute name and value pair.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct FieldValue {
    /// Attribute name.
    pub field: String,
    /// Attribute value.
    pub value: Value,
}

impl FieldValue {
    /// Create a new attribute/value pair.
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Flat archived form of an [`Item`].
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
struct StoredItem {
    attributes: Vec<FieldValue>,
}

/// Serialize an item to bytes using rkyv.
pub fn encode_item(item: &Item) -> Result<Vec<u8>, Error> {
    let stored = StoredItem {
        attributes: item
            .iter()
            .map(|(name, value)| FieldValue::new(name.clone(), value.clone()))
            .collect(),
    };
    rkyv::to_bytes::<rkyv::rancor::Error>(&stored)
        .map(|v| v.to_vec())
        .map_err(|e| Error::Serialization(e.to_string()))
}

/// Deserialize an item from bytes using rkyv.
///
/// Bytes read back from storage may not be aligned, so they are copied into
/// an aligned buffer first.
pub fn decode_item(bytes: &[u8]) -> Result<Item, Error> {
    let stored = rkyv::from_bytes::<StoredItem, rkyv::rancor::Error>(&aligned(bytes))
        .map_err(|e| Error::Deserialization(e.to_string()))?;
    Ok(stored
        .attributes
        .into_iter()
        .map(|fv| (fv.field, fv.value))
        .collect())
}

fn aligned(bytes: &[u8]) -> AlignedVec {
    let mut buffer = AlignedVec::with_capacity(bytes.len());
    buffer.extend_from_slice(bytes);
    buffer
}

/// Key schema of a collection: the partition key and optional sort key attributes.
#[derive(
    Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub struct KeySchema {
    /// Partition (hash) key attribute name.
    pub partition_key: String,
    /// Sort (range) key attribute name.
    pub sort_key: Option<String>,
}

impl KeySchema {
    /// Key schema with only a partition key.
    pub fn new(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: None,
        }
    }

    /// Add a sort key.
    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    /// Names of the key attributes, partition key first.
    pub fn attributes(&self) -> Vec<&str> {
        let mut names = vec![self.partition_key.as_str()];
        if let Some(sort) = &self.sort_key {
            names.push(sort.as_str());
        }
        names
    }

    /// Serialize the schema using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a schema from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned(bytes))
            .map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Extract the key attributes of an item.
    ///
    /// Returns the name of the first missing (absent or null) key attribute on failure.
    pub fn key_of(&self, item: &Item) -> Result<Item, String> {
        let mut key = Item::new();
        for name in self.attributes() {
            match item.get(name) {
                Some(value) if !value.is_null() => {
                    key.insert(name.to_string(), value.clone());
                }
                _ => return Err(name.to_string()),
            }
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> Item {
        let mut item = Item::new();
        item.insert("id".into(), Value::from("u1"));
        item.insert("age".into(), Value::Int(30));
        item.insert("tags".into(), Value::from(vec!["a", "b"]));
        item
    }

    #[test]
    fn test_item_codec_roundtrip() {
        let item = sample_item();
        let bytes = encode_item(&item).unwrap();
        assert_eq!(decode_item(&bytes).unwrap(), item);
    }

    #[test]
    fn test_key_of() {
        let schema = KeySchema::new("id");
        let key = schema.key_of(&sample_item()).unwrap();
        assert_eq!(key.len(), 1);
        assert_eq!(key.get("id"), Some(&Value::from("u1")));

        let composite = KeySchema::new("id").with_sort_key("sk");
        assert_eq!(composite.key_of(&sample_item()), Err("sk".to_string()));
        assert_eq!(composite.attributes(), vec!["id", "sk"]);
    }

    #[test]
    fn test_key_schema_bytes() {
        let schema = KeySchema::new("pk").with_sort_key("sk");
        let bytes = schema.to_bytes().unwrap();
        assert_eq!(KeySchema::from_bytes(&bytes).unwrap(), schema);
    }
}
