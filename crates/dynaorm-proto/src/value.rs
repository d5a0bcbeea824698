//! Runtime value types for item attributes.

use std::cmp::Ordering;

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

use crate::error::Error;

/// An attribute value as stored in an item.
///
/// The store has no nested documents, so arrays are typed (the same shape as
/// the store's string/number sets) rather than recursive.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub enum Value {
    /// Explicit null.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Timestamp as microseconds since Unix epoch.
    Timestamp(i64),
    /// Array of strings.
    StringArray(Vec<String>),
    /// Array of integers.
    IntArray(Vec<i64>),
    /// Array of floats.
    FloatArray(Vec<f64>),
}

/// A hashable, totally ordered projection of a [`Value`].
///
/// Used wherever values act as identities: item keys, join keys and
/// relationship grouping. Only scalar, non-float values qualify.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    /// Boolean key.
    Bool(bool),
    /// Integer key (timestamps join integers).
    Int(i64),
    /// String key.
    String(String),
    /// Binary key.
    Bytes(Vec<u8>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is an array type.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Value::StringArray(_) | Value::IntArray(_) | Value::FloatArray(_)
        )
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::StringArray(_) => "string[]",
            Value::IntArray(_) => "int[]",
            Value::FloatArray(_) => "float[]",
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) | Value::Timestamp(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as timestamp.
    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Project this value into a key, if it can act as one.
    pub fn to_key(&self) -> Option<KeyValue> {
        match self {
            Value::Bool(b) => Some(KeyValue::Bool(*b)),
            Value::Int(i) | Value::Timestamp(i) => Some(KeyValue::Int(*i)),
            Value::String(s) => Some(KeyValue::String(s.clone())),
            Value::Bytes(b) => Some(KeyValue::Bytes(b.clone())),
            _ => None,
        }
    }

    /// Split an array value into its elements. Scalars yield themselves.
    pub fn into_elements(self) -> Vec<Value> {
        match self {
            Value::StringArray(items) => items.into_iter().map(Value::String).collect(),
            Value::IntArray(items) => items.into_iter().map(Value::Int).collect(),
            Value::FloatArray(items) => items.into_iter().map(Value::Float).collect(),
            other => vec![other],
        }
    }

    /// Equality with numeric widening (ints compare equal to floats of the same value).
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Timestamp(a), Value::Int(b)) | (Value::Int(b), Value::Timestamp(a)) => a == b,
            (a, b) => a == b,
        }
    }

    /// Compare two values, returning their ordering if comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Timestamp(a), Value::Timestamp(b))
            | (Value::Timestamp(a), Value::Int(b))
            | (Value::Int(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None, // Incompatible types
        }
    }

    /// Substring containment for strings, element containment for arrays.
    pub fn contains(&self, needle: &Value) -> bool {
        match (self, needle) {
            (Value::String(haystack), Value::String(n)) => haystack.contains(n.as_str()),
            (Value::Bytes(haystack), Value::Bytes(n)) => {
                n.is_empty() || haystack.windows(n.len()).any(|w| w == n.as_slice())
            }
            (Value::StringArray(items), Value::String(n)) => items.iter().any(|s| s == n),
            (Value::IntArray(items), Value::Int(n)) => items.contains(n),
            (Value::FloatArray(items), needle) => match needle.as_f64() {
                Some(n) => items.iter().any(|f| *f == n),
                None => false,
            },
            (Value::IntArray(items), Value::Float(n)) => items.iter().any(|i| (*i as f64) == *n),
            _ => false,
        }
    }

    /// Prefix match for strings and binary data.
    pub fn begins_with(&self, prefix: &Value) -> bool {
        match (self, prefix) {
            (Value::String(s), Value::String(p)) => s.starts_with(p.as_str()),
            (Value::Bytes(b), Value::Bytes(p)) => b.starts_with(p),
            _ => false,
        }
    }

    /// Convert to a JSON value for plain-object output.
    ///
    /// Non-finite floats have no JSON form and become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) | Value::Timestamp(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::Array(b.iter().map(|byte| Json::from(*byte)).collect()),
            Value::StringArray(items) => {
                Json::Array(items.iter().map(|s| Json::String(s.clone())).collect())
            }
            Value::IntArray(items) => Json::Array(items.iter().map(|i| Json::from(*i)).collect()),
            Value::FloatArray(items) => Json::Array(
                items
                    .iter()
                    .map(|f| {
                        serde_json::Number::from_f64(*f)
                            .map(Json::Number)
                            .unwrap_or(Json::Null)
                    })
                    .collect(),
            ),
        }
    }

    /// Convert from a JSON value.
    ///
    /// Arrays must be homogeneous; nested objects are rejected because the
    /// attribute model has no map type.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, Error> {
        use serde_json::Value as Json;

        match json {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => n
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| Error::InvalidValue(format!("unrepresentable number {n}"))),
            },
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Array(items) => Self::array_from_json(items),
            Json::Object(_) => Err(Error::InvalidValue(
                "nested objects are not supported as attribute values".to_string(),
            )),
        }
    }

    fn array_from_json(items: &[serde_json::Value]) -> Result<Self, Error> {
        if items.iter().all(|v| v.is_string()) {
            return Ok(Value::StringArray(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ));
        }
        if items.iter().all(|v| v.is_i64()) {
            return Ok(Value::IntArray(items.iter().filter_map(|v| v.as_i64()).collect()));
        }
        if items.iter().all(|v| v.is_number()) {
            return Ok(Value::FloatArray(items.iter().filter_map(|v| v.as_f64()).collect()));
        }
        Err(Error::InvalidValue("arrays must be homogeneous".to_string()))
    }
}

impl From<KeyValue> for Value {
    fn from(key: KeyValue) -> Self {
        match key {
            KeyValue::Bool(b) => Value::Bool(b),
            KeyValue::Int(i) => Value::Int(i),
            KeyValue::String(s) => Value::String(s),
            KeyValue::Bytes(b) => Value::Bytes(b),
        }
    }
}

// Conversion implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringArray(v)
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::StringArray(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::IntArray(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::FloatArray(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(true).is_null());

        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(42).as_i64(), Some(42));
        assert_eq!(Value::Int(42).as_f64(), Some(42.0)); // Widening conversion
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::Timestamp(7).as_timestamp(), Some(7));
    }

    #[test]
    fn test_value_conversions() {
        let v: Value = 42i32.into();
        assert_eq!(v, Value::Int(42));

        let v: Value = "hello".into();
        assert_eq!(v, Value::String("hello".into()));

        let v: Value = None::<i64>.into();
        assert_eq!(v, Value::Null);

        let v: Value = vec!["a", "b"].into();
        assert!(v.is_array());
    }

    #[test]
    fn test_key_projection() {
        assert_eq!(Value::from("u1").to_key(), Some(KeyValue::String("u1".into())));
        assert_eq!(Value::Timestamp(5).to_key(), Value::Int(5).to_key());
        assert_eq!(Value::Float(1.5).to_key(), None);
        assert_eq!(Value::Null.to_key(), None);
    }

    #[test]
    fn test_compare_numeric_widening() {
        assert_eq!(Value::Int(3).compare(&Value::Float(2.5)), Some(Ordering::Greater));
        assert_eq!(Value::Int(3).compare(&Value::from("3")), None);
        assert!(Value::Int(2).loosely_equals(&Value::Float(2.0)));
        assert!(!Value::Int(2).loosely_equals(&Value::from("2")));
    }

    #[test]
    fn test_contains_and_prefix() {
        assert!(Value::from("hello world").contains(&Value::from("lo w")));
        assert!(Value::from(vec!["admin", "staff"]).contains(&Value::from("staff")));
        assert!(Value::IntArray(vec![1, 2, 3]).contains(&Value::Int(2)));
        assert!(!Value::Int(5).contains(&Value::Int(5)));

        assert!(Value::from("user#42").begins_with(&Value::from("user#")));
        assert!(!Value::from("user#42").begins_with(&Value::from("order#")));
    }

    #[test]
    fn test_json_conversion() {
        assert_eq!(Value::Int(5).to_json(), json!(5));
        assert_eq!(Value::from(vec!["a", "b"]).to_json(), json!(["a", "b"]));
        assert_eq!(Value::Float(f64::NAN).to_json(), json!(null));

        assert_eq!(Value::from_json(&json!("x")).unwrap(), Value::from("x"));
        assert_eq!(Value::from_json(&json!(1.5)).unwrap(), Value::Float(1.5));
        assert_eq!(
            Value::from_json(&json!([1, 2])).unwrap(),
            Value::IntArray(vec![1, 2])
        );
        assert!(Value::from_json(&json!({"a": 1})).is_err());
        assert!(Value::from_json(&json!([1, "a"])).is_err());
    }
}
