//! Record instances.
//!
//! A [`Record`] is a value buffer (field name to stored value) bound to its
//! [`RecordDescriptor`]. Assignments run the field's write pipeline, reads
//! run its read pipeline. Values loaded from the store are taken as-is.

mod junction;
mod persist;

pub use junction::SyncReport;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dynaorm_proto::{Item, KeyValue, Value};

use crate::catalog::RecordDescriptor;
use crate::error::Error;

/// Field name to stored value.
pub(crate) type Values = BTreeMap<String, Value>;

/// Resolved data of one relation.
#[derive(Debug, Clone)]
pub enum Related {
    /// `ToMany` / `ManyToMany`: empty when queried without matches.
    Many(Vec<Record>),
    /// `ToOne` / `BelongsToOne`: `None` when queried without a match.
    One(Option<Box<Record>>),
}

/// One record of a registered type.
#[derive(Clone)]
pub struct Record {
    descriptor: Arc<RecordDescriptor>,
    values: Values,
    relations: BTreeMap<String, Related>,
    persisted: bool,
    projected: bool,
}

impl Record {
    fn empty(descriptor: Arc<RecordDescriptor>) -> Self {
        Self {
            descriptor,
            values: Values::new(),
            relations: BTreeMap::new(),
            persisted: false,
            projected: false,
        }
    }

    /// Build a new record from user data.
    ///
    /// Each value runs through its field's write pipeline, then defaults
    /// populate the fields left absent.
    pub fn build<K, V>(
        descriptor: Arc<RecordDescriptor>,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, Error>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = Self::empty(descriptor);
        for (field, value) in data {
            record.set(field.as_ref(), value)?;
        }
        record.fill_defaults()?;
        Ok(record)
    }

    /// Build a new record from a plain JSON object.
    ///
    /// Keys naming relations are skipped; related data is never written
    /// through the owner.
    pub fn from_plain_object(
        descriptor: Arc<RecordDescriptor>,
        object: &serde_json::Value,
    ) -> Result<Self, Error> {
        let map = object.as_object().ok_or_else(|| {
            dynaorm_proto::Error::InvalidValue(format!(
                "expected an object for '{}'",
                descriptor.name()
            ))
        })?;

        let mut record = Self::empty(descriptor);
        for (key, json) in map {
            if record.descriptor.field(key).is_some_and(|f| f.is_relation()) {
                continue;
            }
            record.set(key, Value::from_json(json)?)?;
        }
        record.fill_defaults()?;
        Ok(record)
    }

    /// Load a record from a stored item. Pipelines are not run.
    pub fn from_item(descriptor: Arc<RecordDescriptor>, item: Item) -> Self {
        let mut record = Self::empty(descriptor);
        for (attribute, value) in item {
            let Some(field) = record.descriptor.field_by_storage_name(&attribute) else {
                continue;
            };
            if field.is_relation() || value.is_null() {
                continue;
            }
            let name = field.name().to_string();
            record.values.insert(name, value);
        }
        record.persisted = true;
        record
    }

    fn fill_defaults(&mut self) -> Result<(), Error> {
        let absent: Vec<String> = self
            .descriptor
            .scalar_fields()
            .filter(|f| f.default().is_some() && !self.values.contains_key(f.name()))
            .map(|f| f.name().to_string())
            .collect();
        for field in absent {
            self.set(&field, Value::Null)?;
        }
        Ok(())
    }

    /// Assign a field through its write pipeline.
    ///
    /// Null realizes the field's default if it has one; otherwise it clears
    /// the field, which non-nullable fields reject. A rejected assignment
    /// leaves the previous value in place.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<(), Error> {
        let descriptor = self.descriptor.clone();
        let field = descriptor.scalar_field(field)?;

        let mut incoming = value.into();
        if incoming.is_null() {
            if let Some(default) = field.default() {
                incoming = default.realize();
            }
        }
        if incoming.is_null() {
            if !field.is_nullable() {
                return Err(Error::validation(field.name(), "must not be null"));
            }
            self.values.remove(field.name());
            return Ok(());
        }

        let current = self.values.get(field.name()).cloned().unwrap_or(Value::Null);
        let next = field.apply_write(&current, incoming)?;
        if next.is_null() {
            self.values.remove(field.name());
        } else {
            self.values.insert(field.name().to_string(), next);
        }
        Ok(())
    }

    /// Assign several fields. Either all assignments succeed or none is kept.
    pub fn assign<K, V>(&mut self, changes: impl IntoIterator<Item = (K, V)>) -> Result<(), Error>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let snapshot = self.values.clone();
        for (field, value) in changes {
            if let Err(e) = self.set(field.as_ref(), value) {
                self.values = snapshot;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Read a field through its read pipeline.
    ///
    /// An absent value with a default realizes the default once and keeps it,
    /// so repeated reads are stable.
    pub fn get(&mut self, field: &str) -> Result<Value, Error> {
        let descriptor = self.descriptor.clone();
        let field = descriptor.scalar_field(field)?;

        if !self.values.contains_key(field.name()) {
            if let Some(default) = field.default() {
                let value = default.realize();
                if !value.is_null() {
                    self.values.insert(field.name().to_string(), value);
                }
            }
        }
        Ok(self.exposed(field.name()))
    }

    /// Read a field without realizing defaults.
    pub fn peek(&self, field: &str) -> Result<Value, Error> {
        let field = self.descriptor.scalar_field(field)?;
        Ok(self.exposed(field.name()))
    }

    fn exposed(&self, name: &str) -> Value {
        match (self.values.get(name), self.descriptor.field(name)) {
            (Some(value), Some(field)) => field.apply_read(value.clone()),
            _ => Value::Null,
        }
    }

    /// Stored value of the primary key.
    pub fn id(&self) -> Option<&Value> {
        let name = self.descriptor.primary_key_name().ok()?;
        self.values.get(name)
    }

    /// Key attributes identifying this record in its collection.
    pub fn key(&self) -> Result<Item, Error> {
        let schema = self.descriptor.key_schema()?;
        schema.key_of(&self.to_item()).map_err(|attribute| {
            Error::NotPersisted(format!(
                "'{}' has no value for key attribute '{attribute}'",
                self.descriptor.name()
            ))
        })
    }

    /// Stored values keyed by storage name.
    pub fn to_item(&self) -> Item {
        item_of(&self.descriptor, &self.values)
    }

    /// Serialize exposed scalar values and loaded relations.
    ///
    /// Null values are skipped. Relations that were never loaded are
    /// omitted; loaded ones appear as an array, an object or `null`.
    pub fn to_plain_object(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for field in self.descriptor.scalar_fields() {
            let value = self.exposed(field.name());
            if !value.is_null() {
                object.insert(field.name().to_string(), value.to_json());
            }
        }
        for (name, related) in &self.relations {
            let json = match related {
                Related::Many(records) => {
                    serde_json::Value::Array(records.iter().map(Record::to_plain_object).collect())
                }
                Related::One(Some(record)) => record.to_plain_object(),
                Related::One(None) => serde_json::Value::Null,
            };
            object.insert(name.clone(), json);
        }
        serde_json::Value::Object(object)
    }

    /// Loaded data of a relation; `None` when it was not included.
    pub fn related(&self, relation: &str) -> Option<&Related> {
        self.relations.get(relation)
    }

    /// Loaded records of a to-many relation.
    pub fn many(&self, relation: &str) -> Option<&[Record]> {
        match self.relations.get(relation)? {
            Related::Many(records) => Some(records),
            Related::One(_) => None,
        }
    }

    /// Loaded record of a to-one relation.
    pub fn one(&self, relation: &str) -> Option<&Record> {
        match self.relations.get(relation)? {
            Related::One(record) => record.as_deref(),
            Related::Many(_) => None,
        }
    }

    pub(crate) fn set_related(&mut self, relation: &str, related: Related) {
        self.relations.insert(relation.to_string(), related);
    }

    /// Stored value of `field` as a join key.
    pub(crate) fn key_value(&self, field: &str) -> Option<KeyValue> {
        self.values.get(field).and_then(Value::to_key)
    }

    /// Whether the record was loaded from or written to the store.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Whether the record was loaded with only some of its fields.
    ///
    /// Such a record can be read and physically deleted but not saved, since
    /// writing it back would drop the attributes left out of the projection.
    pub fn is_projected(&self) -> bool {
        self.projected
    }

    pub(crate) fn mark_projected(&mut self) {
        self.projected = true;
    }

    /// Whether the soft-delete marker is set.
    pub fn is_trashed(&self) -> bool {
        self.descriptor
            .soft_delete_field()
            .is_some_and(|marker| self.values.contains_key(marker.name()))
    }

    /// Descriptor of this record's type.
    pub fn descriptor(&self) -> &Arc<RecordDescriptor> {
        &self.descriptor
    }
}

fn item_of(descriptor: &RecordDescriptor, values: &Values) -> Item {
    values
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| {
            (
                descriptor.storage_name_of(name).to_string(),
                value.clone(),
            )
        })
        .collect()
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.descriptor.name())
            .field("values", &self.values)
            .field("relations", &self.relations)
            .field("persisted", &self.persisted)
            .field("projected", &self.projected)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::catalog::Registry;
    use crate::pipeline::{mutators, validators};
    use pretty_assertions::assert_eq;

    struct User;
    struct Order;

    fn users() -> Arc<RecordDescriptor> {
        let registry = Registry::new();
        registry
            .model::<User>()
            .partition_key("id")
            .field("email", |f| {
                f.mutate(mutators::trim())
                    .mutate(mutators::lowercase())
                    .validate(validators::is_email());
            })
            .field("role", |f| {
                f.default_value("member");
            })
            .field("nickname", |f| {
                f.getter(|v| match v {
                    Value::String(s) => Value::String(format!("~{s}")),
                    other => other,
                });
            })
            .storage_name("email", "email_address")
            .has_many::<Order>("orders", "user_id")
            .build()
            .unwrap()
    }

    #[test]
    fn test_write_pipeline_runs_in_order() {
        let mut user = Record::build(users(), [("id", "u1")]).unwrap();
        user.set("email", "  JOHN@X.COM  ").unwrap();
        assert_eq!(user.peek("email").unwrap(), Value::from("john@x.com"));

        let err = user.set("email", "not-an-email").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(user.peek("email").unwrap(), Value::from("john@x.com"));
    }

    #[test]
    fn test_defaults_populate_absent_fields() {
        let user = Record::build(users(), [("id", "u1")]).unwrap();
        assert_eq!(user.peek("role").unwrap(), Value::from("member"));

        let mut cleared = user.clone();
        cleared.set("role", Value::Null).unwrap();
        assert_eq!(cleared.peek("role").unwrap(), Value::from("member"));
    }

    #[test]
    fn test_default_factory_runs_once_per_absence() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = Registry::new();
        let descriptor = registry
            .model::<User>()
            .partition_key("id")
            .field("token", move |f| {
                let counter = counter.clone();
                f.default_with(move || Value::Int(counter.fetch_add(1, Ordering::SeqCst) as i64));
            })
            .build()
            .unwrap();

        let mut loaded = Record::from_item(descriptor.clone(), Item::from([("id".into(), "a".into())]));
        assert_eq!(loaded.get("token").unwrap(), Value::Int(0));
        assert_eq!(loaded.get("token").unwrap(), Value::Int(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let other = Record::build(descriptor, [("id", "b")]).unwrap();
        assert_eq!(other.peek("token").unwrap(), Value::Int(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_non_nullable_rejects_null() {
        let mut user = Record::build(users(), [("id", "u1")]).unwrap();
        let err = user.set("id", Value::Null).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(user.id(), Some(&Value::from("u1")));
    }

    #[test]
    fn test_assign_is_all_or_nothing() {
        let mut user = Record::build(users(), [("id", "u1"), ("email", "a@b.io")]).unwrap();
        let result = user.assign([("role", "admin"), ("email", "broken")]);
        assert!(result.is_err());
        assert_eq!(user.peek("role").unwrap(), Value::from("member"));
        assert_eq!(user.peek("email").unwrap(), Value::from("a@b.io"));
    }

    #[test]
    fn test_unknown_and_relation_fields_are_not_assignable() {
        let mut user = Record::build(users(), [("id", "u1")]).unwrap();
        assert!(matches!(user.set("missing", 1), Err(Error::UnknownField { .. })));
        assert!(matches!(user.set("orders", 1), Err(Error::UnknownField { .. })));
    }

    #[test]
    fn test_storage_names_and_read_pipeline() {
        let descriptor = users();
        let user = Record::build(
            descriptor.clone(),
            [("id", "u1"), ("email", "a@b.io"), ("nickname", "al")],
        )
        .unwrap();

        let item = user.to_item();
        assert_eq!(item.get("email_address"), Some(&Value::from("a@b.io")));
        assert!(!item.contains_key("email"));
        assert_eq!(item.get("nickname"), Some(&Value::from("al")));

        let loaded = Record::from_item(descriptor, item);
        assert!(loaded.is_persisted());
        assert_eq!(loaded.peek("email").unwrap(), Value::from("a@b.io"));
        assert_eq!(loaded.peek("nickname").unwrap(), Value::from("~al"));
    }

    #[test]
    fn test_plain_object_round_trip() {
        let descriptor = users();
        let user = Record::build(descriptor.clone(), [("id", "u1"), ("email", "a@b.io")]).unwrap();
        let plain = user.to_plain_object();
        assert_eq!(
            plain,
            serde_json::json!({"id": "u1", "email": "a@b.io", "role": "member"})
        );

        let again = Record::from_plain_object(descriptor, &plain).unwrap();
        for field in ["id", "email", "role", "nickname"] {
            assert_eq!(again.peek(field).unwrap(), user.peek(field).unwrap());
        }
    }

    #[test]
    fn test_plain_object_relations() {
        let mut user = Record::build(users(), [("id", "u1")]).unwrap();
        assert!(user.to_plain_object().get("orders").is_none());

        user.set_related("orders", Related::Many(Vec::new()));
        assert_eq!(user.to_plain_object()["orders"], serde_json::json!([]));
        assert_eq!(user.many("orders").map(<[Record]>::len), Some(0));
    }

    #[test]
    fn test_key_requires_partition_value() {
        let user = Record::build(users(), [("email", "a@b.io")]).unwrap();
        assert!(matches!(user.key(), Err(Error::NotPersisted(_))));

        let keyed = Record::build(users(), [("id", "u1")]).unwrap();
        assert_eq!(keyed.key().unwrap(), Item::from([("id".into(), "u1".into())]));
    }
}
