//! Field descriptors and their read/write pipelines.

use std::fmt;
use std::sync::Arc;

use dynaorm_proto::Value;

use super::relation::RelationDescriptor;
use crate::error::Error;

/// Read step: stored value to exposed value.
pub type ReadFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Write step: `(current, accumulated) -> next`. An error rejects the assignment.
pub type WriteFn = Arc<dyn Fn(&Value, Value) -> Result<Value, Error> + Send + Sync>;

/// Validator: `Err(message)` rejects the value.
pub type ValidateFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Default value of a field.
#[derive(Clone)]
pub enum DefaultValue {
    /// The same value every time.
    Constant(Value),
    /// Invoked once per absent occurrence.
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// Produce a value.
    pub fn realize(&self) -> Value {
        match self {
            DefaultValue::Constant(value) => value.clone(),
            DefaultValue::Factory(factory) => factory(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            DefaultValue::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Lifecycle role of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Set to the deletion instant by a soft delete.
    SoftDelete,
    /// Set on first insert.
    CreatedAt,
    /// Refreshed before every write.
    UpdatedAt,
}

/// One declared property of a record type.
#[derive(Clone)]
pub struct FieldDescriptor {
    name: String,
    storage_name: Option<String>,
    pub(crate) primary_key: bool,
    pub(crate) partition_key: bool,
    pub(crate) sort_key: bool,
    nullable: bool,
    pub(crate) lifecycle: Option<Lifecycle>,
    default: Option<DefaultValue>,
    read_pipeline: Vec<ReadFn>,
    write_pipeline: Vec<WriteFn>,
    lazy_validators: Vec<ValidateFn>,
    pub(crate) relation: Option<RelationDescriptor>,
}

impl FieldDescriptor {
    /// Create a nullable scalar field with empty pipelines.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage_name: None,
            primary_key: false,
            partition_key: false,
            sort_key: false,
            nullable: true,
            lifecycle: None,
            default: None,
            read_pipeline: Vec::new(),
            write_pipeline: Vec::new(),
            lazy_validators: Vec::new(),
            relation: None,
        }
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute name used in stored items.
    pub fn storage_name(&self) -> &str {
        self.storage_name.as_deref().unwrap_or(&self.name)
    }

    /// Whether a custom storage name was declared.
    pub fn has_custom_storage_name(&self) -> bool {
        self.storage_name.is_some()
    }

    /// Whether this field is the record identity.
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Whether this field is the partition key.
    pub fn is_partition_key(&self) -> bool {
        self.partition_key
    }

    /// Whether this field is the sort key.
    pub fn is_sort_key(&self) -> bool {
        self.sort_key
    }

    /// Whether absent values are permitted. Key fields never are.
    pub fn is_nullable(&self) -> bool {
        self.nullable && !self.partition_key && !self.sort_key
    }

    /// Lifecycle role, if any.
    pub fn lifecycle(&self) -> Option<Lifecycle> {
        self.lifecycle
    }

    /// Declared default.
    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Relation declared on this field.
    pub fn relation(&self) -> Option<&RelationDescriptor> {
        self.relation.as_ref()
    }

    /// Whether this field is a relation rather than scalar data.
    pub fn is_relation(&self) -> bool {
        self.relation.is_some()
    }

    /// Whether any lazy validator is attached.
    pub fn has_lazy_validators(&self) -> bool {
        !self.lazy_validators.is_empty()
    }

    /// Declare the storage name.
    ///
    /// Declaring the same name again is a no-op; a different one is an error.
    pub fn set_storage_name(&mut self, storage_name: impl Into<String>) -> Result<&mut Self, Error> {
        let storage_name = storage_name.into();
        match &self.storage_name {
            Some(existing) if *existing != storage_name => Err(Error::Config(format!(
                "field '{}' already stored as '{}', cannot rename to '{}'",
                self.name, existing, storage_name
            ))),
            _ => {
                self.storage_name = Some(storage_name);
                Ok(self)
            }
        }
    }

    /// Reject absent values at persist time.
    pub fn not_null(&mut self) -> &mut Self {
        self.nullable = false;
        self
    }

    /// Use a constant default.
    pub fn default_value(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = Some(DefaultValue::Constant(value.into()));
        self
    }

    /// Use a factory default.
    pub fn default_with(&mut self, factory: impl Fn() -> Value + Send + Sync + 'static) -> &mut Self {
        self.default = Some(DefaultValue::Factory(Arc::new(factory)));
        self
    }

    /// Append a write step.
    pub fn transform(
        &mut self,
        step: impl Fn(&Value, Value) -> Result<Value, Error> + Send + Sync + 'static,
    ) -> &mut Self {
        self.write_pipeline.push(Arc::new(step));
        self
    }

    /// Append a write step that rewrites the incoming value.
    pub fn mutate(&mut self, mutator: impl Fn(Value) -> Value + Send + Sync + 'static) -> &mut Self {
        self.transform(move |_, value| Ok(mutator(value)))
    }

    /// Append an assignment-time validator.
    pub fn validate(
        &mut self,
        validator: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> &mut Self {
        let field = self.name.clone();
        self.transform(move |_, value| match validator(&value) {
            Ok(()) => Ok(value),
            Err(message) => Err(Error::validation(field.as_str(), message)),
        })
    }

    /// Attach a validator that runs before persisting instead of on assignment.
    pub fn validate_lazy(
        &mut self,
        validator: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> &mut Self {
        self.lazy_validators.push(Arc::new(validator));
        self
    }

    /// Append a read step.
    pub fn getter(&mut self, getter: impl Fn(Value) -> Value + Send + Sync + 'static) -> &mut Self {
        self.read_pipeline.push(Arc::new(getter));
        self
    }

    /// Fold the read pipeline over a stored value.
    pub fn apply_read(&self, stored: Value) -> Value {
        self.read_pipeline.iter().fold(stored, |value, step| step(value))
    }

    /// Fold the write pipeline, seeding the accumulator with `incoming`.
    pub fn apply_write(&self, current: &Value, incoming: Value) -> Result<Value, Error> {
        self.write_pipeline
            .iter()
            .try_fold(incoming, |value, step| step(current, value))
    }

    /// Run lazy validators in order; the first failure wins.
    pub fn run_lazy_validators(&self, value: &Value) -> Result<(), Error> {
        for validator in &self.lazy_validators {
            validator(value).map_err(|message| Error::validation(self.name.as_str(), message))?;
        }
        Ok(())
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("storage_name", &self.storage_name())
            .field("partition_key", &self.partition_key)
            .field("sort_key", &self.sort_key)
            .field("nullable", &self.nullable)
            .field("lifecycle", &self.lifecycle)
            .field("default", &self.default)
            .field("read_steps", &self.read_pipeline.len())
            .field("write_steps", &self.write_pipeline.len())
            .field("lazy_validators", &self.lazy_validators.len())
            .field("relation", &self.relation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upper(value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other,
        }
    }

    #[test]
    fn test_write_pipeline_runs_in_order() {
        let mut field = FieldDescriptor::new("code");
        field
            .mutate(|v| match v {
                Value::String(s) => Value::String(format!("{s}!")),
                other => other,
            })
            .mutate(upper);

        let next = field.apply_write(&Value::Null, Value::from("ab")).unwrap();
        assert_eq!(next, Value::from("AB!"));
    }

    #[test]
    fn test_write_step_sees_current_value() {
        let mut field = FieldDescriptor::new("counter");
        field.transform(|current, incoming| {
            let base = current.as_i64().unwrap_or(0);
            Ok(Value::Int(base + incoming.as_i64().unwrap_or(0)))
        });
        assert_eq!(
            field.apply_write(&Value::Int(5), Value::Int(2)).unwrap(),
            Value::Int(7)
        );
    }

    #[test]
    fn test_first_failing_validator_wins() {
        let mut field = FieldDescriptor::new("name");
        field
            .validate(|_| Err("first".to_string()))
            .validate(|_| Err("second".to_string()));

        match field.apply_write(&Value::Null, Value::from("x")) {
            Err(Error::Validation { field, message }) => {
                assert_eq!(field, "name");
                assert_eq!(message, "first");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_read_pipeline() {
        let mut field = FieldDescriptor::new("title");
        field.getter(upper).getter(|v| match v {
            Value::String(s) => Value::String(format!("<{s}>")),
            other => other,
        });
        assert_eq!(field.apply_read(Value::from("hi")), Value::from("<HI>"));
    }

    #[test]
    fn test_storage_name_conflicts() {
        let mut field = FieldDescriptor::new("email");
        assert_eq!(field.storage_name(), "email");
        field.set_storage_name("email_address").unwrap();
        field.set_storage_name("email_address").unwrap();
        assert!(field.set_storage_name("mail").is_err());
        assert_eq!(field.storage_name(), "email_address");
    }

    #[test]
    fn test_lazy_validators_skip_assignment() {
        let mut field = FieldDescriptor::new("bio");
        field.validate_lazy(|v| {
            if v.is_null() {
                Err("required before save".to_string())
            } else {
                Ok(())
            }
        });
        assert!(field.apply_write(&Value::Null, Value::from("x")).is_ok());
        assert!(field.run_lazy_validators(&Value::Null).is_err());
        assert!(field.run_lazy_validators(&Value::from("x")).is_ok());
    }

    #[test]
    fn test_factory_default_invoked_per_realization() {
        use std::sync::atomic::{AtomicI64, Ordering};
        let counter = Arc::new(AtomicI64::new(0));
        let source = counter.clone();
        let mut field = FieldDescriptor::new("seq");
        field.default_with(move || Value::Int(source.fetch_add(1, Ordering::SeqCst)));

        let default = field.default().unwrap();
        assert_eq!(default.realize(), Value::Int(0));
        assert_eq!(default.realize(), Value::Int(1));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
