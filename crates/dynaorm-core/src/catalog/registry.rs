//! Schema registry keyed by record type identity.

use std::any::{type_name, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::descriptor::RecordDescriptor;
use super::field::{FieldDescriptor, Lifecycle};
use super::naming::short_type_name;
use super::relation::RelationDescriptor;
use crate::error::Error;

/// Identity of a record type.
///
/// Keyed by [`TypeId`], so two types sharing a name in different modules
/// stay distinct.
#[derive(Clone, Copy)]
pub struct ModelId {
    type_id: TypeId,
    name: &'static str,
}

impl ModelId {
    /// Identity of `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: short_type_name(type_name::<T>()),
        }
    }

    /// Short type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Underlying type id.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }
}

impl PartialEq for ModelId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ModelId {}

impl std::hash::Hash for ModelId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Registry of record descriptors.
///
/// Cloning is cheap; clones share the same descriptors. Every configuring
/// call works on a copy of the descriptor and only replaces it on success,
/// so a failed declaration leaves the registered schema unchanged.
#[derive(Clone, Default)]
pub struct Registry {
    models: Arc<DashMap<TypeId, Arc<RecordDescriptor>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the descriptor for `T`, creating an empty one if needed.
    pub fn register<T: 'static>(&self) -> Arc<RecordDescriptor> {
        let model = ModelId::of::<T>();
        self.models
            .entry(model.type_id())
            .or_insert_with(|| {
                debug!(model = model.name(), "Registering record type");
                Arc::new(RecordDescriptor::new(model))
            })
            .clone()
    }

    /// Apply a change to the descriptor of `T`.
    pub fn configure<T: 'static>(
        &self,
        configure: impl FnOnce(&mut RecordDescriptor) -> Result<(), Error>,
    ) -> Result<Arc<RecordDescriptor>, Error> {
        self.configure_model(ModelId::of::<T>(), configure)
    }

    fn configure_model(
        &self,
        model: ModelId,
        configure: impl FnOnce(&mut RecordDescriptor) -> Result<(), Error>,
    ) -> Result<Arc<RecordDescriptor>, Error> {
        let mut entry = self
            .models
            .entry(model.type_id())
            .or_insert_with(|| Arc::new(RecordDescriptor::new(model)));
        let mut draft = (**entry).clone();
        configure(&mut draft)?;
        let updated = Arc::new(draft);
        *entry = updated.clone();
        Ok(updated)
    }

    /// Copy of the declared field of `T`.
    ///
    /// The copy is detached: configure fields through
    /// [`Registry::configure_field`] or [`ModelBuilder::field`].
    pub fn field_snapshot<T: 'static>(&self, field: &str) -> Option<FieldDescriptor> {
        self.models
            .get(&TypeId::of::<T>())
            .and_then(|d| d.field(field).cloned())
    }

    /// Configure one field of `T`. Configurations accumulate in call order.
    pub fn configure_field<T: 'static>(
        &self,
        field: &str,
        configure: impl FnOnce(&mut FieldDescriptor) -> Result<(), Error>,
    ) -> Result<(), Error> {
        self.configure::<T>(|d| configure(d.describe_field(field)))
            .map(|_| ())
    }

    /// Start declaring `T`.
    pub fn model<T: 'static>(&self) -> ModelBuilder<'_, T> {
        ModelBuilder::new(self)
    }

    /// Descriptor of a registered record type.
    pub fn descriptor(&self, model: ModelId) -> Result<Arc<RecordDescriptor>, Error> {
        self.models
            .get(&model.type_id())
            .map(|d| d.clone())
            .ok_or_else(|| Error::UnknownModel(model.name().to_string()))
    }

    /// Descriptor of `T`.
    pub fn descriptor_of<T: 'static>(&self) -> Result<Arc<RecordDescriptor>, Error> {
        self.descriptor(ModelId::of::<T>())
    }

    /// Whether `T` is registered.
    pub fn contains<T: 'static>(&self) -> bool {
        self.models.contains_key(&TypeId::of::<T>())
    }

    /// All registered descriptors, ordered by collection name.
    pub fn descriptors(&self) -> Vec<Arc<RecordDescriptor>> {
        let mut all: Vec<_> = self.models.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.collection().cmp(b.collection()));
        all
    }

    /// Number of registered record types.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no record type is registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// One recorded declaration.
type Step<'r> = Box<dyn FnOnce(&mut RecordDescriptor) -> Result<(), Error> + 'r>;

/// Declarative configuration of one record type.
///
/// Steps are recorded in call order and replayed by [`ModelBuilder::build`]
/// against the descriptor registered at that moment, so declarations made
/// through the registry in the meantime are kept. The first failing step is
/// reported and the registered schema is left unchanged.
pub struct ModelBuilder<'r, T> {
    registry: &'r Registry,
    steps: Vec<Step<'r>>,
    _model: PhantomData<fn() -> T>,
}

impl<'r, T: 'static> ModelBuilder<'r, T> {
    fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            steps: Vec::new(),
            _model: PhantomData,
        }
    }

    fn step(mut self, apply: impl FnOnce(&mut RecordDescriptor) -> Result<(), Error> + 'r) -> Self {
        self.steps.push(Box::new(apply));
        self
    }

    /// Override the collection name.
    pub fn collection(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.step(move |d| d.set_collection(name))
    }

    /// Declare the partition key.
    pub fn partition_key(self, field: &str) -> Self {
        let field = field.to_string();
        self.step(move |d| d.set_partition_key(&field))
    }

    /// Declare the sort key.
    pub fn sort_key(self, field: &str) -> Self {
        let field = field.to_string();
        self.step(move |d| d.set_sort_key(&field))
    }

    /// Declare or extend a scalar field.
    pub fn field(self, name: &str, configure: impl FnOnce(&mut FieldDescriptor) + 'r) -> Self {
        let name = name.to_string();
        self.step(move |d| {
            configure(d.describe_field(&name));
            Ok(())
        })
    }

    /// Declare plain scalar fields.
    pub fn fields(self, names: &[&str]) -> Self {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        self.step(move |d| {
            for name in &names {
                d.describe_field(name);
            }
            Ok(())
        })
    }

    /// Declare a custom storage name for a field.
    pub fn storage_name(self, field: &str, storage_name: impl Into<String>) -> Self {
        let field = field.to_string();
        let storage_name = storage_name.into();
        self.step(move |d| d.describe_field(&field).set_storage_name(storage_name).map(|_| ()))
    }

    /// Use `field` as the soft-delete marker.
    pub fn soft_deletes(self, field: &str) -> Self {
        self.lifecycle(field, Lifecycle::SoftDelete)
    }

    /// Use `created` and `updated` as lifecycle timestamps.
    pub fn timestamps(self, created: &str, updated: &str) -> Self {
        self.created_at(created).updated_at(updated)
    }

    /// Use `field` as the created timestamp.
    pub fn created_at(self, field: &str) -> Self {
        self.lifecycle(field, Lifecycle::CreatedAt)
    }

    /// Use `field` as the updated timestamp.
    pub fn updated_at(self, field: &str) -> Self {
        self.lifecycle(field, Lifecycle::UpdatedAt)
    }

    fn lifecycle(self, field: &str, role: Lifecycle) -> Self {
        let field = field.to_string();
        self.step(move |d| d.set_lifecycle(&field, role))
    }

    /// Declare a relation.
    pub fn relation(self, name: &str, relation: RelationDescriptor) -> Self {
        let name = name.to_string();
        self.step(move |d| d.set_relation(&name, relation))
    }

    /// `name` holds every `R` whose `foreign_key` equals this record's key.
    pub fn has_many<R: 'static>(self, name: &str, foreign_key: &str) -> Self {
        self.relation(name, RelationDescriptor::has_many::<R>(foreign_key))
    }

    /// `name` holds the `R` whose `foreign_key` equals this record's key.
    pub fn has_one<R: 'static>(self, name: &str, foreign_key: &str) -> Self {
        self.relation(name, RelationDescriptor::has_one::<R>(foreign_key))
    }

    /// `name` holds the `R` referenced by this record's `foreign_key`.
    pub fn belongs_to<R: 'static>(self, name: &str, foreign_key: &str) -> Self {
        self.relation(name, RelationDescriptor::belongs_to::<R>(foreign_key))
    }

    /// `name` holds every `R` linked through `junction` rows.
    pub fn belongs_to_many<R: 'static>(
        self,
        name: &str,
        junction: &str,
        local_key: &str,
        related_key: &str,
    ) -> Self {
        self.relation(
            name,
            RelationDescriptor::belongs_to_many::<R>(junction, local_key, related_key),
        )
    }

    /// Publish the declaration.
    pub fn build(self) -> Result<Arc<RecordDescriptor>, Error> {
        let steps = self.steps;
        self.registry.configure::<T>(move |d| {
            for step in steps {
                step(d)?;
            }
            Ok(())
        })
    }
}
