//! Record descriptors.

use dynaorm_proto::KeySchema;

use super::field::{FieldDescriptor, Lifecycle};
use super::naming::collection_name;
use super::registry::ModelId;
use super::relation::RelationDescriptor;
use crate::error::Error;

/// Schema of one record type: its collection and ordered fields.
#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    model: ModelId,
    collection: String,
    custom_collection: bool,
    fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    /// Empty descriptor with the default collection name.
    pub fn new(model: ModelId) -> Self {
        Self {
            model,
            collection: collection_name(model.name()),
            custom_collection: false,
            fields: Vec::new(),
        }
    }

    /// Record type identity.
    pub fn model(&self) -> ModelId {
        self.model
    }

    /// Record type name.
    pub fn name(&self) -> &'static str {
        self.model.name()
    }

    /// Storage collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Scalar (non-relation) fields in declaration order.
    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.is_relation())
    }

    /// Relation fields in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = (&str, &RelationDescriptor)> {
        self.fields
            .iter()
            .filter_map(|f| f.relation().map(|r| (f.name(), r)))
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Look up a scalar field, failing on unknown names and relations.
    pub fn scalar_field(&self, name: &str) -> Result<&FieldDescriptor, Error> {
        self.field(name)
            .filter(|f| !f.is_relation())
            .ok_or_else(|| Error::UnknownField {
                model: self.name().to_string(),
                field: name.to_string(),
            })
    }

    /// Look up a field by its storage name.
    pub fn field_by_storage_name(&self, storage_name: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| !f.is_relation() && f.storage_name() == storage_name)
    }

    /// Storage name for a field; unknown names map to themselves.
    pub fn storage_name_of<'a>(&'a self, field: &'a str) -> &'a str {
        self.field(field).map_or(field, |f| f.storage_name())
    }

    /// Look up a declared relation.
    pub fn relation(&self, name: &str) -> Result<&RelationDescriptor, Error> {
        self.field(name)
            .and_then(|f| f.relation())
            .ok_or_else(|| Error::UnknownRelation {
                model: self.name().to_string(),
                relation: name.to_string(),
            })
    }

    /// The identity field.
    pub fn primary_key(&self) -> Result<&FieldDescriptor, Error> {
        self.fields
            .iter()
            .find(|f| f.is_primary_key())
            .ok_or_else(|| Error::Config(format!("record type '{}' has no partition key", self.name())))
    }

    /// Name of the identity field.
    pub fn primary_key_name(&self) -> Result<&str, Error> {
        self.primary_key().map(|f| f.name())
    }

    /// Sort key field, if declared.
    pub fn sort_key(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.is_sort_key())
    }

    /// Key schema of the collection, in storage names.
    pub fn key_schema(&self) -> Result<KeySchema, Error> {
        let schema = KeySchema::new(self.primary_key()?.storage_name());
        Ok(match self.sort_key() {
            Some(sort) => schema.with_sort_key(sort.storage_name()),
            None => schema,
        })
    }

    /// Field carrying a lifecycle role.
    pub fn lifecycle_field(&self, role: Lifecycle) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.lifecycle() == Some(role))
    }

    /// Soft-delete marker field.
    pub fn soft_delete_field(&self) -> Option<&FieldDescriptor> {
        self.lifecycle_field(Lifecycle::SoftDelete)
    }

    /// Created-timestamp field.
    pub fn created_at_field(&self) -> Option<&FieldDescriptor> {
        self.lifecycle_field(Lifecycle::CreatedAt)
    }

    /// Updated-timestamp field.
    pub fn updated_at_field(&self) -> Option<&FieldDescriptor> {
        self.lifecycle_field(Lifecycle::UpdatedAt)
    }

    /// Fetch or create a field descriptor.
    pub fn describe_field(&mut self, name: &str) -> &mut FieldDescriptor {
        let index = match self.fields.iter().position(|f| f.name() == name) {
            Some(index) => index,
            None => {
                self.fields.push(FieldDescriptor::new(name));
                self.fields.len() - 1
            }
        };
        &mut self.fields[index]
    }

    /// Override the collection name.
    ///
    /// Repeating the same custom name is a no-op; a different one is an error.
    pub fn set_collection(&mut self, collection: impl Into<String>) -> Result<(), Error> {
        let collection = collection.into();
        if self.custom_collection && self.collection != collection {
            return Err(Error::Config(format!(
                "record type '{}' already uses collection '{}', cannot rename to '{}'",
                self.name(),
                self.collection,
                collection
            )));
        }
        self.collection = collection;
        self.custom_collection = true;
        Ok(())
    }

    /// Mark a field as the partition (and primary) key.
    pub fn set_partition_key(&mut self, field: &str) -> Result<(), Error> {
        if let Some(existing) = self.fields.iter().find(|f| f.is_partition_key()) {
            if existing.name() == field {
                return Ok(());
            }
            return Err(Error::Config(format!(
                "record type '{}' already has partition key '{}'",
                self.name(),
                existing.name()
            )));
        }
        let descriptor = self.describe_field(field);
        descriptor.partition_key = true;
        descriptor.primary_key = true;
        Ok(())
    }

    /// Mark a field as the sort key. Requires a partition key.
    pub fn set_sort_key(&mut self, field: &str) -> Result<(), Error> {
        let partition = self.fields.iter().find(|f| f.is_partition_key());
        match partition {
            None => {
                return Err(Error::Config(format!(
                    "record type '{}' declares sort key '{}' before a partition key",
                    self.name(),
                    field
                )))
            }
            Some(p) if p.name() == field => {
                return Err(Error::Config(format!(
                    "field '{}' cannot be both partition and sort key",
                    field
                )))
            }
            Some(_) => {}
        }
        if let Some(existing) = self.sort_key() {
            if existing.name() == field {
                return Ok(());
            }
            return Err(Error::Config(format!(
                "record type '{}' already has sort key '{}'",
                self.name(),
                existing.name()
            )));
        }
        self.describe_field(field).sort_key = true;
        Ok(())
    }

    /// Assign a lifecycle role. Each role may be held by one field.
    pub fn set_lifecycle(&mut self, field: &str, role: Lifecycle) -> Result<(), Error> {
        if let Some(existing) = self.lifecycle_field(role) {
            if existing.name() != field {
                return Err(Error::Config(format!(
                    "record type '{}' already uses '{}' as {:?} field",
                    self.name(),
                    existing.name(),
                    role
                )));
            }
        }
        self.describe_field(field).lifecycle = Some(role);
        Ok(())
    }

    /// Declare a relation on a field.
    pub fn set_relation(&mut self, field: &str, relation: RelationDescriptor) -> Result<(), Error> {
        let descriptor = self.describe_field(field);
        if descriptor.is_partition_key() || descriptor.is_sort_key() {
            return Err(Error::Config(format!(
                "key field '{}' cannot be a relation",
                field
            )));
        }
        descriptor.relation = Some(relation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OrderItem;

    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new(ModelId::of::<OrderItem>())
    }

    #[test]
    fn test_default_collection_name() {
        let d = descriptor();
        assert_eq!(d.name(), "OrderItem");
        assert_eq!(d.collection(), "order_items");
    }

    #[test]
    fn test_collection_override() {
        let mut d = descriptor();
        d.set_collection("items").unwrap();
        d.set_collection("items").unwrap();
        assert!(d.set_collection("lines").is_err());
        assert_eq!(d.collection(), "items");
    }

    #[test]
    fn test_partition_key_rules() {
        let mut d = descriptor();
        assert!(d.primary_key().is_err());
        d.set_partition_key("id").unwrap();
        d.set_partition_key("id").unwrap();

        let err = d.set_partition_key("other").unwrap_err();
        assert!(err.to_string().contains("'id'"));
        assert_eq!(d.primary_key_name().unwrap(), "id");
    }

    #[test]
    fn test_sort_key_rules() {
        let mut d = descriptor();
        assert!(d.set_sort_key("created").is_err());

        d.set_partition_key("order_id").unwrap();
        d.set_sort_key("line").unwrap();
        assert!(d.set_sort_key("other").is_err());
        assert!(d.set_sort_key("order_id").is_err());

        let schema = d.key_schema().unwrap();
        assert_eq!(schema.partition_key, "order_id");
        assert_eq!(schema.sort_key.as_deref(), Some("line"));
    }

    #[test]
    fn test_describe_field_accumulates() {
        let mut d = descriptor();
        d.describe_field("sku").not_null();
        d.describe_field("sku").validate(|_| Ok(()));
        d.describe_field("qty");

        assert_eq!(d.fields().len(), 2);
        let sku = d.field("sku").unwrap();
        assert!(!sku.is_nullable());
        assert_eq!(d.fields()[1].name(), "qty");
    }

    #[test]
    fn test_lifecycle_roles() {
        let mut d = descriptor();
        d.set_lifecycle("deleted_at", Lifecycle::SoftDelete).unwrap();
        d.set_lifecycle("deleted_at", Lifecycle::SoftDelete).unwrap();
        assert!(d.set_lifecycle("removed_at", Lifecycle::SoftDelete).is_err());
        assert_eq!(d.soft_delete_field().unwrap().name(), "deleted_at");
        assert!(d.created_at_field().is_none());
    }

    #[test]
    fn test_storage_names() {
        let mut d = descriptor();
        d.describe_field("sku").set_storage_name("product_sku").unwrap();
        assert_eq!(d.storage_name_of("sku"), "product_sku");
        assert_eq!(d.storage_name_of("unknown"), "unknown");
        assert_eq!(d.field_by_storage_name("product_sku").unwrap().name(), "sku");
    }

    #[test]
    fn test_unknown_relation() {
        let d = descriptor();
        assert!(matches!(
            d.relation("orders"),
            Err(Error::UnknownRelation { relation, .. }) if relation == "orders"
        ));
    }
}
