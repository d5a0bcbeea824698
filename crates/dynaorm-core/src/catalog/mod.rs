//! Record type catalog.
//!
//! Record types are declared once through the [`Registry`]: fields with their
//! read/write pipelines, key roles, lifecycle roles and relations. Everything
//! else (records, queries, includes) reads the resulting descriptors.

mod descriptor;
mod field;
mod naming;
mod registry;
mod relation;

pub use descriptor::RecordDescriptor;
pub use field::{DefaultValue, FieldDescriptor, Lifecycle, ReadFn, ValidateFn, WriteFn};
pub use naming::{collection_name, short_type_name};
pub use registry::{ModelBuilder, ModelId, Registry};
pub use relation::{Junction, RelationDescriptor, RelationKind, TargetRef};
