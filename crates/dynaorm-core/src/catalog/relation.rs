//! Relationship descriptors.

use std::fmt;
use std::sync::Arc;

use super::descriptor::RecordDescriptor;
use super::registry::ModelId;
use crate::error::Error;

/// Kind of association between two record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Parent has many children carrying the parent's key.
    ToMany,
    /// Parent has at most one child carrying the parent's key.
    ToOne,
    /// Child references at most one parent through its own field.
    BelongsToOne,
    /// Linked through rows of a junction collection.
    ManyToMany,
}

impl RelationKind {
    /// Whether a resolved relation holds a list.
    pub fn is_many(&self) -> bool {
        matches!(self, RelationKind::ToMany | RelationKind::ManyToMany)
    }
}

/// Junction collection of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Junction {
    /// Junction collection name.
    pub collection: String,
    /// Junction attribute holding the owning record's key.
    pub local_key: String,
    /// Junction attribute holding the related record's key.
    pub related_key: String,
}

/// Deferred reference to the related record type.
pub type TargetRef = Arc<dyn Fn() -> ModelId + Send + Sync>;

/// Declared association from one record type to another.
///
/// The target is stored as a thunk and only invoked when the relation is
/// resolved, so two record types may reference each other regardless of
/// registration order.
#[derive(Clone)]
pub struct RelationDescriptor {
    /// Association kind.
    pub kind: RelationKind,
    target: TargetRef,
    /// Field carrying the join value on the referencing side.
    ///
    /// For `ToMany`/`ToOne` this lives on the target, for `BelongsToOne` on
    /// the owner. Unused by `ManyToMany`.
    pub foreign_key: String,
    /// Field matched against the foreign key; the primary key of the
    /// referenced side when `None`.
    pub local_key: Option<String>,
    /// Junction for `ManyToMany`.
    pub junction: Option<Junction>,
}

impl RelationDescriptor {
    fn new(kind: RelationKind, target: TargetRef, foreign_key: impl Into<String>) -> Self {
        Self {
            kind,
            target,
            foreign_key: foreign_key.into(),
            local_key: None,
            junction: None,
        }
    }

    /// Parent has many `T` whose `foreign_key` holds the parent's key.
    pub fn has_many<T: 'static>(foreign_key: impl Into<String>) -> Self {
        Self::new(RelationKind::ToMany, Arc::new(ModelId::of::<T>), foreign_key)
    }

    /// Parent has at most one `T` whose `foreign_key` holds the parent's key.
    pub fn has_one<T: 'static>(foreign_key: impl Into<String>) -> Self {
        Self::new(RelationKind::ToOne, Arc::new(ModelId::of::<T>), foreign_key)
    }

    /// This record's `foreign_key` holds the key of one `T`.
    pub fn belongs_to<T: 'static>(foreign_key: impl Into<String>) -> Self {
        Self::new(RelationKind::BelongsToOne, Arc::new(ModelId::of::<T>), foreign_key)
    }

    /// Many-to-many with `T` through a junction collection.
    pub fn belongs_to_many<T: 'static>(
        collection: impl Into<String>,
        local_key: impl Into<String>,
        related_key: impl Into<String>,
    ) -> Self {
        let mut relation = Self::new(RelationKind::ManyToMany, Arc::new(ModelId::of::<T>), "");
        relation.junction = Some(Junction {
            collection: collection.into(),
            local_key: local_key.into(),
            related_key: related_key.into(),
        });
        relation
    }

    /// Relation whose target is resolved by an arbitrary thunk.
    pub fn lazy(
        kind: RelationKind,
        target: impl Fn() -> ModelId + Send + Sync + 'static,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(kind, Arc::new(target), foreign_key)
    }

    /// Match against a field other than the primary key.
    pub fn with_local_key(mut self, local_key: impl Into<String>) -> Self {
        self.local_key = Some(local_key.into());
        self
    }

    /// Resolve the related record type.
    pub fn target(&self) -> ModelId {
        (self.target)()
    }

    /// Field on the owning record whose values drive the secondary query.
    pub fn owner_key(&self, owner: &RecordDescriptor) -> Result<String, Error> {
        match self.kind {
            RelationKind::BelongsToOne => Ok(self.foreign_key.clone()),
            _ => match &self.local_key {
                Some(key) => Ok(key.clone()),
                None => Ok(owner.primary_key_name()?.to_string()),
            },
        }
    }

    /// Field on the related record matched against the owner key.
    pub fn target_key(&self, target: &RecordDescriptor) -> Result<String, Error> {
        match self.kind {
            RelationKind::ToMany | RelationKind::ToOne => Ok(self.foreign_key.clone()),
            RelationKind::BelongsToOne => match &self.local_key {
                Some(key) => Ok(key.clone()),
                None => Ok(target.primary_key_name()?.to_string()),
            },
            RelationKind::ManyToMany => Ok(target.primary_key_name()?.to_string()),
        }
    }
}

impl fmt::Debug for RelationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationDescriptor")
            .field("kind", &self.kind)
            .field("target", &self.target().name())
            .field("foreign_key", &self.foreign_key)
            .field("local_key", &self.local_key)
            .field("junction", &self.junction)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Order;

    #[test]
    fn test_relation_constructors() {
        let orders = RelationDescriptor::has_many::<Order>("user_id");
        assert_eq!(orders.kind, RelationKind::ToMany);
        assert!(orders.kind.is_many());
        assert_eq!(orders.target(), ModelId::of::<Order>());
        assert!(orders.junction.is_none());

        let roles = RelationDescriptor::belongs_to_many::<Order>("user_roles", "user_id", "role_id");
        let junction = roles.junction.unwrap();
        assert_eq!(junction.collection, "user_roles");
        assert_eq!(junction.local_key, "user_id");
        assert_eq!(junction.related_key, "role_id");
    }

    #[test]
    fn test_lazy_target_is_deferred() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let relation = RelationDescriptor::lazy(
            RelationKind::ToOne,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                ModelId::of::<Order>()
            },
            "owner_id",
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(relation.target().name(), "Order");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
