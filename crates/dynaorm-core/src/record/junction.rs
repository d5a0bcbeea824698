//! Many-to-many links through junction collections.

use std::collections::BTreeSet;

use tracing::debug;

use dynaorm_proto::{Filter, Item, KeyValue, Value};

use super::Record;
use crate::catalog::{Junction, ModelId, RelationKind};
use crate::error::Error;
use crate::session::Session;

/// Outcome of [`Record::sync`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Ids linked by this call.
    pub attached: Vec<Value>,
    /// Ids unlinked by this call.
    pub detached: Vec<Value>,
}

impl SyncReport {
    /// Whether the call wrote nothing.
    pub fn is_unchanged(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty()
    }
}

impl Record {
    /// Junction of the many-to-many relation towards `R` and this record's key in it.
    fn junction_to<R: 'static>(&self) -> Result<(Junction, Value), Error> {
        let target = ModelId::of::<R>();
        let relation = self
            .descriptor
            .relations()
            .map(|(_, relation)| relation)
            .find(|r| r.kind == RelationKind::ManyToMany && r.target() == target)
            .ok_or_else(|| Error::UnknownRelation {
                model: self.descriptor.name().to_string(),
                relation: format!("many-to-many to '{}'", target.name()),
            })?;
        let junction = relation.junction.clone().ok_or_else(|| {
            Error::Config(format!(
                "many-to-many relation to '{}' has no junction",
                target.name()
            ))
        })?;

        if !self.persisted {
            return Err(Error::NotPersisted(format!(
                "'{}' must be saved before linking '{}'",
                self.descriptor.name(),
                target.name()
            )));
        }
        let owner_key = relation.owner_key(&self.descriptor)?;
        let owner = self
            .values
            .get(&owner_key)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| {
                Error::NotPersisted(format!(
                    "'{}' has no value for '{owner_key}'",
                    self.descriptor.name()
                ))
            })?;
        Ok((junction, owner))
    }

    /// Link the record of type `R` with primary key `id`.
    pub async fn attach<R: 'static>(
        &self,
        session: &Session,
        id: impl Into<Value>,
    ) -> Result<(), Error> {
        self.attach_with::<R>(session, id, Item::new()).await
    }

    /// Link `id`, storing `extra` attributes on the junction row.
    pub async fn attach_with<R: 'static>(
        &self,
        session: &Session,
        id: impl Into<Value>,
        extra: Item,
    ) -> Result<(), Error> {
        let (junction, owner) = self.junction_to::<R>()?;
        let id = link_id(id.into())?;
        let store = session.store()?;

        let mut row = extra;
        row.insert(junction.local_key.clone(), owner);
        row.insert(junction.related_key.clone(), id);
        store.put_item(&junction.collection, row).await?;
        Ok(())
    }

    /// Unlink `id`. Unlinking an id that is not linked is not an error.
    pub async fn detach<R: 'static>(
        &self,
        session: &Session,
        id: impl Into<Value>,
    ) -> Result<(), Error> {
        let (junction, owner) = self.junction_to::<R>()?;
        let id = link_id(id.into())?;
        let store = session.store()?;

        let key = Item::from([
            (junction.local_key.clone(), owner),
            (junction.related_key.clone(), id),
        ]);
        store.delete_item(&junction.collection, key).await?;
        Ok(())
    }

    /// Ids of the `R` records currently linked, in junction key order.
    pub async fn linked_ids<R: 'static>(&self, session: &Session) -> Result<Vec<Value>, Error> {
        let (junction, owner) = self.junction_to::<R>()?;
        let rows = session
            .executor()?
            .scan_where(
                &junction.collection,
                &Filter::new().eq(junction.local_key.clone(), owner),
                Some(vec![junction.related_key.clone()]),
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| row.remove(&junction.related_key))
            .collect())
    }

    /// Make the linked set of `R` exactly `ids`.
    ///
    /// Only the difference is written: ids no longer wanted are detached,
    /// new ones attached, and ids already linked are left alone.
    pub async fn sync<R: 'static>(
        &self,
        session: &Session,
        ids: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Result<SyncReport, Error> {
        let mut wanted: Vec<(KeyValue, Value)> = Vec::new();
        let mut seen = BTreeSet::new();
        for id in ids {
            let id = link_id(id.into())?;
            let key = id.to_key().ok_or_else(|| invalid_id(&id))?;
            if seen.insert(key.clone()) {
                wanted.push((key, id));
            }
        }

        let current = self.linked_ids::<R>(session).await?;
        let current_keys: BTreeSet<KeyValue> = current.iter().filter_map(Value::to_key).collect();

        let mut report = SyncReport::default();
        for id in current {
            if id.to_key().is_some_and(|key| !seen.contains(&key)) {
                self.detach::<R>(session, id.clone()).await?;
                report.detached.push(id);
            }
        }
        for (key, id) in wanted {
            if !current_keys.contains(&key) {
                self.attach::<R>(session, id.clone()).await?;
                report.attached.push(id);
            }
        }

        debug!(
            model = self.descriptor.name(),
            attached = report.attached.len(),
            detached = report.detached.len(),
            "Synced links"
        );
        Ok(report)
    }
}

fn link_id(id: Value) -> Result<Value, Error> {
    match id.to_key() {
        Some(_) => Ok(id),
        None => Err(invalid_id(&id)),
    }
}

fn invalid_id(id: &Value) -> Error {
    Error::InvalidQuery(format!("{} value cannot identify a record", id.type_name()))
}
