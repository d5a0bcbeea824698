//! Persisting record instances.

use tracing::{debug, instrument};

use dynaorm_proto::{Value, WriteOp};

use super::{item_of, Record, Values};
use crate::error::Error;
use crate::pipeline::defaults::now_value;
use crate::session::Session;
use crate::store::Store;

impl Record {
    /// Stage the current values for a write.
    ///
    /// Runs lazy validators, stamps lifecycle timestamps and checks required
    /// fields on a copy, returning the item to write and the values to keep
    /// once the write succeeds.
    pub(crate) fn stage_save(&self) -> Result<(WriteOp, Values), Error> {
        self.stage(self.values.clone())
    }

    fn stage(&self, mut draft: Values) -> Result<(WriteOp, Values), Error> {
        let descriptor = &self.descriptor;
        if self.projected {
            return Err(Error::PartialRecord(descriptor.name().to_string()));
        }
        descriptor.key_schema()?;

        for field in descriptor.scalar_fields() {
            if let Some(value) = draft.get(field.name()).filter(|v| !v.is_null()) {
                field.run_lazy_validators(value)?;
            }
        }

        let now = now_value();
        let inserting = !self.persisted || self.id().is_none();
        if inserting {
            if let Some(created) = descriptor.created_at_field() {
                draft
                    .entry(created.name().to_string())
                    .or_insert_with(|| now.clone());
            }
        }
        if let Some(updated) = descriptor.updated_at_field() {
            draft.insert(updated.name().to_string(), now);
        }

        for field in descriptor.scalar_fields() {
            let present = draft.get(field.name()).is_some_and(|v| !v.is_null());
            if !field.is_nullable() && !present {
                return Err(Error::validation(field.name(), "is required"));
            }
        }

        let item = item_of(descriptor, &draft);
        Ok((WriteOp::put(descriptor.collection(), item), draft))
    }

    /// Stage a destroy: a marker write for soft-deleting types, a delete otherwise.
    pub(crate) fn stage_destroy(&self) -> Result<(WriteOp, Option<Values>), Error> {
        let key = self.key()?;
        match self.descriptor.soft_delete_field() {
            Some(marker) => {
                let mut draft = self.values.clone();
                draft.insert(marker.name().to_string(), now_value());
                let (op, values) = self.stage(draft)?;
                Ok((op, Some(values)))
            }
            None => Ok((WriteOp::delete(self.descriptor.collection(), key), None)),
        }
    }

    /// Stage a physical delete.
    pub(crate) fn stage_force_destroy(&self) -> Result<WriteOp, Error> {
        Ok(WriteOp::delete(self.descriptor.collection(), self.key()?))
    }

    /// Apply staged values after the write went through.
    pub(crate) fn commit_staged(&mut self, staged: Option<Values>) {
        match staged {
            Some(values) => {
                self.values = values;
                self.persisted = true;
            }
            None => self.persisted = false,
        }
    }

    /// Insert or upsert this record by key.
    #[instrument(skip_all, fields(model = self.descriptor.name()))]
    pub async fn save(&mut self, session: &Session) -> Result<(), Error> {
        let store = session.store()?;
        let (op, values) = self.stage_save()?;
        execute(store.as_ref(), op).await?;
        self.commit_staged(Some(values));
        debug!(model = self.descriptor.name(), "Saved record");
        Ok(())
    }

    /// Assign `changes` through the write pipelines, then save.
    ///
    /// On failure the record keeps its previous values.
    pub async fn update<K, V>(
        &mut self,
        session: &Session,
        changes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<(), Error>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let snapshot = self.values.clone();
        self.assign(changes)?;
        if let Err(e) = self.save(session).await {
            self.values = snapshot;
            return Err(e);
        }
        Ok(())
    }

    /// Soft-delete when the type has a marker field, otherwise remove the row.
    pub async fn destroy(&mut self, session: &Session) -> Result<(), Error> {
        let store = session.store()?;
        let (op, staged) = self.stage_destroy()?;
        execute(store.as_ref(), op).await?;
        self.commit_staged(staged);
        Ok(())
    }

    /// Remove the row regardless of soft-delete configuration.
    pub async fn force_destroy(&mut self, session: &Session) -> Result<(), Error> {
        let store = session.store()?;
        let op = self.stage_force_destroy()?;
        execute(store.as_ref(), op).await?;
        self.commit_staged(None);
        Ok(())
    }

    /// Clear the soft-delete marker and save.
    pub async fn restore(&mut self, session: &Session) -> Result<(), Error> {
        let marker = self
            .descriptor
            .soft_delete_field()
            .ok_or_else(|| {
                Error::Config(format!(
                    "record type '{}' does not soft-delete",
                    self.descriptor.name()
                ))
            })?
            .name()
            .to_string();

        let store = session.store()?;
        let mut draft = self.values.clone();
        draft.remove(&marker);
        let (op, values) = self.stage(draft)?;
        execute(store.as_ref(), op).await?;
        self.commit_staged(Some(values));
        Ok(())
    }
}

pub(crate) async fn execute(store: &dyn Store, op: WriteOp) -> Result<(), Error> {
    match op {
        WriteOp::Put { collection, item } => store.put_item(&collection, item).await?,
        WriteOp::Delete { collection, key } => store.delete_item(&collection, key).await?,
    }
    Ok(())
}
