//! Eager loading of declared relations.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use tracing::debug;

use dynaorm_proto::{Filter, KeyValue, Value};

use super::executor::QueryExecutor;
use super::options::Include;
use crate::catalog::{RecordDescriptor, RelationKind};
use crate::error::Error;
use crate::record::{Record, Related};

/// Related records of one include, grouped by join value.
struct Loaded {
    relation: String,
    kind: RelationKind,
    owner_key: String,
    groups: HashMap<KeyValue, Vec<Record>>,
}

/// Resolve `includes` for `parents`, attaching the results in place.
///
/// Every relation costs one secondary query per level (two for a junction),
/// regardless of the number of parents. Nested includes recurse through the
/// executor on the freshly loaded records.
pub(crate) fn resolve<'a, 's: 'a>(
    executor: &'a QueryExecutor<'s>,
    parents: &'a mut [Record],
    descriptor: &'a Arc<RecordDescriptor>,
    includes: &'a [Include],
) -> BoxFuture<'a, Result<(), Error>> {
    async move {
        let shared: &[Record] = &*parents;
        let loaded = if executor.config().concurrent_includes {
            try_join_all(
                includes
                    .iter()
                    .map(|include| load(executor, shared, descriptor, include)),
            )
            .await?
        } else {
            let mut loaded = Vec::with_capacity(includes.len());
            for include in includes {
                loaded.push(load(executor, shared, descriptor, include).await?);
            }
            loaded
        };

        for loaded in loaded {
            for parent in parents.iter_mut() {
                let group = parent
                    .key_value(&loaded.owner_key)
                    .and_then(|key| loaded.groups.get(&key));
                let related = if loaded.kind.is_many() {
                    Related::Many(group.cloned().unwrap_or_default())
                } else {
                    Related::One(group.and_then(|g| g.first().cloned()).map(Box::new))
                };
                parent.set_related(&loaded.relation, related);
            }
        }
        Ok(())
    }
    .boxed()
}

async fn load(
    executor: &QueryExecutor<'_>,
    parents: &[Record],
    descriptor: &RecordDescriptor,
    include: &Include,
) -> Result<Loaded, Error> {
    let relation = descriptor.relation(&include.relation)?;
    let target = executor.registry().descriptor(relation.target())?;
    let owner_key = relation.owner_key(descriptor)?;
    let mut loaded = Loaded {
        relation: include.relation.clone(),
        kind: relation.kind,
        owner_key,
        groups: HashMap::new(),
    };

    let keys = distinct_keys(parents, &loaded.owner_key);
    if keys.is_empty() {
        return Ok(loaded);
    }
    debug!(relation = %include.relation, keys = keys.len(), "Resolving include");

    let target_key = relation.target_key(&target)?;
    match relation.kind {
        RelationKind::ManyToMany => {
            let junction = relation.junction.as_ref().ok_or_else(|| {
                Error::Config(format!(
                    "many-to-many relation '{}' has no junction",
                    include.relation
                ))
            })?;
            let rows = executor
                .scan_where(
                    &junction.collection,
                    &Filter::new().is_in(junction.local_key.clone(), keys),
                    Some(vec![junction.local_key.clone(), junction.related_key.clone()]),
                )
                .await?;

            let related_ids: BTreeSet<KeyValue> = rows
                .iter()
                .filter_map(|row| row.get(&junction.related_key).and_then(Value::to_key))
                .collect();
            if related_ids.is_empty() {
                return Ok(loaded);
            }

            let filter = Filter::new()
                .is_in(target_key.clone(), related_ids.into_iter().map(Value::from))
                .and(include.filter.clone());
            let related = executor
                .find_with_keys(&target, &filter, &include.options, &[target_key.clone()])
                .await?;
            let by_id: HashMap<KeyValue, Record> = related
                .into_iter()
                .filter_map(|record| record.key_value(&target_key).map(|key| (key, record)))
                .collect();

            for row in &rows {
                let owner = row.get(&junction.local_key).and_then(Value::to_key);
                let id = row.get(&junction.related_key).and_then(Value::to_key);
                if let (Some(owner), Some(id)) = (owner, id) {
                    if let Some(record) = by_id.get(&id) {
                        loaded.groups.entry(owner).or_default().push(record.clone());
                    }
                }
            }
        }
        _ => {
            let filter = Filter::new()
                .is_in(target_key.clone(), keys)
                .and(include.filter.clone());
            let related = executor
                .find_with_keys(&target, &filter, &include.options, &[target_key.clone()])
                .await?;
            for record in related {
                if let Some(key) = record.key_value(&target_key) {
                    loaded.groups.entry(key).or_default().push(record);
                }
            }
        }
    }
    Ok(loaded)
}

fn distinct_keys(parents: &[Record], field: &str) -> Vec<Value> {
    parents
        .iter()
        .filter_map(|parent| parent.key_value(field))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(Value::from)
        .collect()
}
