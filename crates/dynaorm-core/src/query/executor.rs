//! Query execution.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, instrument};

use dynaorm_proto::{CompiledFilter, Filter, Item, ScanRequest, Value};

use super::compiler::{projection, FilterCompiler};
use super::options::{Include, OrderDirection, QueryOptions, Trashed};
use super::resolver;
use crate::catalog::{RecordDescriptor, Registry};
use crate::config::{OrderFallback, SessionConfig};
use crate::error::Error;
use crate::record::Record;
use crate::store::Store;

/// Executes queries against a store.
///
/// One `find` compiles the filter, follows the scan cursor page by page,
/// sorts the complete match set when an order is requested, applies
/// skip/limit and materializes records. Includes are then resolved with one
/// secondary query per relation and level.
pub struct QueryExecutor<'s> {
    store: Arc<dyn Store>,
    registry: &'s Registry,
    config: &'s SessionConfig,
}

impl<'s> QueryExecutor<'s> {
    /// Create an executor.
    pub fn new(store: Arc<dyn Store>, registry: &'s Registry, config: &'s SessionConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Registry used to resolve relation targets.
    pub fn registry(&self) -> &'s Registry {
        self.registry
    }

    /// Session configuration.
    pub fn config(&self) -> &'s SessionConfig {
        self.config
    }

    /// Find records of a type matching `filter`.
    #[instrument(skip_all, fields(model = descriptor.name()))]
    pub async fn find(
        &self,
        descriptor: &Arc<RecordDescriptor>,
        filter: &Filter,
        options: &QueryOptions,
    ) -> Result<Vec<Record>, Error> {
        self.find_with_keys(descriptor, filter, options, &[]).await
    }

    /// Like [`QueryExecutor::find`], always fetching `join_keys` even under a projection.
    pub(crate) async fn find_with_keys(
        &self,
        descriptor: &Arc<RecordDescriptor>,
        filter: &Filter,
        options: &QueryOptions,
        join_keys: &[String],
    ) -> Result<Vec<Record>, Error> {
        let (skip, limit) = window(options)?;
        self.check_includes(descriptor, &options.include)?;

        if limit == Some(0) {
            debug!(model = descriptor.name(), "Zero limit, skipping scan");
            return Ok(Vec::new());
        }

        let sort_field = match options.order {
            Some(_) => Some(self.sort_field(descriptor, filter, options)?),
            None => None,
        };

        let scoped = scope_trashed(descriptor, filter, options.trashed);
        let compiled = FilterCompiler::new(Some(descriptor)).compile(&scoped)?;

        let mut required = vec![descriptor.primary_key_name()?.to_string()];
        if let Some(sort_key) = descriptor.sort_key() {
            required.push(sort_key.name().to_string());
        }
        for include in &options.include {
            let relation = descriptor.relation(&include.relation)?;
            required.push(relation.owner_key(descriptor)?);
        }
        required.extend(join_keys.iter().cloned());
        required.extend(sort_field.iter().cloned());
        let projection = projection(descriptor, options.attributes.as_deref(), &required);
        let partial = projection.as_ref().is_some_and(|attributes| {
            descriptor
                .scalar_fields()
                .any(|f| !attributes.iter().any(|a| a == f.storage_name()))
        });

        // Without sorting, store order is final and the scan can stop early.
        let wanted = match (&sort_field, limit) {
            (None, Some(limit)) => Some(skip.saturating_add(limit)),
            _ => None,
        };
        let mut items = self
            .scan_collection(descriptor.collection(), compiled, projection, wanted)
            .await?;

        if let (Some(field), Some(direction)) = (&sort_field, options.order) {
            sort_items(&mut items, descriptor.storage_name_of(field), direction);
        }

        let mut records: Vec<Record> = items
            .into_iter()
            .skip(skip)
            .take(limit.unwrap_or(usize::MAX))
            .map(|item| {
                let mut record = Record::from_item(descriptor.clone(), item);
                if partial {
                    record.mark_projected();
                }
                record
            })
            .collect();

        if !options.include.is_empty() && !records.is_empty() {
            resolver::resolve(self, &mut records, descriptor, &options.include).await?;
        }
        Ok(records)
    }

    /// Scan a collection with a structural filter, without a record type.
    pub async fn scan_where(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<Vec<String>>,
    ) -> Result<Vec<Item>, Error> {
        let compiled = FilterCompiler::new(None).compile(filter)?;
        let projection = projection.filter(|p| !p.is_empty());
        self.scan_collection(collection, compiled, projection, None)
            .await
    }

    /// Follow the scan cursor until it is exhausted or `wanted` items are collected.
    pub async fn scan_collection(
        &self,
        collection: &str,
        filter: Option<CompiledFilter>,
        projection: Option<Vec<String>>,
        wanted: Option<usize>,
    ) -> Result<Vec<Item>, Error> {
        let mut items = Vec::new();
        let mut cursor = None;
        let mut page_number = 0usize;

        loop {
            let request = ScanRequest::new()
                .with_filter(filter.clone())
                .with_projection(projection.clone())
                .with_cursor(cursor.take())
                .with_limit(self.config.page_size);
            let page = self.store.scan(collection, request).await?;
            page_number += 1;

            debug!(
                collection,
                page = page_number,
                items = page.items.len(),
                has_more = page.has_more(),
                "Scanned page"
            );

            items.extend(page.items);
            cursor = page.cursor;
            if cursor.is_none() || wanted.is_some_and(|w| items.len() >= w) {
                break;
            }
        }
        Ok(items)
    }

    /// Reject undeclared relations before any store call.
    fn check_includes(&self, descriptor: &RecordDescriptor, includes: &[Include]) -> Result<(), Error> {
        for include in includes {
            let relation = descriptor.relation(&include.relation)?;
            window(&include.options)?;
            if !include.options.include.is_empty() {
                let target = self.registry.descriptor(relation.target())?;
                self.check_includes(&target, &include.options.include)?;
            }
        }
        Ok(())
    }

    /// Explicit order field, else the first filtered field, else the fallback.
    fn sort_field(
        &self,
        descriptor: &RecordDescriptor,
        filter: &Filter,
        options: &QueryOptions,
    ) -> Result<String, Error> {
        if let Some(field) = &options.order_by {
            return Ok(field.clone());
        }
        if let Some(field) = filter.first_field() {
            return Ok(field.to_string());
        }
        if self.config.default_order_fallback == OrderFallback::CreatedTimestamp {
            if let Some(created) = descriptor.created_at_field() {
                return Ok(created.name().to_string());
            }
        }
        Ok(descriptor.primary_key_name()?.to_string())
    }
}

/// Validate skip and limit.
fn window(options: &QueryOptions) -> Result<(usize, Option<usize>), Error> {
    let skip = match options.skip {
        Some(skip) if skip < 0 => {
            return Err(Error::InvalidQuery(format!(
                "skip must be non-negative, got {skip}"
            )))
        }
        Some(skip) => skip as usize,
        None => 0,
    };
    let limit = match options.limit {
        Some(limit) if limit < 0 => {
            return Err(Error::InvalidQuery(format!(
                "limit must be non-negative, got {limit}"
            )))
        }
        Some(limit) => Some(limit as usize),
        None => None,
    };
    Ok((skip, limit))
}

/// Add the implicit soft-delete constraint.
fn scope_trashed(descriptor: &RecordDescriptor, filter: &Filter, trashed: Trashed) -> Filter {
    let Some(marker) = descriptor.soft_delete_field() else {
        return filter.clone();
    };
    match trashed {
        Trashed::Exclude => filter.clone().field(marker.name(), Value::Null),
        Trashed::Include => filter.clone(),
        Trashed::Only => filter.clone().ne(marker.name(), Value::Null),
    }
}

fn sort_items(items: &mut [Item], attribute: &str, direction: OrderDirection) {
    items.sort_by(|a, b| {
        let ordering = compare_values_opt(a.get(attribute), b.get(attribute));
        match direction {
            OrderDirection::Asc => ordering,
            OrderDirection::Desc => ordering.reverse(),
        }
    });
}

/// Compare two optional values for sorting. Absent values sort first.
fn compare_values_opt(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a
            .compare(b)
            .unwrap_or_else(|| a.type_name().cmp(b.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(age: Option<i64>) -> Item {
        let mut item = Item::new();
        if let Some(age) = age {
            item.insert("age".into(), Value::Int(age));
        }
        item
    }

    #[test]
    fn test_window_rejects_negatives() {
        assert!(matches!(
            window(&QueryOptions::new().limit(-1)),
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            window(&QueryOptions::new().skip(-3)),
            Err(Error::InvalidQuery(_))
        ));
        assert_eq!(
            window(&QueryOptions::new().skip(2).limit(5)).unwrap(),
            (2, Some(5))
        );
    }

    #[test]
    fn test_sort_items() {
        let mut items = vec![item(Some(30)), item(None), item(Some(18)), item(Some(25))];
        sort_items(&mut items, "age", OrderDirection::Asc);
        let ages: Vec<_> = items.iter().map(|i| i.get("age").cloned()).collect();
        assert_eq!(
            ages,
            vec![
                None,
                Some(Value::Int(18)),
                Some(Value::Int(25)),
                Some(Value::Int(30))
            ]
        );

        sort_items(&mut items, "age", OrderDirection::Desc);
        assert_eq!(items[0].get("age"), Some(&Value::Int(30)));
        assert!(items[3].get("age").is_none());
    }
}
