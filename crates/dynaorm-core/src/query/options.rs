//! Query options and include requests.

use dynaorm_proto::Filter;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

/// Treatment of soft-deleted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trashed {
    /// Hide soft-deleted records.
    #[default]
    Exclude,
    /// Return live and soft-deleted records.
    Include,
    /// Return soft-deleted records only.
    Only,
}

/// Options of one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Sort direction; `None` keeps store order.
    pub order: Option<OrderDirection>,
    /// Explicit sort field; overrides the implicit one.
    pub order_by: Option<String>,
    /// Maximum number of records. Negative values are rejected.
    pub limit: Option<i64>,
    /// Number of records to skip. Negative values are rejected.
    pub skip: Option<i64>,
    /// Field projection; an empty list means no projection.
    pub attributes: Option<Vec<String>>,
    /// Relations to eager-load.
    pub include: Vec<Include>,
    /// Soft-delete treatment.
    pub trashed: Trashed,
}

impl QueryOptions {
    /// Default options: no order, no limit, no projection, no includes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sort direction.
    pub fn order(mut self, direction: OrderDirection) -> Self {
        self.order = Some(direction);
        self
    }

    /// Sort ascending.
    pub fn asc(self) -> Self {
        self.order(OrderDirection::Asc)
    }

    /// Sort descending.
    pub fn desc(self) -> Self {
        self.order(OrderDirection::Desc)
    }

    /// Sort by an explicit field.
    pub fn order_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by = Some(field.into());
        self.order = Some(direction);
        self
    }

    /// Limit the number of records.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip leading records.
    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Alias of [`QueryOptions::skip`].
    pub fn offset(self, offset: i64) -> Self {
        self.skip(offset)
    }

    /// Project onto the given fields.
    pub fn attributes<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.attributes = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Eager-load a relation with its own filter and options.
    pub fn include(mut self, include: Include) -> Self {
        self.include.push(include);
        self
    }

    /// Eager-load a relation without constraints.
    pub fn with(self, relation: impl Into<String>) -> Self {
        self.include(Include::new(relation))
    }

    /// Set the soft-delete treatment.
    pub fn trashed(mut self, trashed: Trashed) -> Self {
        self.trashed = trashed;
        self
    }

    /// Include soft-deleted records.
    pub fn with_trashed(self) -> Self {
        self.trashed(Trashed::Include)
    }

    /// Return only soft-deleted records.
    pub fn only_trashed(self) -> Self {
        self.trashed(Trashed::Only)
    }

    /// Whether the result must be sorted in memory.
    pub fn is_sorted(&self) -> bool {
        self.order.is_some()
    }
}

/// One relation to eager-load.
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    /// Relation name on the parent record type.
    pub relation: String,
    /// Extra constraint on related records.
    pub filter: Filter,
    /// Order, limit, projection and nested includes for related records.
    ///
    /// Limit and skip apply to the one batched query of this level, not per parent.
    pub options: QueryOptions,
}

impl Include {
    /// Load `relation` without constraints.
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            filter: Filter::new(),
            options: QueryOptions::new(),
        }
    }

    /// Constrain related records.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Replace the options for related records, keeping nested includes.
    pub fn options(mut self, options: QueryOptions) -> Self {
        let nested = std::mem::take(&mut self.options.include);
        self.options = options;
        self.options.include.extend(nested);
        self
    }

    /// Eager-load a nested relation of the related records.
    pub fn include(mut self, nested: Include) -> Self {
        self.options.include.push(nested);
        self
    }

    /// Eager-load a nested relation without constraints.
    pub fn with(self, relation: impl Into<String>) -> Self {
        self.include(Include::new(relation))
    }
}
