//! Structural filters.
//!
//! A [`Filter`] maps field names to either a literal value (implicit
//! equality) or a set of operator/operand pairs. All entries are combined
//! with AND. Field names are the application-facing names; the compiler in
//! `dynaorm-core` translates them to storage attribute names.

use std::fmt;

use crate::value::Value;

/// Comparison operators accepted in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Field equals value.
    Eq,
    /// Field not equals value.
    Ne,
    /// Field less than value.
    Lt,
    /// Field less than or equal to value.
    Le,
    /// Field greater than value.
    Gt,
    /// Field greater than or equal to value.
    Ge,
    /// Field is one of a set of values.
    In,
    /// Field is none of a set of values.
    NotIn,
    /// Substring (strings) or element (arrays) containment.
    Contains,
    /// Prefix match.
    BeginsWith,
}

impl Operator {
    /// Every operator, in canonical order.
    pub const ALL: [Operator; 10] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Le,
        Operator::Gt,
        Operator::Ge,
        Operator::In,
        Operator::NotIn,
        Operator::Contains,
        Operator::BeginsWith,
    ];

    /// Canonical spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Le => "lte",
            Operator::Gt => "gt",
            Operator::Ge => "gte",
            Operator::In => "in",
            Operator::NotIn => "not-in",
            Operator::Contains => "contains",
            Operator::BeginsWith => "begins-with",
        }
    }

    /// Parse a canonical name or one of its aliases.
    pub fn parse(name: &str) -> Option<Self> {
        let op = match name.trim().to_ascii_lowercase().as_str() {
            "=" | "==" | "eq" => Operator::Eq,
            "!=" | "<>" | "ne" => Operator::Ne,
            "<" | "lt" => Operator::Lt,
            "<=" | "le" | "lte" => Operator::Le,
            ">" | "gt" => Operator::Gt,
            ">=" | "ge" | "gte" => Operator::Ge,
            "in" => Operator::In,
            "not-in" | "not_in" | "notin" | "nin" => Operator::NotIn,
            "contains" | "like" => Operator::Contains,
            "begins-with" | "begins_with" | "beginswith" | "starts_with" | "startswith"
            | "prefix" => Operator::BeginsWith,
            _ => return None,
        };
        Some(op)
    }

    /// Comma-separated list of canonical names, for error messages.
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(Operator::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Whether the operand is a candidate list rather than a single value.
    pub fn takes_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of an operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No value supplied; the constraint is dropped.
    Undefined,
    /// A single comparison value.
    Value(Value),
    /// Candidate values for `in` / `not-in`.
    List(Vec<Value>),
}

impl Operand {
    /// Single value operand.
    pub fn value(value: impl Into<Value>) -> Self {
        Operand::Value(value.into())
    }

    /// Candidate list operand.
    pub fn list<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Operand::List(values.into_iter().map(Into::into).collect())
    }

    /// Operand from an optional value; `None` is undefined, not null.
    pub fn maybe(value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => Operand::Value(v.into()),
            None => Operand::Undefined,
        }
    }
}

/// Constraint attached to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// No constraint (dropped during compilation).
    Undefined,
    /// Literal value compared with the compiler's default operator.
    Literal(Value),
    /// Explicit operators, all of which must hold.
    Operators(Vec<(Operator, Operand)>),
}

impl Criterion {
    /// Whether this criterion contributes nothing.
    pub fn is_undefined(&self) -> bool {
        match self {
            Criterion::Undefined => true,
            Criterion::Literal(_) => false,
            Criterion::Operators(ops) => ops
                .iter()
                .all(|(_, operand)| matches!(operand, Operand::Undefined)),
        }
    }
}

/// One field entry of a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterEntry {
    /// Field name.
    pub field: String,
    /// Constraint on the field.
    pub criterion: Criterion,
}

/// A structural filter: an ordered AND of per-field criteria.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    entries: Vec<FilterEntry>,
}

impl Filter {
    /// Create an empty filter (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter with a single literal entry.
    pub fn by(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().field(field, value)
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[FilterEntry] {
        &self.entries
    }

    /// True when no entries are present. Undefined entries still count.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First field carrying an actual constraint.
    pub fn first_field(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| !e.criterion.is_undefined())
            .map(|e| e.field.as_str())
    }

    /// Add a literal entry. `Value::Null` means "attribute is absent".
    pub fn field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push(FilterEntry {
            field: field.into(),
            criterion: Criterion::Literal(value.into()),
        });
        self
    }

    /// Add an entry that may be undefined; `None` is dropped at compile time.
    pub fn maybe(mut self, field: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        let criterion = match value {
            Some(v) => Criterion::Literal(v.into()),
            None => Criterion::Undefined,
        };
        self.entries.push(FilterEntry {
            field: field.into(),
            criterion,
        });
        self
    }

    /// Add an operator constraint. Repeated calls for one field accumulate.
    pub fn op(mut self, field: impl Into<String>, op: Operator, operand: Operand) -> Self {
        let field = field.into();
        let existing = self
            .entries
            .iter()
            .position(|e| e.field == field && matches!(e.criterion, Criterion::Operators(_)));
        match existing {
            Some(pos) => {
                if let Criterion::Operators(ops) = &mut self.entries[pos].criterion {
                    ops.push((op, operand));
                }
            }
            None => self.entries.push(FilterEntry {
                field,
                criterion: Criterion::Operators(vec![(op, operand)]),
            }),
        }
        self
    }

    /// Field equals value.
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Eq, Operand::value(value))
    }

    /// Field not equals value.
    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Ne, Operand::value(value))
    }

    /// Field less than value.
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Lt, Operand::value(value))
    }

    /// Field less than or equal to value.
    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Le, Operand::value(value))
    }

    /// Field greater than value.
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Gt, Operand::value(value))
    }

    /// Field greater than or equal to value.
    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Ge, Operand::value(value))
    }

    /// Field is one of the candidates.
    pub fn is_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.op(field, Operator::In, Operand::list(values))
    }

    /// Field is none of the candidates.
    pub fn not_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.op(field, Operator::NotIn, Operand::list(values))
    }

    /// Field contains the value.
    pub fn contains(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Contains, Operand::value(value))
    }

    /// Field begins with the prefix.
    pub fn begins_with(self, field: impl Into<String>, prefix: impl Into<Value>) -> Self {
        self.op(field, Operator::BeginsWith, Operand::value(prefix))
    }

    /// Combine with another filter (AND).
    pub fn and(mut self, other: Filter) -> Self {
        self.entries.extend(other.entries);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_aliases() {
        assert_eq!(Operator::parse(">="), Some(Operator::Ge));
        assert_eq!(Operator::parse("GTE"), Some(Operator::Ge));
        assert_eq!(Operator::parse("not_in"), Some(Operator::NotIn));
        assert_eq!(Operator::parse("startsWith"), Some(Operator::BeginsWith));
        assert_eq!(Operator::parse("between"), None);
    }

    #[test]
    fn test_operator_canonical_roundtrip() {
        for op in Operator::ALL {
            assert_eq!(Operator::parse(op.as_str()), Some(op));
        }
        assert!(Operator::valid_names().contains("not-in"));
    }

    #[test]
    fn test_filter_builder_accumulates_operators() {
        let filter = Filter::new().gte("age", 18).lt("age", 65).field("role", "admin");

        assert_eq!(filter.entries().len(), 2);
        match &filter.entries()[0].criterion {
            Criterion::Operators(ops) => assert_eq!(ops.len(), 2),
            other => panic!("expected operators, got {other:?}"),
        }
        assert_eq!(filter.first_field(), Some("age"));
    }

    #[test]
    fn test_undefined_entries() {
        let filter = Filter::new().maybe("name", None::<&str>).field("age", 3);
        assert!(!filter.is_empty());
        assert!(filter.entries()[0].criterion.is_undefined());
        assert_eq!(filter.first_field(), Some("age"));

        let ops = Criterion::Operators(vec![(Operator::Eq, Operand::maybe(None::<i64>))]);
        assert!(ops.is_undefined());
    }

    #[test]
    fn test_and_merges_entries() {
        let filter = Filter::by("a", 1).and(Filter::by("b", 2));
        let fields: Vec<_> = filter.entries().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "b"]);
    }
}
