//! Store-native filter expressions.
//!
//! A [`CompiledFilter`] is what a store receives: an expression string that
//! refers to attribute names and values only through placeholders (`#n0`,
//! `:v0`), the two side tables resolving those placeholders, and the
//! [`Predicate`] tree the string was rendered from. Remote stores send the
//! string; in-process stores evaluate the tree with [`CompiledFilter::evaluate`].

use std::collections::BTreeMap;
use std::fmt;

use crate::error::Error;
use crate::item::Item;
use crate::value::Value;

/// Binary comparison in an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Comparator {
    /// Expression syntax for this comparator.
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Ne => "<>",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }
}

/// Predicate tree over placeholders.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `#name <op> :value`
    Compare {
        name: String,
        comparator: Comparator,
        value: String,
    },
    /// `#name IN (:v0, :v1, ...)`
    In { name: String, values: Vec<String> },
    /// `contains(#name, :value)`
    Contains { name: String, value: String },
    /// `begins_with(#name, :value)`
    BeginsWith { name: String, value: String },
    /// `attribute_exists(#name)`
    Exists { name: String },
    /// `attribute_not_exists(#name)`
    NotExists { name: String },
    /// `NOT (...)`
    Not(Box<Predicate>),
    /// Conjunction of all children.
    And(Vec<Predicate>),
}

impl Predicate {
    /// Render in the store's expression syntax.
    pub fn render(&self) -> String {
        match self {
            Predicate::Compare {
                name,
                comparator,
                value,
            } => format!("{} {} {}", name, comparator.symbol(), value),
            Predicate::In { name, values } => format!("{} IN ({})", name, values.join(", ")),
            Predicate::Contains { name, value } => format!("contains({}, {})", name, value),
            Predicate::BeginsWith { name, value } => format!("begins_with({}, {})", name, value),
            Predicate::Exists { name } => format!("attribute_exists({})", name),
            Predicate::NotExists { name } => format!("attribute_not_exists({})", name),
            Predicate::Not(inner) => format!("NOT ({})", inner.render()),
            Predicate::And(children) => children
                .iter()
                .map(|child| match child {
                    Predicate::And(_) => format!("({})", child.render()),
                    _ => child.render(),
                })
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// A filter compiled to the store's placeholder-based form.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    /// Rendered predicate string.
    pub expression: String,
    /// Name placeholder (`#n0`) to attribute name.
    pub names: BTreeMap<String, String>,
    /// Value placeholder (`:v0`) to literal value.
    pub values: BTreeMap<String, Value>,
    /// The predicate tree the expression was rendered from.
    pub predicate: Predicate,
}

impl CompiledFilter {
    /// Build from a predicate and its side tables, rendering the expression.
    pub fn new(
        predicate: Predicate,
        names: BTreeMap<String, String>,
        values: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            expression: predicate.render(),
            names,
            values,
            predicate,
        }
    }

    /// Evaluate the predicate against an item.
    ///
    /// Follows the store's semantics: comparisons against a missing
    /// attribute are false, except `<>` which is true.
    pub fn evaluate(&self, item: &Item) -> Result<bool, Error> {
        self.evaluate_predicate(&self.predicate, item)
    }

    fn evaluate_predicate(&self, predicate: &Predicate, item: &Item) -> Result<bool, Error> {
        match predicate {
            Predicate::Compare {
                name,
                comparator,
                value,
            } => {
                let expected = self.value(value)?;
                let actual = match self.attribute(name, item)? {
                    Some(actual) => actual,
                    None => return Ok(*comparator == Comparator::Ne),
                };
                Ok(match comparator {
                    Comparator::Eq => actual.loosely_equals(expected),
                    Comparator::Ne => !actual.loosely_equals(expected),
                    Comparator::Lt => actual.compare(expected).is_some_and(|o| o.is_lt()),
                    Comparator::Le => actual.compare(expected).is_some_and(|o| o.is_le()),
                    Comparator::Gt => actual.compare(expected).is_some_and(|o| o.is_gt()),
                    Comparator::Ge => actual.compare(expected).is_some_and(|o| o.is_ge()),
                })
            }
            Predicate::In { name, values } => {
                let actual = match self.attribute(name, item)? {
                    Some(actual) => actual,
                    None => return Ok(false),
                };
                for placeholder in values {
                    if actual.loosely_equals(self.value(placeholder)?) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Contains { name, value } => {
                let needle = self.value(value)?;
                Ok(self
                    .attribute(name, item)?
                    .is_some_and(|actual| actual.contains(needle)))
            }
            Predicate::BeginsWith { name, value } => {
                let prefix = self.value(value)?;
                Ok(self
                    .attribute(name, item)?
                    .is_some_and(|actual| actual.begins_with(prefix)))
            }
            Predicate::Exists { name } => Ok(self.attribute(name, item)?.is_some()),
            Predicate::NotExists { name } => Ok(self.attribute(name, item)?.is_none()),
            Predicate::Not(inner) => Ok(!self.evaluate_predicate(inner, item)?),
            Predicate::And(children) => {
                for child in children {
                    if !self.evaluate_predicate(child, item)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    fn attribute<'a>(&self, placeholder: &str, item: &'a Item) -> Result<Option<&'a Value>, Error> {
        let name = self
            .names
            .get(placeholder)
            .ok_or_else(|| Error::UnresolvedPlaceholder(placeholder.to_string()))?;
        Ok(item.get(name))
    }

    fn value(&self, placeholder: &str) -> Result<&Value, Error> {
        self.values
            .get(placeholder)
            .ok_or_else(|| Error::UnresolvedPlaceholder(placeholder.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(fields: Vec<(&str, Value)>) -> Item {
        fields.into_iter().map(|(n, v)| (n.to_string(), v)).collect()
    }

    fn compiled(predicate: Predicate, values: Vec<(&str, Value)>) -> CompiledFilter {
        let names = [("#n0", "age"), ("#n1", "name")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let values = values.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        CompiledFilter::new(predicate, names, values)
    }

    #[test]
    fn test_render() {
        let predicate = Predicate::And(vec![
            Predicate::Compare {
                name: "#n0".into(),
                comparator: Comparator::Ge,
                value: ":v0".into(),
            },
            Predicate::Not(Box::new(Predicate::In {
                name: "#n1".into(),
                values: vec![":v1".into(), ":v2".into()],
            })),
            Predicate::NotExists { name: "#n2".into() },
        ]);

        assert_eq!(
            predicate.render(),
            "#n0 >= :v0 AND NOT (#n1 IN (:v1, :v2)) AND attribute_not_exists(#n2)"
        );
    }

    #[test]
    fn test_comparison_filters() {
        let row = item(vec![("age", Value::Int(18))]);
        let ge = compiled(
            Predicate::Compare {
                name: "#n0".into(),
                comparator: Comparator::Ge,
                value: ":v0".into(),
            },
            vec![(":v0", Value::Int(18))],
        );
        assert!(ge.evaluate(&row).unwrap());

        let lt = compiled(
            Predicate::Compare {
                name: "#n0".into(),
                comparator: Comparator::Lt,
                value: ":v0".into(),
            },
            vec![(":v0", Value::Int(18))],
        );
        assert!(!lt.evaluate(&row).unwrap());
    }

    #[test]
    fn test_missing_attribute_semantics() {
        let row = item(vec![("name", Value::from("Alice"))]);

        let eq = compiled(
            Predicate::Compare {
                name: "#n0".into(),
                comparator: Comparator::Eq,
                value: ":v0".into(),
            },
            vec![(":v0", Value::Int(1))],
        );
        assert!(!eq.evaluate(&row).unwrap());

        let ne = compiled(
            Predicate::Compare {
                name: "#n0".into(),
                comparator: Comparator::Ne,
                value: ":v0".into(),
            },
            vec![(":v0", Value::Int(1))],
        );
        assert!(ne.evaluate(&row).unwrap());

        let absent = compiled(Predicate::NotExists { name: "#n0".into() }, vec![]);
        assert!(absent.evaluate(&row).unwrap());
    }

    #[test]
    fn test_in_and_not_in() {
        let row = item(vec![("name", Value::from("bob"))]);
        let in_pred = Predicate::In {
            name: "#n1".into(),
            values: vec![":v0".into(), ":v1".into()],
        };
        let values = vec![(":v0", Value::from("alice")), (":v1", Value::from("bob"))];

        assert!(compiled(in_pred.clone(), values.clone()).evaluate(&row).unwrap());
        assert!(!compiled(Predicate::Not(Box::new(in_pred)), values)
            .evaluate(&row)
            .unwrap());
    }

    #[test]
    fn test_unresolved_placeholder() {
        let row = item(vec![]);
        let filter = compiled(Predicate::Exists { name: "#n9".into() }, vec![]);
        assert!(matches!(
            filter.evaluate(&row),
            Err(Error::UnresolvedPlaceholder(p)) if p == "#n9"
        ));
    }
}
