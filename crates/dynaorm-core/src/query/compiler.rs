//! Compiles structural filters into the store's placeholder-based form.

use std::collections::{BTreeMap, HashMap};

use dynaorm_proto::{
    Comparator, CompiledFilter, Criterion, Filter, Operand, Operator, Predicate, Value,
};

use crate::catalog::RecordDescriptor;
use crate::error::Error;

/// Filter compiler.
///
/// Field names are mapped to storage names through the descriptor when one
/// is given; names it does not know pass through unchanged.
pub struct FilterCompiler<'a> {
    descriptor: Option<&'a RecordDescriptor>,
    default_operator: Operator,
    names: BTreeMap<String, String>,
    values: BTreeMap<String, Value>,
    placeholders: HashMap<String, String>,
}

impl<'a> FilterCompiler<'a> {
    /// Compiler for a record type, comparing literals by equality.
    pub fn new(descriptor: Option<&'a RecordDescriptor>) -> Self {
        Self {
            descriptor,
            default_operator: Operator::Eq,
            names: BTreeMap::new(),
            values: BTreeMap::new(),
            placeholders: HashMap::new(),
        }
    }

    /// Compare literal entries with `operator` instead of equality.
    pub fn with_default_operator(mut self, operator: Operator) -> Self {
        self.default_operator = operator;
        self
    }

    /// Compile a filter. Returns `None` when nothing constrains the scan.
    pub fn compile(mut self, filter: &Filter) -> Result<Option<CompiledFilter>, Error> {
        let mut predicates = Vec::new();

        for entry in filter.entries() {
            match &entry.criterion {
                Criterion::Undefined => {}
                Criterion::Literal(value) => {
                    let operand = Operand::Value(value.clone());
                    self.push(&mut predicates, &entry.field, self.default_operator, &operand)?;
                }
                Criterion::Operators(operators) => {
                    for (operator, operand) in operators {
                        self.push(&mut predicates, &entry.field, *operator, operand)?;
                    }
                }
            }
        }

        let predicate = match predicates.len() {
            0 => return Ok(None),
            1 => predicates.remove(0),
            _ => Predicate::And(predicates),
        };
        Ok(Some(CompiledFilter::new(predicate, self.names, self.values)))
    }

    fn push(
        &mut self,
        predicates: &mut Vec<Predicate>,
        field: &str,
        operator: Operator,
        operand: &Operand,
    ) -> Result<(), Error> {
        let value = match operand {
            Operand::Undefined => return Ok(()),
            Operand::Value(value) => value,
            Operand::List(list) => {
                if !operator.takes_list() {
                    return Err(Error::InvalidQuery(format!(
                        "operator '{operator}' on '{field}' takes a single value"
                    )));
                }
                if let Some(predicate) = self.list_predicate(field, operator, list) {
                    predicates.push(predicate);
                }
                return Ok(());
            }
        };

        if value.is_null() {
            let name = self.name(field);
            predicates.push(match operator {
                Operator::Eq => Predicate::NotExists { name },
                Operator::Ne => Predicate::Exists { name },
                _ => {
                    return Err(Error::InvalidQuery(format!(
                        "operator '{operator}' on '{field}' cannot compare against null"
                    )))
                }
            });
            return Ok(());
        }

        if operator.takes_list() {
            let list = value.clone().into_elements();
            if let Some(predicate) = self.list_predicate(field, operator, &list) {
                predicates.push(predicate);
            }
            return Ok(());
        }

        let name = self.name(field);
        let placeholder = self.value(value.clone());
        predicates.push(match operator {
            Operator::Contains => Predicate::Contains {
                name,
                value: placeholder,
            },
            Operator::BeginsWith => Predicate::BeginsWith {
                name,
                value: placeholder,
            },
            comparison => Predicate::Compare {
                name,
                comparator: comparator(comparison),
                value: placeholder,
            },
        });
        Ok(())
    }

    /// `in` over nothing matches nothing; `not-in` over nothing constrains nothing.
    fn list_predicate(&mut self, field: &str, operator: Operator, list: &[Value]) -> Option<Predicate> {
        if list.is_empty() {
            return match operator {
                Operator::In => {
                    let name = self.name(field);
                    Some(Predicate::And(vec![
                        Predicate::Exists { name: name.clone() },
                        Predicate::NotExists { name },
                    ]))
                }
                _ => None,
            };
        }

        let name = self.name(field);
        let values = list.iter().map(|v| self.value(v.clone())).collect();
        let membership = Predicate::In { name, values };
        Some(match operator {
            Operator::NotIn => Predicate::Not(Box::new(membership)),
            _ => membership,
        })
    }

    fn name(&mut self, field: &str) -> String {
        let attribute = match self.descriptor {
            Some(descriptor) => descriptor.storage_name_of(field).to_string(),
            None => field.to_string(),
        };
        if let Some(placeholder) = self.placeholders.get(&attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.clone());
        self.placeholders.insert(attribute, placeholder.clone());
        placeholder
    }

    fn value(&mut self, value: Value) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }
}

fn comparator(operator: Operator) -> Comparator {
    match operator {
        Operator::Ne => Comparator::Ne,
        Operator::Lt => Comparator::Lt,
        Operator::Le => Comparator::Le,
        Operator::Gt => Comparator::Gt,
        Operator::Ge => Comparator::Ge,
        _ => Comparator::Eq,
    }
}

/// Map requested fields to a store projection.
///
/// An empty request means no projection rather than "no attributes".
/// `required` fields are always added so keys and join columns survive.
pub fn projection(
    descriptor: &RecordDescriptor,
    fields: Option<&[String]>,
    required: &[String],
) -> Option<Vec<String>> {
    let fields = fields.filter(|f| !f.is_empty())?;
    let mut attributes: Vec<String> = Vec::new();
    for field in fields.iter().chain(required) {
        let attribute = descriptor.storage_name_of(field).to_string();
        if !attributes.contains(&attribute) {
            attributes.push(attribute);
        }
    }
    Some(attributes)
}
