//! Filter compilation, query execution and eager loading.

pub mod compiler;
pub mod executor;
pub mod options;
mod resolver;

pub use compiler::{projection, FilterCompiler};
pub use executor::QueryExecutor;
pub use options::{Include, OrderDirection, QueryOptions, Trashed};

use dynaorm_proto::{Filter, Operand, Operator, Value};

use crate::error::Error;

/// Normalize the `field, operator, value` shorthand into a structural filter.
///
/// Operator strings accept the canonical names and their sugar aliases.
/// For `in`/`not-in` an array value is expanded into a candidate list.
pub fn shorthand(field: &str, operator: &str, value: impl Into<Value>) -> Result<Filter, Error> {
    let op = Operator::parse(operator).ok_or_else(|| Error::InvalidOperator {
        operator: operator.to_string(),
        valid: Operator::valid_names(),
    })?;
    let value = value.into();
    let operand = if op.takes_list() {
        Operand::List(value.into_elements())
    } else {
        Operand::Value(value)
    };
    Ok(Filter::new().op(field, op, operand))
}
