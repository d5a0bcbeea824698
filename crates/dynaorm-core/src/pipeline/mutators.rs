//! String mutators. Non-string values pass through unchanged.

use dynaorm_proto::Value;

fn map_string(value: Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        Value::StringArray(items) => Value::StringArray(items.iter().map(|s| f(s.as_str())).collect()),
        other => other,
    }
}

/// Strip leading and trailing whitespace.
pub fn trim() -> impl Fn(Value) -> Value + Send + Sync + 'static {
    |value: Value| map_string(value, |s| s.trim().to_string())
}

/// Convert to lowercase.
pub fn lowercase() -> impl Fn(Value) -> Value + Send + Sync + 'static {
    |value: Value| map_string(value, str::to_lowercase)
}

/// Convert to uppercase.
pub fn uppercase() -> impl Fn(Value) -> Value + Send + Sync + 'static {
    |value: Value| map_string(value, str::to_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutators() {
        assert_eq!(trim()(Value::from("  a b ")), Value::from("a b"));
        assert_eq!(lowercase()(Value::from("MiXeD")), Value::from("mixed"));
        assert_eq!(uppercase()(Value::from(vec!["a", "b"])), Value::from(vec!["A", "B"]));
        assert_eq!(trim()(Value::Int(3)), Value::Int(3));
    }
}
