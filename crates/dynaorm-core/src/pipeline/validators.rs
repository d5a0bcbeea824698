//! Validators. Each returns `Err(message)` to reject a value.

use dynaorm_proto::Value;

/// Accept addresses of the form `local@domain.tld`.
pub fn is_email() -> impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static {
    |value: &Value| -> Result<(), String> {
        let text = value.as_str().ok_or("must be a string")?;
        let valid = match text.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.split('.').count() >= 2
                    && domain.split('.').all(|part| !part.is_empty())
                    && !text.chars().any(char::is_whitespace)
            }
            None => false,
        };
        if valid {
            Ok(())
        } else {
            Err(format!("'{text}' is not a valid email address"))
        }
    }
}

/// Require at least `min` characters.
pub fn min_length(min: usize) -> impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static {
    move |value: &Value| -> Result<(), String> {
        let text = value.as_str().ok_or("must be a string")?;
        if text.chars().count() < min {
            return Err(format!("must be at least {min} characters long"));
        }
        Ok(())
    }
}

/// Allow at most `max` characters.
pub fn max_length(max: usize) -> impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static {
    move |value: &Value| -> Result<(), String> {
        let text = value.as_str().ok_or("must be a string")?;
        if text.chars().count() > max {
            return Err(format!("must be at most {max} characters long"));
        }
        Ok(())
    }
}

/// Require a number within `[min, max]`.
pub fn range(min: f64, max: f64) -> impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static {
    move |value: &Value| -> Result<(), String> {
        let number = value.as_f64().ok_or("must be a number")?;
        if number < min || number > max {
            return Err(format!("must be between {min} and {max}"));
        }
        Ok(())
    }
}

/// Require one of the listed strings.
pub fn one_of(allowed: &[&str]) -> impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static {
    let allowed: Vec<String> = allowed.iter().map(|s| s.to_string()).collect();
    move |value: &Value| -> Result<(), String> {
        let text = value.as_str().ok_or("must be a string")?;
        if allowed.iter().any(|a| a == text) {
            Ok(())
        } else {
            Err(format!("must be one of: {}", allowed.join(", ")))
        }
    }
}

/// Reject null, empty strings and empty arrays.
pub fn not_empty() -> impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static {
    |value: &Value| -> Result<(), String> {
        let empty = match value {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::StringArray(items) => items.is_empty(),
            Value::IntArray(items) => items.is_empty(),
            Value::FloatArray(items) => items.is_empty(),
            _ => false,
        };
        if empty {
            Err("must not be empty".to_string())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_email() {
        let check = is_email();
        assert!(check(&Value::from("john@x.com")).is_ok());
        assert!(check(&Value::from("a.b@mail.example.org")).is_ok());
        for bad in ["not-an-email", "@x.com", "a@b", "a@@b.com", "a b@x.com", "a@x."] {
            assert!(check(&Value::from(bad)).is_err(), "{bad} accepted");
        }
        assert_eq!(check(&Value::Int(1)), Err("must be a string".to_string()));
    }

    #[test]
    fn test_lengths() {
        assert!(min_length(3)(&Value::from("abc")).is_ok());
        assert!(min_length(3)(&Value::from("ab")).is_err());
        assert!(max_length(2)(&Value::from("héé")).is_err());
        assert!(max_length(3)(&Value::from("héé")).is_ok());
    }

    #[test]
    fn test_range_and_one_of() {
        let age = range(0.0, 150.0);
        assert!(age(&Value::Int(30)).is_ok());
        assert!(age(&Value::Float(-1.0)).is_err());
        assert!(age(&Value::from("30")).is_err());

        let status = one_of(&["active", "banned"]);
        assert!(status(&Value::from("active")).is_ok());
        assert_eq!(
            status(&Value::from("gone")),
            Err("must be one of: active, banned".to_string())
        );
    }

    #[test]
    fn test_not_empty() {
        let check = not_empty();
        assert!(check(&Value::from("x")).is_ok());
        assert!(check(&Value::from("  ")).is_err());
        assert!(check(&Value::Null).is_err());
        assert!(check(&Value::IntArray(vec![])).is_err());
        assert!(check(&Value::Int(0)).is_ok());
    }
}
