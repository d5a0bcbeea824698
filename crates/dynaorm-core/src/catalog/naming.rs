//! Type and collection naming.

use convert_case::{Case, Casing};

/// Short name of a Rust type: the last path segment without generic arguments.
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Default collection name: the pluralized snake-case form of a type name.
///
/// `User` becomes `users`, `OrderItem` becomes `order_items`, `Category`
/// becomes `categories`.
pub fn collection_name(type_name: &str) -> String {
    pluralize(&short_type_name(type_name).to_case(Case::Snake))
}

fn pluralize(word: &str) -> String {
    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u');

    if let Some(stem) = word.strip_suffix('y') {
        if stem.chars().last().is_some_and(|c| !is_vowel(c)) {
            return format!("{stem}ies");
        }
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{word}es");
    }
    format!("{word}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("app::models::User"), "User");
        assert_eq!(short_type_name("Wrapper<app::User>"), "Wrapper");
        assert_eq!(short_type_name("Role"), "Role");
    }

    #[test]
    fn test_collection_name() {
        assert_eq!(collection_name("app::User"), "users");
        assert_eq!(collection_name("OrderItem"), "order_items");
        assert_eq!(collection_name("Category"), "categories");
        assert_eq!(collection_name("Day"), "days");
        assert_eq!(collection_name("Box"), "boxes");
        assert_eq!(collection_name("Address"), "addresses");
        assert_eq!(collection_name("Match"), "matches");
    }
}
