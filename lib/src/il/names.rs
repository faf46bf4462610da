//! Name checks and qualified type names
//!
//! Top-level types are qualified as `Namespace.Name` (or just `Name` in the global namespace).
//! Nested types are qualified through their declaring type, as `Outer/Inner`.

/// Separator between a declaring type and a nested type in qualified names
pub const NESTED_SEPARATOR: char = '/';

/// Check if a string would be a valid simple name (for a type, method, field, or local)
pub fn check_valid_name(name: impl AsRef<str>) -> Result<(), String> {
    let name = name.as_ref();
    if name.is_empty() {
        Err(String::from("Name is empty"))
    } else if name.contains(NESTED_SEPARATOR) {
        Err(format!("Name '{}' contains an illegal character", name))
    } else if name.chars().any(char::is_whitespace) {
        Err(format!("Name '{}' contains whitespace", name))
    } else {
        Ok(())
    }
}

/// Check if a string would be a valid namespace (possibly empty, dot-separated)
pub fn check_valid_namespace(namespace: impl AsRef<str>) -> Result<(), String> {
    let namespace = namespace.as_ref();
    if namespace.is_empty() {
        Ok(())
    } else {
        namespace.split('.').map(check_valid_name).collect()
    }
}

/// Qualified name of a top-level type
pub fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        String::from(name)
    } else {
        format!("{}.{}", namespace, name)
    }
}

/// Split `Outer/Inner/Innermost` into the top-level type and the chain of nested names
pub fn split_nested(qualified: &str) -> (&str, Vec<&str>) {
    let mut parts = qualified.split(NESTED_SEPARATOR);
    let top = parts.next().unwrap_or("");
    (top, parts.collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names() {
        assert!(check_valid_name("get_MaxStamina").is_ok());
        assert!(check_valid_name(".ctor").is_ok());
        assert!(check_valid_name("").is_err());
        assert!(check_valid_name("Outer/Inner").is_err());
        assert!(check_valid_namespace("").is_ok());
        assert!(check_valid_namespace("Game.Data").is_ok());
        assert!(check_valid_namespace("Game..Data").is_err());
    }

    #[test]
    fn qualified_names() {
        assert_eq!(qualify("Game", "PlayerStats"), "Game.PlayerStats");
        assert_eq!(qualify("", "Global"), "Global");
        assert_eq!(
            split_nested("Game.PlayerStats/Data/Raw"),
            ("Game.PlayerStats", vec!["Data", "Raw"])
        );
        assert_eq!(split_nested("Game.Helper"), ("Game.Helper", vec![]));
    }
}
