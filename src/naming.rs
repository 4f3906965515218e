//! Identifier casing
//!
//! Word splitting and case conversion shared by the type-name registry and
//! the language emitters. Words are split on any non-alphanumeric run and on
//! lower→upper and acronym→word boundaries (`HTTPServer` → `HTTP`, `Server`).

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Casing applied to generated property identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingStrategy {
    Pascal,
    Camel,
    Snake,
    /// Keep the JSON name, only replacing characters that cannot appear in identifiers
    Preserve,
}

impl NamingStrategy {
    pub fn apply(&self, name: &str) -> String {
        match self {
            Self::Pascal => to_pascal_case(name),
            Self::Camel => to_camel_case(name),
            Self::Snake => to_snake_case(name),
            Self::Preserve => sanitize_identifier(name),
        }
    }
}

fn separators() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[^A-Za-z0-9]+").expect("static regex"))
}

/// Split a raw name into words
pub fn split_words(s: &str) -> Vec<String> {
    let mut words = Vec::new();

    for chunk in separators().split(s).filter(|c| !c.is_empty()) {
        let chars: Vec<char> = chunk.chars().collect();
        let mut current = String::new();

        for (i, &c) in chars.iter().enumerate() {
            let prev = if i > 0 { Some(chars[i - 1]) } else { None };
            let next = chars.get(i + 1).copied();

            let boundary = match prev {
                Some(p) if c.is_ascii_uppercase() => {
                    p.is_ascii_lowercase()
                        || p.is_ascii_digit()
                        || (p.is_ascii_uppercase() && next.is_some_and(|n| n.is_ascii_lowercase()))
                }
                _ => false,
            };

            if boundary && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            current.push(c);
        }

        if !current.is_empty() {
            words.push(current);
        }
    }

    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => {
            let mut result = first.to_ascii_uppercase().to_string();
            result.extend(chars.map(|c| c.to_ascii_lowercase()));
            result
        }
    }
}

/// Convert to PascalCase
pub fn to_pascal_case(s: &str) -> String {
    guard_leading_digit(split_words(s).iter().map(|w| capitalize(w)).collect())
}

/// Convert to camelCase
pub fn to_camel_case(s: &str) -> String {
    let words = split_words(s);
    let mut result = String::with_capacity(s.len());
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            result.push_str(&word.to_ascii_lowercase());
        } else {
            result.push_str(&capitalize(word));
        }
    }
    guard_leading_digit(result)
}

/// Convert to snake_case
pub fn to_snake_case(s: &str) -> String {
    let words: Vec<String> = split_words(s).iter().map(|w| w.to_ascii_lowercase()).collect();
    guard_leading_digit(words.join("_"))
}

/// Convert to SCREAMING_SNAKE_CASE
pub fn to_screaming_snake_case(s: &str) -> String {
    to_snake_case(s).to_ascii_uppercase()
}

/// Replace characters that cannot appear in an identifier with `_`
pub fn sanitize_identifier(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if replaced.chars().all(|c| c == '_') {
        return String::new();
    }
    guard_leading_digit(replaced)
}

fn guard_leading_digit(s: String) -> String {
    if s.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", s)
    } else {
        s
    }
}

/// Append a numeric suffix, starting at 2 for the first collision
pub fn with_suffix(base: &str, n: usize) -> String {
    format!("{}{}", base, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("petType"), vec!["pet", "Type"]);
        assert_eq!(split_words("HTTPServer"), vec!["HTTP", "Server"]);
        assert_eq!(split_words("first-name_x"), vec!["first", "name", "x"]);
        assert_eq!(split_words("v2Item"), vec!["v2", "Item"]);
    }

    #[test]
    fn test_casing() {
        assert_eq!(to_pascal_case("pet_type"), "PetType");
        assert_eq!(to_pascal_case("HTTPServer"), "HttpServer");
        assert_eq!(to_camel_case("Pet-Type"), "petType");
        assert_eq!(to_snake_case("petType"), "pet_type");
        assert_eq!(to_screaming_snake_case("in progress"), "IN_PROGRESS");
    }

    #[test]
    fn test_leading_digit_and_empty() {
        assert_eq!(to_pascal_case("3d-model"), "_3dModel");
        assert_eq!(to_pascal_case("!!!"), "");
        assert_eq!(sanitize_identifier("$ref"), "_ref");
        assert_eq!(sanitize_identifier("@@"), "");
    }

    #[test]
    fn test_naming_strategy() {
        assert_eq!(NamingStrategy::Pascal.apply("first_name"), "FirstName");
        assert_eq!(NamingStrategy::Preserve.apply("first-name"), "first_name");
    }
}
