//! Render Profiles
//!
//! Per-language spelling: scalar and format mappings, container and
//! nullable wrappers, reserved-word escaping. Emitters hold one profile and
//! never hard-code these spellings themselves.

use serde::{Deserialize, Serialize};

use crate::model::PrimitiveType;

/// Supported target languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    #[serde(alias = "ts")]
    TypeScript,
    #[serde(alias = "py")]
    Python,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Rust, Language::TypeScript, Language::Python];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::TypeScript => "typescript",
            Self::Python => "python",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rust" | "rs" => Ok(Self::Rust),
            "typescript" | "ts" => Ok(Self::TypeScript),
            "python" | "py" => Ok(Self::Python),
            other => Err(format!("unknown language '{}'", other)),
        }
    }
}

/// Type mappings for JSON scalar types and formats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeMappings {
    pub string: String,
    pub integer: String,
    pub number: String,
    pub boolean: String,
    pub null: String,

    /// Format-specific mappings
    pub datetime: String,
    pub uuid: String,
    pub date: String,
    pub time: String,
    pub decimal: Option<String>,
    pub uri: Option<String>,
    pub email: Option<String>,
    pub int64: Option<String>,
    pub int32: Option<String>,

    /// Unknown/any type
    pub any: String,
}

/// Where the escape goes when an identifier is reserved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordEscape {
    Prefix(String),
    Suffix(String),
}

/// Language-specific rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderProfile {
    pub language: Language,
    pub types: TypeMappings,
    pub keyword_escape: KeywordEscape,
}

impl RenderProfile {
    pub fn rust() -> Self {
        Self {
            language: Language::Rust,
            types: TypeMappings {
                string: "String".to_string(),
                integer: "i64".to_string(),
                number: "f64".to_string(),
                boolean: "bool".to_string(),
                null: "()".to_string(),
                datetime: "chrono::DateTime<chrono::Utc>".to_string(),
                uuid: "uuid::Uuid".to_string(),
                date: "chrono::NaiveDate".to_string(),
                time: "chrono::NaiveTime".to_string(),
                decimal: Some("rust_decimal::Decimal".to_string()),
                uri: Some("String".to_string()),
                email: Some("String".to_string()),
                int64: Some("i64".to_string()),
                int32: Some("i32".to_string()),
                any: "serde_json::Value".to_string(),
            },
            keyword_escape: KeywordEscape::Prefix("r#".to_string()),
        }
    }

    pub fn typescript() -> Self {
        Self {
            language: Language::TypeScript,
            types: TypeMappings {
                string: "string".to_string(),
                integer: "number".to_string(),
                number: "number".to_string(),
                boolean: "boolean".to_string(),
                null: "null".to_string(),
                // JSON carries these as strings
                datetime: "string".to_string(),
                uuid: "string".to_string(),
                date: "string".to_string(),
                time: "string".to_string(),
                decimal: Some("string".to_string()),
                uri: Some("string".to_string()),
                email: Some("string".to_string()),
                int64: None,
                int32: None,
                any: "unknown".to_string(),
            },
            keyword_escape: KeywordEscape::Prefix("_".to_string()),
        }
    }

    /// pydantic v2
    pub fn python() -> Self {
        Self {
            language: Language::Python,
            types: TypeMappings {
                string: "str".to_string(),
                integer: "int".to_string(),
                number: "float".to_string(),
                boolean: "bool".to_string(),
                null: "None".to_string(),
                datetime: "datetime.datetime".to_string(),
                uuid: "uuid.UUID".to_string(),
                date: "datetime.date".to_string(),
                time: "datetime.time".to_string(),
                decimal: Some("decimal.Decimal".to_string()),
                uri: Some("str".to_string()),
                email: Some("str".to_string()),
                int64: None,
                int32: None,
                any: "Any".to_string(),
            },
            // A leading underscore makes a pydantic attribute private
            keyword_escape: KeywordEscape::Suffix("_".to_string()),
        }
    }

    pub fn for_language(language: Language) -> Self {
        match language {
            Language::Rust => Self::rust(),
            Language::TypeScript => Self::typescript(),
            Language::Python => Self::python(),
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self.language {
            Language::Rust => RUST_KEYWORDS,
            Language::TypeScript => TS_KEYWORDS,
            Language::Python => PYTHON_KEYWORDS,
        }
    }

    pub fn is_keyword(&self, name: &str) -> bool {
        self.keywords().contains(&name)
    }

    /// Escape a keyword if needed
    pub fn escape_keyword(&self, name: &str) -> String {
        if !self.is_keyword(name) {
            return name.to_string();
        }
        // These cannot be raw identifiers.
        if self.language == Language::Rust && matches!(name, "self" | "Self" | "super" | "crate") {
            return format!("{}_", name);
        }
        match &self.keyword_escape {
            KeywordEscape::Prefix(p) => format!("{}{}", p, name),
            KeywordEscape::Suffix(s) => format!("{}{}", name, s),
        }
    }

    /// Type spelling for a primitive, format-aware
    pub fn primitive(&self, primitive: &PrimitiveType) -> &str {
        match primitive {
            PrimitiveType::String { format } => format
                .as_deref()
                .filter(|f| !matches!(*f, "int32" | "int64"))
                .and_then(|f| self.format_type(f))
                .unwrap_or(self.types.string.as_str()),
            PrimitiveType::Integer { format } => format
                .as_deref()
                .filter(|f| matches!(*f, "int32" | "int64"))
                .and_then(|f| self.format_type(f))
                .unwrap_or(self.types.integer.as_str()),
            PrimitiveType::Number { format } => format
                .as_deref()
                .filter(|f| *f == "decimal")
                .and_then(|f| self.format_type(f))
                .unwrap_or(self.types.number.as_str()),
            PrimitiveType::Boolean => &self.types.boolean,
            PrimitiveType::Null => &self.types.null,
            PrimitiveType::Any => &self.types.any,
        }
    }

    /// Get the type string for a JSON format
    pub fn format_type(&self, format: &str) -> Option<&str> {
        match format {
            "date-time" => Some(&self.types.datetime),
            "uuid" => Some(&self.types.uuid),
            "date" => Some(&self.types.date),
            "time" => Some(&self.types.time),
            "decimal" => self.types.decimal.as_deref(),
            "uri" | "uri-reference" => self.types.uri.as_deref(),
            "email" => self.types.email.as_deref(),
            "int64" => self.types.int64.as_deref(),
            "int32" => self.types.int32.as_deref(),
            _ => None,
        }
    }

    pub fn wrap_nullable(&self, type_str: &str) -> String {
        match self.language {
            Language::Rust => format!("Option<{}>", type_str),
            Language::TypeScript => format!("{} | null", type_str),
            Language::Python => format!("Optional[{}]", type_str),
        }
    }

    /// Spelling through the shared wrapper alias
    pub fn wrap_wrapper(&self, type_str: &str) -> String {
        match self.language {
            Language::Rust | Language::TypeScript => format!("Nullable<{}>", type_str),
            Language::Python => format!("Nullable[{}]", type_str),
        }
    }

    pub fn wrap_array(&self, type_str: &str) -> String {
        match self.language {
            Language::Rust => format!("Vec<{}>", type_str),
            Language::TypeScript if type_str.contains(' ') => format!("({})[]", type_str),
            Language::TypeScript => format!("{}[]", type_str),
            Language::Python => format!("list[{}]", type_str),
        }
    }

    pub fn wrap_tuple(&self, items: &[String]) -> String {
        match self.language {
            Language::Rust if items.len() == 1 => format!("({},)", items[0]),
            Language::Rust => format!("({})", items.join(", ")),
            Language::TypeScript => format!("[{}]", items.join(", ")),
            Language::Python if items.is_empty() => "tuple[()]".to_string(),
            Language::Python => format!("tuple[{}]", items.join(", ")),
        }
    }

    pub fn wrap_map(&self, value_type: &str) -> String {
        match self.language {
            Language::Rust => format!("std::collections::HashMap<String, {}>", value_type),
            Language::TypeScript => format!("Record<string, {}>", value_type),
            Language::Python => format!("dict[str, {}]", value_type),
        }
    }

    /// Box for recursion (Rust only)
    pub fn wrap_box(&self, type_str: &str) -> String {
        match self.language {
            Language::Rust => format!("Box<{}>", type_str),
            _ => type_str.to_string(),
        }
    }
}

// =============================================================================
// Keywords
// =============================================================================

const RUST_KEYWORDS: &[&str] = &[
    "as", "break", "const", "continue", "crate", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct",
    "super", "trait", "true", "type", "unsafe", "use", "where", "while",
    "async", "await", "dyn", "abstract", "become", "box", "do", "final",
    "macro", "override", "priv", "typeof", "unsized", "virtual", "yield", "try",
];

const TS_KEYWORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "export", "extends", "false",
    "finally", "for", "function", "if", "import", "in", "instanceof", "new",
    "null", "return", "super", "switch", "this", "throw", "true", "try",
    "typeof", "var", "void", "while", "with", "as", "implements", "interface",
    "let", "package", "private", "protected", "public", "static", "yield",
    "any", "boolean", "constructor", "declare", "get", "module", "require",
    "number", "set", "string", "symbol", "type", "from", "of",
];

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break",
    "class", "continue", "def", "del", "elif", "else", "except", "finally",
    "for", "from", "global", "if", "import", "in", "is", "lambda", "nonlocal",
    "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_profile_defaults() {
        let profile = RenderProfile::rust();
        assert_eq!(profile.types.string, "String");
        assert_eq!(profile.types.integer, "i64");
        assert_eq!(profile.keyword_escape, KeywordEscape::Prefix("r#".into()));
    }

    #[test]
    fn test_keyword_escape() {
        let rust = RenderProfile::rust();
        assert_eq!(rust.escape_keyword("type"), "r#type");
        assert_eq!(rust.escape_keyword("self"), "self_");
        assert_eq!(rust.escape_keyword("name"), "name");

        assert_eq!(RenderProfile::typescript().escape_keyword("class"), "_class");
        assert_eq!(RenderProfile::python().escape_keyword("from"), "from_");
    }

    #[test]
    fn test_format_mapping() {
        let rust = RenderProfile::rust();
        let uuid = PrimitiveType::String { format: Some("uuid".into()) };
        let unknown = PrimitiveType::String { format: Some("hostname".into()) };
        assert_eq!(rust.primitive(&uuid), "uuid::Uuid");
        assert_eq!(rust.primitive(&unknown), "String");
        assert_eq!(RenderProfile::python().primitive(&uuid), "uuid.UUID");
    }

    #[test]
    fn test_wrap_containers() {
        let rust = RenderProfile::rust();
        assert_eq!(rust.wrap_array("i64"), "Vec<i64>");
        assert_eq!(rust.wrap_map("String"), "std::collections::HashMap<String, String>");
        assert_eq!(rust.wrap_tuple(&["i64".into()]), "(i64,)");

        let ts = RenderProfile::typescript();
        assert_eq!(ts.wrap_array("number"), "number[]");
        assert_eq!(ts.wrap_array("string | null"), "(string | null)[]");
        assert_eq!(ts.wrap_map("string"), "Record<string, string>");

        assert_eq!(RenderProfile::python().wrap_nullable("int"), "Optional[int]");
    }

    #[test]
    fn test_language_parse() {
        assert_eq!("ts".parse::<Language>().unwrap(), Language::TypeScript);
        assert!("cobol".parse::<Language>().is_err());
    }
}
