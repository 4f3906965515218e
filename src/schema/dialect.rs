//! Dialects and their recognized keywords
//!
//! A keyword outside the active dialect's set is not interpreted: it is kept
//! verbatim in `extension_data`. `discriminator` is recognized in every
//! dialect since polymorphic JSON Schema documents commonly borrow it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Input dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SchemaDialect {
    #[serde(rename = "draft4")]
    Draft4,
    #[serde(rename = "draft6")]
    Draft6,
    #[default]
    #[serde(rename = "draft7")]
    Draft7,
    #[serde(rename = "2019-09")]
    Draft201909,
    #[serde(rename = "openApi3")]
    OpenApi3,
}

const DRAFT4_BASE: &[&str] = &[
    "$ref", "$schema", "title", "description", "type", "format", "properties",
    "required", "items", "additionalItems", "additionalProperties",
    "patternProperties", "allOf", "anyOf", "oneOf", "not", "enum", "default",
    "definitions", "discriminator",
    // validation-only
    "multipleOf", "maximum", "exclusiveMaximum", "minimum", "exclusiveMinimum",
    "maxLength", "minLength", "pattern", "maxItems", "minItems", "uniqueItems",
    "maxProperties", "minProperties", "dependencies",
];

/// `$defs` is accepted from draft 6 on
const DRAFT6_ADDED: &[&str] = &["$id", "$defs", "const", "contains", "propertyNames", "examples"];

const DRAFT7_ADDED: &[&str] = &[
    "if", "then", "else", "readOnly", "writeOnly", "$comment",
    "contentMediaType", "contentEncoding",
];

const DRAFT201909_ADDED: &[&str] = &[
    "$anchor", "$vocabulary", "$recursiveRef", "$recursiveAnchor",
    "dependentSchemas", "dependentRequired", "unevaluatedProperties",
    "unevaluatedItems", "minContains", "maxContains", "deprecated", "contentSchema",
];

const OPENAPI3: &[&str] = &[
    "$ref", "title", "description", "type", "format", "properties", "required",
    "items", "additionalProperties", "allOf", "anyOf", "oneOf", "not", "enum",
    "default", "nullable", "discriminator", "readOnly", "writeOnly", "xml",
    "externalDocs", "example", "deprecated",
    "multipleOf", "maximum", "exclusiveMaximum", "minimum", "exclusiveMinimum",
    "maxLength", "minLength", "pattern", "maxItems", "minItems", "uniqueItems",
    "maxProperties", "minProperties",
];

impl SchemaDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft4 => "draft4",
            Self::Draft6 => "draft6",
            Self::Draft7 => "draft7",
            Self::Draft201909 => "2019-09",
            Self::OpenApi3 => "openApi3",
        }
    }

    /// Whether `keyword` is interpreted by this dialect
    pub fn recognizes(&self, keyword: &str) -> bool {
        if keyword == "id" {
            return *self == Self::Draft4;
        }
        match self {
            Self::OpenApi3 => OPENAPI3.contains(&keyword),
            Self::Draft4 => DRAFT4_BASE.contains(&keyword),
            Self::Draft6 => DRAFT4_BASE.contains(&keyword) || DRAFT6_ADDED.contains(&keyword),
            Self::Draft7 => {
                DRAFT4_BASE.contains(&keyword)
                    || DRAFT6_ADDED.contains(&keyword)
                    || DRAFT7_ADDED.contains(&keyword)
            }
            Self::Draft201909 => {
                DRAFT4_BASE.contains(&keyword)
                    || DRAFT6_ADDED.contains(&keyword)
                    || DRAFT7_ADDED.contains(&keyword)
                    || DRAFT201909_ADDED.contains(&keyword)
            }
        }
    }

    /// Keyword carrying the node's own identifier
    pub fn id_keyword(&self) -> Option<&'static str> {
        match self {
            Self::Draft4 => Some("id"),
            Self::OpenApi3 => None,
            _ => Some("$id"),
        }
    }

    /// Whether boolean schemas (`true` / `false`) are part of the dialect
    pub fn allows_boolean_schemas(&self) -> bool {
        !matches!(self, Self::Draft4 | Self::OpenApi3)
    }

    /// Infer the dialect from a document's `$schema` or `openapi` marker
    pub fn detect(document: &Value) -> Option<Self> {
        let obj = document.as_object()?;
        if obj.contains_key("openapi") {
            return Some(Self::OpenApi3);
        }
        let uri = obj.get("$schema")?.as_str()?;
        if uri.contains("draft-04") {
            Some(Self::Draft4)
        } else if uri.contains("draft-06") {
            Some(Self::Draft6)
        } else if uri.contains("draft-07") {
            Some(Self::Draft7)
        } else if uri.contains("2019-09") {
            Some(Self::Draft201909)
        } else {
            None
        }
    }
}

impl fmt::Display for SchemaDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SchemaDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "draft4" | "draft-04" => Ok(Self::Draft4),
            "draft6" | "draft-06" => Ok(Self::Draft6),
            "draft7" | "draft-07" => Ok(Self::Draft7),
            "2019-09" | "draft2019-09" => Ok(Self::Draft201909),
            "openapi3" | "openapi" => Ok(Self::OpenApi3),
            other => Err(format!("unknown schema dialect '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keyword_sets() {
        assert!(SchemaDialect::Draft4.recognizes("id"));
        assert!(!SchemaDialect::Draft7.recognizes("id"));
        assert!(!SchemaDialect::Draft4.recognizes("const"));
        assert!(SchemaDialect::Draft201909.recognizes("$defs"));
        assert!(SchemaDialect::Draft7.recognizes("$defs"));
        assert!(SchemaDialect::Draft6.recognizes("$defs"));
        assert!(!SchemaDialect::Draft4.recognizes("$defs"));
        assert!(SchemaDialect::OpenApi3.recognizes("nullable"));
        assert!(!SchemaDialect::Draft7.recognizes("nullable"));
        assert!(SchemaDialect::Draft6.recognizes("discriminator"));
    }

    #[test]
    fn test_detect() {
        let d = json!({"$schema": "http://json-schema.org/draft-04/schema#"});
        assert_eq!(SchemaDialect::detect(&d), Some(SchemaDialect::Draft4));
        let o = json!({"openapi": "3.0.3", "components": {}});
        assert_eq!(SchemaDialect::detect(&o), Some(SchemaDialect::OpenApi3));
        assert_eq!(SchemaDialect::detect(&json!({})), None);
    }

    #[test]
    fn test_serde_names() {
        let s = serde_json::to_string(&SchemaDialect::Draft201909).unwrap();
        assert_eq!(s, "\"2019-09\"");
        assert_eq!("openApi3".parse::<SchemaDialect>().unwrap(), SchemaDialect::OpenApi3);
    }
}
