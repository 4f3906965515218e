//! Structural parsing of schema documents
//!
//! Parsing never follows references and never checks referential
//! integrity; it only checks that each recognized keyword has the value
//! shape the dialect requires.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use url::Url;

use super::pointer::{without_fragment, JsonPointer};
use super::{
    AdditionalProperties, Discriminator, Document, Items, JsonType, MappingEntry, Reference,
    SchemaArena, SchemaDialect, SchemaNode, TypeSet,
};
use crate::error::ParseError;

/// Keywords holding one subschema, stored in `SchemaNode::applicators`
const APPLICATORS: &[&str] = &[
    "not", "if", "then", "else", "contains", "propertyNames", "additionalItems",
    "unevaluatedProperties", "unevaluatedItems",
];

/// Applicators whose boolean form predates boolean schemas
const BOOLEAN_APPLICATORS: &[&str] = &["additionalItems", "unevaluatedProperties", "unevaluatedItems"];

/// Parse a document, detecting the dialect from `$schema` / `openapi`
pub fn parse(bytes: &[u8], base_uri: &str) -> Result<Document, ParseError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let dialect = SchemaDialect::detect(&value).unwrap_or_default();
    parse_value(&value, base_uri, dialect)
}

/// Parse a document with an explicit dialect
pub fn parse_with(bytes: &[u8], base_uri: &str, dialect: SchemaDialect) -> Result<Document, ParseError> {
    let value: Value = serde_json::from_slice(bytes)?;
    parse_value(&value, base_uri, dialect)
}

/// Parse from text, detecting the dialect
pub fn parse_str(text: &str, base_uri: &str) -> Result<Document, ParseError> {
    parse(text.as_bytes(), base_uri)
}

/// Parse an already-decoded JSON value
pub fn parse_value(value: &Value, base_uri: &str, dialect: SchemaDialect) -> Result<Document, ParseError> {
    let base = parse_base_uri(base_uri)?;
    let mut parser = Parser {
        arena: SchemaArena::new(),
        dialect,
    };
    let scope = parser.arena.add_scope(without_fragment(&base));

    let mut components = IndexMap::new();
    let mut components_extra = IndexMap::new();

    let root = match value {
        Value::Object(obj) if dialect == SchemaDialect::OpenApi3 && obj.contains_key("components") => {
            let rest: Map<String, Value> = obj
                .iter()
                .filter(|(k, _)| k.as_str() != "components")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let root = parser.parse_object(&rest, &JsonPointer::root(), scope)?;
            if let Some(section) = obj.get("components") {
                parser.parse_components(section, scope, &mut components, &mut components_extra)?;
            }
            root
        }
        other => parser.parse_schema(other, &JsonPointer::root(), scope, true)?,
    };

    tracing::debug!(
        base = %base,
        dialect = %dialect,
        nodes = parser.arena.len(),
        "parsed schema document"
    );

    Ok(Document {
        base_uri: base,
        dialect,
        arena: parser.arena,
        root,
        components,
        components_extra,
    })
}

/// Parse a schema found at `pointer` outside the structural keywords (under
/// `x-` keys and the like) into an existing arena
pub(crate) fn parse_fragment(
    arena: &mut SchemaArena,
    value: &Value,
    pointer: &JsonPointer,
    scope: usize,
    dialect: SchemaDialect,
) -> Result<super::NodeId, ParseError> {
    let mut parser = Parser {
        arena: std::mem::take(arena),
        dialect,
    };
    let result = parser.parse_schema(value, pointer, scope, true);
    *arena = parser.arena;
    result
}

fn parse_base_uri(base_uri: &str) -> Result<Url, ParseError> {
    Url::parse(base_uri)
        .or_else(|_| Url::parse("file:///").and_then(|root| root.join(base_uri)))
        .map_err(|e| ParseError::InvalidBaseUri {
            uri: base_uri.to_string(),
            message: e.to_string(),
        })
}

struct Parser {
    arena: SchemaArena,
    dialect: SchemaDialect,
}

impl Parser {
    fn parse_schema(
        &mut self,
        value: &Value,
        pointer: &JsonPointer,
        scope: usize,
        allow_bool: bool,
    ) -> Result<super::NodeId, ParseError> {
        match value {
            Value::Object(obj) => self.parse_object(obj, pointer, scope),
            Value::Bool(b) if allow_bool || self.dialect.allows_boolean_schemas() => {
                Ok(self.arena.alloc(SchemaNode {
                    boolean: Some(*b),
                    scope,
                    ..Default::default()
                }))
            }
            _ => Err(self.shape_error(pointer, "a schema object")),
        }
    }

    fn shape_error(&self, pointer: &JsonPointer, expected: &str) -> ParseError {
        let keyword = pointer.segments().last().cloned().unwrap_or_else(|| "<root>".into());
        ParseError::keyword(&pointer.to_fragment(), &keyword, expected)
    }

    fn parse_object(
        &mut self,
        obj: &Map<String, Value>,
        pointer: &JsonPointer,
        outer_scope: usize,
    ) -> Result<super::NodeId, ParseError> {
        // Allocate first so ids follow document pre-order.
        let id = self.arena.alloc(SchemaNode::default());
        let mut node = SchemaNode::default();

        let scope = self.enter_scope(obj, &mut node, pointer, outer_scope)?;
        node.scope = scope;

        for (keyword, value) in obj {
            if !self.dialect.recognizes(keyword) {
                node.extension_data.insert(keyword.clone(), value.clone());
                continue;
            }
            let at = pointer.child(keyword.as_str());
            self.parse_keyword(&mut node, keyword, value, &at, scope)?;
        }

        if let Some(slot) = self.arena.get_mut(id) {
            *slot = node;
        }
        Ok(id)
    }

    /// Apply `$id`: returns the scope for this node's subtree
    fn enter_scope(
        &mut self,
        obj: &Map<String, Value>,
        node: &mut SchemaNode,
        pointer: &JsonPointer,
        outer_scope: usize,
    ) -> Result<usize, ParseError> {
        let Some(keyword) = self.dialect.id_keyword() else {
            return Ok(outer_scope);
        };
        let Some(raw) = obj.get(keyword) else {
            return Ok(outer_scope);
        };
        let text = raw
            .as_str()
            .ok_or_else(|| ParseError::keyword(&pointer.child(keyword).to_fragment(), keyword, "a string"))?;
        node.id = Some(text.to_string());

        if text.starts_with('#') {
            return Ok(outer_scope);
        }

        let outer = self
            .arena
            .scope_url(outer_scope)
            .cloned()
            .ok_or_else(|| ParseError::keyword(&pointer.to_fragment(), keyword, "a resolvable base"))?;
        let joined = outer.join(text).map_err(|e| {
            ParseError::keyword(&pointer.child(keyword).to_fragment(), keyword, format!("a URI ({})", e))
        })?;
        Ok(self.arena.add_scope(without_fragment(&joined)))
    }

    fn parse_keyword(
        &mut self,
        node: &mut SchemaNode,
        keyword: &str,
        value: &Value,
        at: &JsonPointer,
        scope: usize,
    ) -> Result<(), ParseError> {
        let ptr = at.to_fragment();
        match keyword {
            "$ref" => {
                let text = value.as_str().ok_or_else(|| ParseError::keyword(&ptr, keyword, "a string"))?;
                node.reference = Some(Reference {
                    pointer: text.to_string(),
                    target: None,
                });
            }
            "$id" | "id" => {
                // Already applied by enter_scope.
            }
            "$schema" => node.schema_uri = Some(expect_string(value, &ptr, keyword)?),
            "$anchor" => node.anchor = Some(expect_string(value, &ptr, keyword)?),
            "title" => node.title = Some(expect_string(value, &ptr, keyword)?),
            "description" => node.description = Some(expect_string(value, &ptr, keyword)?),
            "format" => node.format = Some(expect_string(value, &ptr, keyword)?),
            "type" => node.types = Some(parse_type_set(value, &ptr)?),
            "properties" => node.properties = self.parse_schema_map(value, at, scope)?,
            "patternProperties" => node.pattern_properties = self.parse_schema_map(value, at, scope)?,
            "definitions" => node.definitions = self.parse_schema_map(value, at, scope)?,
            "$defs" => node.defs = self.parse_schema_map(value, at, scope)?,
            "dependentSchemas" => {
                let map = self.parse_schema_map(value, at, scope)?;
                node.schema_maps.insert(keyword.to_string(), map);
            }
            "required" => {
                let items = value
                    .as_array()
                    .ok_or_else(|| ParseError::keyword(&ptr, keyword, "an array of strings"))?;
                node.required = items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| ParseError::keyword(&ptr, keyword, "an array of strings"))?;
            }
            "items" => {
                node.items = Some(match value {
                    Value::Array(members) => Items::Tuple(self.parse_schema_list(members, at, scope)?),
                    other => Items::Single(self.parse_schema(other, at, scope, false)?),
                });
            }
            "additionalProperties" => {
                node.additional_properties = Some(match value {
                    Value::Bool(b) => AdditionalProperties::Bool(*b),
                    Value::Object(obj) => AdditionalProperties::Schema(self.parse_object(obj, at, scope)?),
                    _ => return Err(ParseError::keyword(&ptr, keyword, "a boolean or a schema")),
                });
            }
            "allOf" | "anyOf" | "oneOf" => {
                let members = value
                    .as_array()
                    .filter(|m| !m.is_empty())
                    .ok_or_else(|| ParseError::keyword(&ptr, keyword, "a non-empty array of schemas"))?;
                let ids = self.parse_schema_list(members, at, scope)?;
                match keyword {
                    "allOf" => node.all_of = ids,
                    "anyOf" => node.any_of = ids,
                    _ => node.one_of = ids,
                }
            }
            k if APPLICATORS.contains(&k) => {
                let allow_bool = BOOLEAN_APPLICATORS.contains(&k);
                let child = self.parse_schema(value, at, scope, allow_bool)?;
                node.applicators.insert(k.to_string(), child);
            }
            "enum" => {
                let values = value.as_array().ok_or_else(|| ParseError::keyword(&ptr, keyword, "an array"))?;
                node.enumeration = Some(values.clone());
            }
            "const" => node.const_value = Some(value.clone()),
            "default" => node.default = Some(value.clone()),
            "nullable" => {
                let flag = value.as_bool().ok_or_else(|| ParseError::keyword(&ptr, keyword, "a boolean"))?;
                node.nullable = Some(flag);
            }
            "discriminator" => node.discriminator = Some(parse_discriminator(value, &ptr)?),
            _ => {
                node.annotations.insert(keyword.to_string(), value.clone());
            }
        }
        Ok(())
    }

    fn parse_schema_map(
        &mut self,
        value: &Value,
        at: &JsonPointer,
        scope: usize,
    ) -> Result<IndexMap<String, super::NodeId>, ParseError> {
        let keyword = at.segments().last().cloned().unwrap_or_default();
        let obj = value
            .as_object()
            .ok_or_else(|| ParseError::keyword(&at.to_fragment(), &keyword, "an object of schemas"))?;
        let mut out = IndexMap::with_capacity(obj.len());
        for (name, member) in obj {
            let id = self.parse_schema(member, &at.child(name.as_str()), scope, false)?;
            out.insert(name.clone(), id);
        }
        Ok(out)
    }

    fn parse_schema_list(
        &mut self,
        members: &[Value],
        at: &JsonPointer,
        scope: usize,
    ) -> Result<Vec<super::NodeId>, ParseError> {
        members
            .iter()
            .enumerate()
            .map(|(i, m)| self.parse_schema(m, &at.child_index(i), scope, false))
            .collect()
    }

    fn parse_components(
        &mut self,
        section: &Value,
        scope: usize,
        schemas: &mut IndexMap<String, super::NodeId>,
        extra: &mut IndexMap<String, Value>,
    ) -> Result<(), ParseError> {
        let at = JsonPointer::root().child("components");
        let obj = section
            .as_object()
            .ok_or_else(|| ParseError::keyword(&at.to_fragment(), "components", "an object"))?;
        for (key, value) in obj {
            if key == "schemas" {
                *schemas = self.parse_schema_map(value, &at.child("schemas"), scope)?;
            } else {
                extra.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}

fn expect_string(value: &Value, ptr: &str, keyword: &str) -> Result<String, ParseError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ParseError::keyword(ptr, keyword, "a string"))
}

fn parse_type_set(value: &Value, ptr: &str) -> Result<TypeSet, ParseError> {
    const EXPECTED: &str = "a type name or an array of type names";
    let names: Vec<&str> = match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items
            .iter()
            .map(Value::as_str)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ParseError::keyword(ptr, "type", EXPECTED))?,
        _ => return Err(ParseError::keyword(ptr, "type", EXPECTED)),
    };
    let types = names
        .into_iter()
        .map(JsonType::from_name)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ParseError::keyword(ptr, "type", EXPECTED))?;
    Ok(TypeSet {
        types,
        as_array: value.is_array(),
    })
}

fn parse_discriminator(value: &Value, ptr: &str) -> Result<Discriminator, ParseError> {
    const EXPECTED: &str = "a property name or an object with string 'propertyName'";
    match value {
        Value::String(name) => Ok(Discriminator {
            property_name: name.clone(),
            mapping: IndexMap::new(),
            extension_data: IndexMap::new(),
            legacy_string: true,
        }),
        Value::Object(obj) => {
            let property_name = obj
                .get("propertyName")
                .and_then(Value::as_str)
                .ok_or_else(|| ParseError::keyword(ptr, "discriminator", EXPECTED))?
                .to_string();
            let mut mapping = IndexMap::new();
            let mut extension_data = IndexMap::new();
            for (key, v) in obj {
                match key.as_str() {
                    "propertyName" => {}
                    "mapping" => {
                        let entries = v.as_object().ok_or_else(|| {
                            ParseError::keyword(ptr, "discriminator", "'mapping' to be an object of strings")
                        })?;
                        for (tag, target) in entries {
                            let reference = target.as_str().ok_or_else(|| {
                                ParseError::keyword(ptr, "discriminator", "'mapping' to be an object of strings")
                            })?;
                            mapping.insert(
                                tag.clone(),
                                MappingEntry {
                                    reference: reference.to_string(),
                                    target: None,
                                },
                            );
                        }
                    }
                    _ => {
                        extension_data.insert(key.clone(), v.clone());
                    }
                }
            }
            Ok(Discriminator {
                property_name,
                mapping,
                extension_data,
                legacy_string: false,
            })
        }
        _ => Err(ParseError::keyword(ptr, "discriminator", EXPECTED)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaKind;

    #[test]
    fn test_parse_simple_object() {
        let doc = parse_str(
            r#"{"type":"object","properties":{"name":{"type":"string"}},"required":["name"]}"#,
            "file:///person.json",
        )
        .unwrap();
        let root = doc.root_node();
        assert_eq!(root.kind(), SchemaKind::Object);
        assert_eq!(root.required, vec!["name"]);
        let name = &doc.arena[root.properties["name"]];
        assert_eq!(name.kind(), SchemaKind::Primitive);
        assert_eq!(doc.root.index(), 0);
    }

    #[test]
    fn test_wrong_type_shape_names_keyword() {
        let err = parse_str(r#"{"type": 5}"#, "file:///bad.json").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidKeyword {
                pointer: "#/type".into(),
                keyword: "type".into(),
                expected: "a type name or an array of type names".into(),
            }
        );
    }

    #[test]
    fn test_nested_shape_error_pointer() {
        let err = parse_str(
            r#"{"properties":{"a":{"required":"yes"}}}"#,
            "file:///bad.json",
        )
        .unwrap_err();
        assert_eq!(err.pointer(), Some("#/properties/a/required"));
    }

    #[test]
    fn test_malformed_json() {
        let err = parse(b"{\"type\": ", "file:///broken.json").unwrap_err();
        assert!(matches!(err, ParseError::Malformed { line: 1, .. }));
    }

    #[test]
    fn test_unknown_keywords_go_to_extension_data() {
        let doc = parse_with(
            br#"{"type":"string","x-go-type":"Name","nullable":true,"minLength":1}"#,
            "file:///s.json",
            SchemaDialect::Draft7,
        )
        .unwrap();
        let root = doc.root_node();
        assert_eq!(root.extension_data["x-go-type"], "Name");
        assert_eq!(root.extension_data["nullable"], true);
        assert_eq!(root.annotations["minLength"], 1);
        assert_eq!(root.nullable, None);
    }

    #[test]
    fn test_openapi_components() {
        let doc = parse_str(
            r#"{"openapi":"3.0.0","info":{"title":"t"},"components":{
                "schemas":{"Pet":{"type":"object","nullable":true}},
                "responses":{"NotFound":{"description":"missing"}}}}"#,
            "file:///api.json",
        )
        .unwrap();
        assert_eq!(doc.dialect, SchemaDialect::OpenApi3);
        let pet = doc.definition("Pet").unwrap();
        assert_eq!(doc.arena[pet].nullable, Some(true));
        assert!(doc.components_extra.contains_key("responses"));
        assert_eq!(doc.root_node().extension_data["openapi"], "3.0.0");
    }

    #[test]
    fn test_id_changes_scope() {
        let doc = parse_str(
            r#"{"$id":"http://example.com/root.json","definitions":{
                "A":{"$id":"nested/a.json","type":"string"}}}"#,
            "file:///local.json",
        )
        .unwrap();
        let a = doc.definition("A").unwrap();
        assert_eq!(
            doc.arena.base_uri(a).unwrap().as_str(),
            "http://example.com/nested/a.json"
        );
        assert_eq!(
            doc.arena.base_uri(doc.root).unwrap().as_str(),
            "http://example.com/root.json"
        );
    }

    #[test]
    fn test_boolean_schemas_by_dialect() {
        let ok = parse_with(br#"{"properties":{"a":true}}"#, "file:///a.json", SchemaDialect::Draft7);
        assert!(ok.is_ok());
        let err = parse_with(br#"{"properties":{"a":true}}"#, "file:///a.json", SchemaDialect::Draft4);
        assert!(err.is_err());
        let additional = parse_with(
            br#"{"additionalProperties":false}"#,
            "file:///a.json",
            SchemaDialect::Draft4,
        );
        assert!(additional.is_ok());
    }

    #[test]
    fn test_legacy_string_discriminator() {
        let doc = parse_str(r#"{"discriminator":"kind"}"#, "file:///d.json").unwrap();
        let disc = doc.root_node().discriminator.as_ref().unwrap();
        assert_eq!(disc.property_name, "kind");
        assert!(disc.legacy_string);
    }
}
