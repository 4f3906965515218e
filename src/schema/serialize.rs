//! Serialization back to JSON
//!
//! Walks the structural tree only: a reference placeholder is written as the
//! `$ref` it was parsed from, never as its bound target, so shared and cyclic
//! references keep their original shape.

use serde_json::{Map, Value};

use super::{AdditionalProperties, Document, Items, NodeId, SchemaArena, SchemaDialect};

/// Serialize a document to pretty-printed JSON bytes
pub fn serialize(document: &Document) -> Vec<u8> {
    // Value serialization cannot fail: all map keys are strings.
    serde_json::to_vec_pretty(&to_value(document)).unwrap_or_default()
}

/// Serialize a document to a JSON value
pub fn to_value(document: &Document) -> Value {
    let mut root = node_to_value(&document.arena, document.root, document.dialect);

    if !document.components.is_empty() || !document.components_extra.is_empty() {
        let mut components = Map::new();
        if !document.components.is_empty() {
            components.insert(
                "schemas".to_string(),
                schema_map(&document.arena, document.components.iter(), document.dialect),
            );
        }
        for (key, value) in &document.components_extra {
            components.insert(key.clone(), value.clone());
        }
        if let Value::Object(obj) = &mut root {
            obj.insert("components".to_string(), Value::Object(components));
        }
    }

    root
}

/// Serialize the subtree rooted at `id`
pub fn node_to_value(arena: &SchemaArena, id: NodeId, dialect: SchemaDialect) -> Value {
    let Some(node) = arena.get(id) else {
        return Value::Null;
    };
    if let Some(b) = node.boolean {
        return Value::Bool(b);
    }

    let mut out = Map::new();

    if let Some(uri) = &node.schema_uri {
        put(&mut out, "$schema", Value::String(uri.clone()));
    }
    if let Some(id_text) = &node.id {
        put(&mut out, dialect.id_keyword().unwrap_or("$id"), Value::String(id_text.clone()));
    }
    if let Some(anchor) = &node.anchor {
        put(&mut out, "$anchor", Value::String(anchor.clone()));
    }
    if let Some(reference) = &node.reference {
        put(&mut out, "$ref", Value::String(reference.pointer.clone()));
    }
    if let Some(title) = &node.title {
        put(&mut out, "title", Value::String(title.clone()));
    }
    if let Some(description) = &node.description {
        put(&mut out, "description", Value::String(description.clone()));
    }
    if let Some(types) = &node.types {
        let value = if types.as_array {
            Value::Array(types.types.iter().map(|t| Value::String(t.as_str().into())).collect())
        } else {
            types
                .types
                .first()
                .map(|t| Value::String(t.as_str().into()))
                .unwrap_or(Value::Null)
        };
        put(&mut out, "type", value);
    }
    if let Some(format) = &node.format {
        put(&mut out, "format", Value::String(format.clone()));
    }
    if let Some(values) = &node.enumeration {
        put(&mut out, "enum", Value::Array(values.clone()));
    }
    if let Some(value) = &node.const_value {
        put(&mut out, "const", value.clone());
    }
    if let Some(value) = &node.default {
        put(&mut out, "default", value.clone());
    }
    if let Some(flag) = node.nullable {
        put(&mut out, "nullable", Value::Bool(flag));
    }
    if !node.properties.is_empty() {
        put(&mut out, "properties", schema_map(arena, node.properties.iter(), dialect));
    }
    if !node.required.is_empty() {
        put(
            &mut out,
            "required",
            Value::Array(node.required.iter().cloned().map(Value::String).collect()),
        );
    }
    match &node.items {
        Some(Items::Single(child)) => put(&mut out, "items", node_to_value(arena, *child, dialect)),
        Some(Items::Tuple(children)) => put(&mut out, "items", schema_list(arena, children, dialect)),
        None => {}
    }
    match &node.additional_properties {
        Some(AdditionalProperties::Bool(b)) => put(&mut out, "additionalProperties", Value::Bool(*b)),
        Some(AdditionalProperties::Schema(child)) => {
            put(&mut out, "additionalProperties", node_to_value(arena, *child, dialect))
        }
        None => {}
    }
    if !node.pattern_properties.is_empty() {
        put(
            &mut out,
            "patternProperties",
            schema_map(arena, node.pattern_properties.iter(), dialect),
        );
    }
    for (keyword, members) in [("allOf", &node.all_of), ("anyOf", &node.any_of), ("oneOf", &node.one_of)] {
        if !members.is_empty() {
            put(&mut out, keyword, schema_list(arena, members, dialect));
        }
    }
    for (keyword, child) in &node.applicators {
        put(&mut out, keyword, node_to_value(arena, *child, dialect));
    }
    for (keyword, map) in &node.schema_maps {
        put(&mut out, keyword, schema_map(arena, map.iter(), dialect));
    }
    if let Some(disc) = &node.discriminator {
        let value = if disc.legacy_string {
            Value::String(disc.property_name.clone())
        } else {
            let mut obj = Map::new();
            obj.insert("propertyName".into(), Value::String(disc.property_name.clone()));
            if !disc.mapping.is_empty() {
                let mapping = disc
                    .mapping
                    .iter()
                    .map(|(tag, entry)| (tag.clone(), Value::String(entry.reference.clone())))
                    .collect();
                obj.insert("mapping".into(), Value::Object(mapping));
            }
            for (key, value) in &disc.extension_data {
                obj.insert(key.clone(), value.clone());
            }
            Value::Object(obj)
        };
        put(&mut out, "discriminator", value);
    }
    if !node.definitions.is_empty() {
        put(&mut out, "definitions", schema_map(arena, node.definitions.iter(), dialect));
    }
    if !node.defs.is_empty() {
        put(&mut out, "$defs", schema_map(arena, node.defs.iter(), dialect));
    }
    for (keyword, value) in node.annotations.iter().chain(node.extension_data.iter()) {
        put(&mut out, keyword, value.clone());
    }

    Value::Object(out)
}

fn put(out: &mut Map<String, Value>, key: &str, value: Value) {
    out.insert(key.to_string(), value);
}

fn schema_map<'a>(
    arena: &SchemaArena,
    entries: impl Iterator<Item = (&'a String, &'a NodeId)>,
    dialect: SchemaDialect,
) -> Value {
    Value::Object(
        entries
            .map(|(name, id)| (name.clone(), node_to_value(arena, *id, dialect)))
            .collect(),
    )
}

fn schema_list(arena: &SchemaArena, ids: &[NodeId], dialect: SchemaDialect) -> Value {
    Value::Array(ids.iter().map(|id| node_to_value(arena, *id, dialect)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_str;
    use serde_json::json;

    #[test]
    fn test_round_trip_keeps_ref_shape_and_extensions() {
        let source = json!({
            "type": ["object", "null"],
            "x-internal": {"owner": "team-a"},
            "properties": {
                "zeta": {"$ref": "#/definitions/Node"},
                "alpha": {"type": "array", "items": [{"type": "string"}, {"type": "integer"}]}
            },
            "required": ["zeta", "alpha"],
            "definitions": {
                "Node": {"type": "object", "properties": {"next": {"$ref": "#/definitions/Node"}}}
            }
        });
        let doc = parse_str(&source.to_string(), "file:///n.json").unwrap();
        let back = to_value(&doc);
        assert_eq!(back, source);

        let keys: Vec<&String> = back["properties"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_explicit_null_default_survives() {
        let source = json!({"properties": {"a": {"type": "string", "default": null}}});
        let doc = parse_str(&source.to_string(), "file:///d.json").unwrap();
        assert_eq!(to_value(&doc), source);
    }
}
