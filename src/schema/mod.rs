//! Schema Node Model
//!
//! In-memory representation of a JSON Schema / OpenAPI document:
//! - All nodes live in a [`SchemaArena`] and are addressed by [`NodeId`]
//! - A `$ref` is a placeholder node holding its pointer text; resolution
//!   binds it to the target node instead of copying
//! - Keywords the active [`SchemaDialect`] does not know are kept verbatim in
//!   `extension_data`, known non-structural keywords in `annotations`

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use url::Url;

pub mod dialect;
pub mod parse;
pub mod pointer;
pub mod serialize;

pub use dialect::SchemaDialect;
pub use parse::{parse, parse_str, parse_with};
pub use pointer::JsonPointer;
pub use serialize::{serialize, to_value};

// =============================================================================
// Identity
// =============================================================================

/// Stable identity of a node within its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Keyword Values
// =============================================================================

/// JSON Schema primitive type names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

impl JsonType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }
}

/// The `type` keyword: a set of types in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSet {
    pub types: Vec<JsonType>,
    /// Whether the source spelled `type` as an array
    pub as_array: bool,
}

impl TypeSet {
    pub fn contains(&self, ty: JsonType) -> bool {
        self.types.contains(&ty)
    }

    pub fn allows_null(&self) -> bool {
        self.contains(JsonType::Null)
    }

    /// Declared types other than `null`
    pub fn non_null(&self) -> impl Iterator<Item = JsonType> + '_ {
        self.types.iter().copied().filter(|t| *t != JsonType::Null)
    }
}

/// The `items` keyword
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Items {
    Single(NodeId),
    Tuple(Vec<NodeId>),
}

/// The `additionalProperties` keyword
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdditionalProperties {
    Bool(bool),
    Schema(NodeId),
}

/// A `$ref` placeholder and its binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Pointer text as written
    pub pointer: String,
    /// Bound target once resolved
    pub target: Option<NodeId>,
}

/// One `discriminator.mapping` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Reference text as written (`#/components/schemas/Cat` or a bare name)
    pub reference: String,
    pub target: Option<NodeId>,
}

/// OpenAPI discriminator (or the legacy Swagger 2 string form)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discriminator {
    pub property_name: String,
    pub mapping: IndexMap<String, MappingEntry>,
    /// Unknown keys inside the discriminator object
    pub extension_data: IndexMap<String, Value>,
    /// Source wrote `"discriminator": "<name>"`
    pub legacy_string: bool,
}

/// Coarse classification of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaKind {
    Reference,
    Combinator,
    Object,
    Array,
    Primitive,
    /// Unconstrained (`{}` or `true`)
    Any,
    /// The `false` schema
    Never,
}

// =============================================================================
// Schema Node
// =============================================================================

/// One schema object (or boolean schema) in a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    /// `Some` for boolean schemas
    pub boolean: Option<bool>,
    pub reference: Option<Reference>,
    /// `$schema`
    pub schema_uri: Option<String>,
    /// `$id` (`id` in draft 4) as written
    pub id: Option<String>,
    /// `$anchor`
    pub anchor: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub types: Option<TypeSet>,
    pub format: Option<String>,
    pub properties: IndexMap<String, NodeId>,
    pub required: Vec<String>,
    pub items: Option<Items>,
    pub additional_properties: Option<AdditionalProperties>,
    pub pattern_properties: IndexMap<String, NodeId>,
    pub all_of: Vec<NodeId>,
    pub any_of: Vec<NodeId>,
    pub one_of: Vec<NodeId>,
    /// Single-schema applicators (`not`, `if`, `contains`, ...) by keyword
    pub applicators: IndexMap<String, NodeId>,
    /// Schema-map applicators other than properties (`dependentSchemas`)
    pub schema_maps: IndexMap<String, IndexMap<String, NodeId>>,
    pub enumeration: Option<Vec<Value>>,
    pub const_value: Option<Value>,
    /// `Some(Value::Null)` is an explicit `"default": null`
    pub default: Option<Value>,
    /// OpenAPI 3 `nullable`
    pub nullable: Option<bool>,
    pub discriminator: Option<Discriminator>,
    pub definitions: IndexMap<String, NodeId>,
    pub defs: IndexMap<String, NodeId>,
    /// Recognized keywords with no structural meaning, verbatim
    pub annotations: IndexMap<String, Value>,
    /// Keywords the dialect does not recognize, verbatim
    pub extension_data: IndexMap<String, Value>,
    /// Base URI in effect for this node (index into the arena's scope table)
    pub(crate) scope: usize,
}

impl SchemaNode {
    pub fn kind(&self) -> SchemaKind {
        if let Some(b) = self.boolean {
            return if b { SchemaKind::Any } else { SchemaKind::Never };
        }
        if self.reference.is_some() {
            return SchemaKind::Reference;
        }
        if !self.all_of.is_empty() || !self.any_of.is_empty() || !self.one_of.is_empty() {
            return SchemaKind::Combinator;
        }
        if let Some(types) = &self.types {
            let mut non_null = types.non_null();
            match (non_null.next(), non_null.next()) {
                (Some(JsonType::Object), None) => return SchemaKind::Object,
                (Some(JsonType::Array), None) => return SchemaKind::Array,
                (Some(_), None) => return SchemaKind::Primitive,
                _ => {}
            }
        }
        if !self.properties.is_empty() || self.additional_properties.is_some() {
            return SchemaKind::Object;
        }
        if self.items.is_some() {
            return SchemaKind::Array;
        }
        if self.enumeration.is_some() || self.const_value.is_some() {
            return SchemaKind::Primitive;
        }
        SchemaKind::Any
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Whether the node permits `null` on its own (type set or OpenAPI `nullable`)
    pub fn allows_null(&self) -> bool {
        self.types.as_ref().is_some_and(|t| t.allows_null()) || self.nullable == Some(true)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Recognized annotation as a bool (`readOnly`, `deprecated`, ...)
    pub fn annotation_flag(&self, keyword: &str) -> bool {
        self.annotations.get(keyword).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Every child node id, in keyword order
    pub fn children(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        out.extend(self.properties.values().copied());
        match &self.items {
            Some(Items::Single(id)) => out.push(*id),
            Some(Items::Tuple(ids)) => out.extend(ids.iter().copied()),
            None => {}
        }
        if let Some(AdditionalProperties::Schema(id)) = &self.additional_properties {
            out.push(*id);
        }
        out.extend(self.pattern_properties.values().copied());
        out.extend(self.all_of.iter().copied());
        out.extend(self.any_of.iter().copied());
        out.extend(self.one_of.iter().copied());
        out.extend(self.applicators.values().copied());
        for map in self.schema_maps.values() {
            out.extend(map.values().copied());
        }
        out.extend(self.definitions.values().copied());
        out.extend(self.defs.values().copied());
        out
    }

    /// Apply `f` to every stored node id, including bound references
    pub(crate) fn for_each_id_mut(&mut self, mut f: impl FnMut(&mut NodeId)) {
        for id in self.properties.values_mut() {
            f(id);
        }
        match &mut self.items {
            Some(Items::Single(id)) => f(id),
            Some(Items::Tuple(ids)) => ids.iter_mut().for_each(&mut f),
            None => {}
        }
        if let Some(AdditionalProperties::Schema(id)) = &mut self.additional_properties {
            f(id);
        }
        self.pattern_properties.values_mut().for_each(&mut f);
        self.all_of.iter_mut().for_each(&mut f);
        self.any_of.iter_mut().for_each(&mut f);
        self.one_of.iter_mut().for_each(&mut f);
        self.applicators.values_mut().for_each(&mut f);
        for map in self.schema_maps.values_mut() {
            map.values_mut().for_each(&mut f);
        }
        self.definitions.values_mut().for_each(&mut f);
        self.defs.values_mut().for_each(&mut f);
        if let Some(Reference { target: Some(id), .. }) = &mut self.reference {
            f(id);
        }
        if let Some(disc) = &mut self.discriminator {
            for entry in disc.mapping.values_mut() {
                if let Some(id) = &mut entry.target {
                    f(id);
                }
            }
        }
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Owner of every node of one or more documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaArena {
    nodes: Vec<SchemaNode>,
    /// Base URIs referenced by `SchemaNode::scope`
    scopes: Vec<Url>,
}

impl SchemaArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: SchemaNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&SchemaNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SchemaNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut SchemaNode> {
        self.nodes.get_mut(id.0)
    }

    pub(crate) fn add_scope(&mut self, base: Url) -> usize {
        if let Some(pos) = self.scopes.iter().position(|s| *s == base) {
            return pos;
        }
        self.scopes.push(base);
        self.scopes.len() - 1
    }

    pub(crate) fn scope_url(&self, scope: usize) -> Option<&Url> {
        self.scopes.get(scope)
    }

    /// Base URI in effect at a node
    pub fn base_uri(&self, id: NodeId) -> Option<&Url> {
        self.get(id).and_then(|n| self.scopes.get(n.scope))
    }

    /// Move every node of `other` into this arena; returns the id offset
    pub(crate) fn absorb(&mut self, other: SchemaArena) -> usize {
        let offset = self.nodes.len();
        let scope_map: Vec<usize> = other
            .scopes
            .into_iter()
            .map(|s| self.add_scope(s))
            .collect();

        for mut node in other.nodes {
            node.for_each_id_mut(|id| id.0 += offset);
            node.scope = scope_map.get(node.scope).copied().unwrap_or(0);
            self.nodes.push(node);
        }
        offset
    }
}

impl std::ops::Index<NodeId> for SchemaArena {
    type Output = SchemaNode;

    fn index(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }
}

// =============================================================================
// Document
// =============================================================================

/// A parsed document: its arena, root node, and base URI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub base_uri: Url,
    pub dialect: SchemaDialect,
    pub arena: SchemaArena,
    pub root: NodeId,
    /// OpenAPI `components.schemas`
    pub components: IndexMap<String, NodeId>,
    /// Remaining `components` sections (responses, parameters, ...) verbatim
    pub components_extra: IndexMap<String, Value>,
}

impl Document {
    pub fn root_node(&self) -> &SchemaNode {
        &self.arena[self.root]
    }

    pub fn node(&self, id: NodeId) -> Option<&SchemaNode> {
        self.arena.get(id)
    }

    /// Named definitions in declaration order: `definitions`, `$defs`, then components
    pub fn named_definitions(&self) -> Vec<(String, NodeId)> {
        let root = self.root_node();
        root.definitions
            .iter()
            .chain(root.defs.iter())
            .chain(self.components.iter())
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Look up a definition by name across all definition maps
    pub fn definition(&self, name: &str) -> Option<NodeId> {
        let root = self.root_node();
        root.definitions
            .get(name)
            .or_else(|| root.defs.get(name))
            .or_else(|| self.components.get(name))
            .copied()
    }

    /// Ids of every reference placeholder in the document
    pub fn references(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.arena.iter().filter(|(_, n)| n.is_reference()).map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with_types(types: &[JsonType]) -> SchemaNode {
        SchemaNode {
            types: Some(TypeSet {
                types: types.to_vec(),
                as_array: types.len() > 1,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(node_with_types(&[JsonType::Object]).kind(), SchemaKind::Object);
        assert_eq!(
            node_with_types(&[JsonType::String, JsonType::Null]).kind(),
            SchemaKind::Primitive
        );
        assert_eq!(
            node_with_types(&[JsonType::String, JsonType::Integer]).kind(),
            SchemaKind::Any
        );
        assert_eq!(SchemaNode::default().kind(), SchemaKind::Any);

        let boolean = SchemaNode {
            boolean: Some(false),
            ..Default::default()
        };
        assert_eq!(boolean.kind(), SchemaKind::Never);
    }

    #[test]
    fn test_absorb_offsets_ids() {
        let base = Url::parse("file:///a.json").unwrap();
        let mut first = SchemaArena::new();
        let scope = first.add_scope(base.clone());
        first.alloc(SchemaNode {
            scope,
            ..Default::default()
        });

        let mut second = SchemaArena::new();
        second.add_scope(Url::parse("file:///b.json").unwrap());
        let leaf = second.alloc(SchemaNode::default());
        let mut parent = SchemaNode::default();
        parent.properties.insert("x".into(), leaf);
        second.alloc(parent);

        let offset = first.absorb(second);
        assert_eq!(offset, 1);
        assert_eq!(first[NodeId(2)].properties["x"], NodeId(1));
        assert_eq!(first.base_uri(NodeId(2)).unwrap().as_str(), "file:///b.json");
        assert_eq!(first.base_uri(NodeId(0)), Some(&base));
    }
}
