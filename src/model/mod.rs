//! Type Model
//!
//! Canonical, language-agnostic description of the types to generate:
//! - [`GeneratedType`]: a class, a discriminated-union interface, or an enum
//! - [`GeneratedProperty`]: name, [`TypeReference`], nullability, required flag
//! - [`TypeReference`]: a primitive, a generated type, or a container
//!
//! The model is rebuilt from a [`crate::resolve::ResolvedDocument`] on every
//! run and never refers back into the node graph except by `NodeId`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diagnostics::Diagnostics;
use crate::schema::NodeId;

mod builder;
mod merge;
mod names;
mod order;

pub use builder::build;
pub use names::NameRegistry;

// =============================================================================
// Identity
// =============================================================================

/// Index of a type within its [`TypeModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub(crate) usize);

impl TypeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// =============================================================================
// References
// =============================================================================

/// Scalar targets; formats are carried through for emitters that map them
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    String { format: Option<String> },
    Integer { format: Option<String> },
    Number { format: Option<String> },
    Boolean,
    Null,
    /// Open / unstructured value
    Any,
}

/// How a property or container element refers to its type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeReference {
    Primitive(PrimitiveType),
    Generated(TypeId),
    Array(Box<TypeReference>),
    Tuple(Vec<TypeReference>),
    /// String-keyed map
    Map(Box<TypeReference>),
    /// Nullable element inside a container (property nullability lives on the property)
    Nullable(Box<TypeReference>),
}

impl TypeReference {
    pub fn any() -> Self {
        Self::Primitive(PrimitiveType::Any)
    }

    pub fn string() -> Self {
        Self::Primitive(PrimitiveType::String { format: None })
    }

    pub fn integer() -> Self {
        Self::Primitive(PrimitiveType::Integer { format: None })
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Primitive(PrimitiveType::Any))
    }

    /// The reference with any outer `Nullable` removed
    pub fn non_null(&self) -> &TypeReference {
        match self {
            Self::Nullable(inner) => inner.non_null(),
            other => other,
        }
    }

    /// Generated types mentioned anywhere in this reference
    pub fn generated(&self) -> Vec<TypeId> {
        let mut out = Vec::new();
        self.collect_generated(&mut out);
        out
    }

    fn collect_generated(&self, out: &mut Vec<TypeId>) {
        match self {
            Self::Primitive(_) => {}
            Self::Generated(id) => out.push(*id),
            Self::Array(inner) | Self::Map(inner) | Self::Nullable(inner) => inner.collect_generated(out),
            Self::Tuple(items) => items.iter().for_each(|i| i.collect_generated(out)),
        }
    }

    /// The generated type referenced without a container in between
    pub fn direct(&self) -> Option<TypeId> {
        match self.non_null() {
            Self::Generated(id) => Some(*id),
            _ => None,
        }
    }

    pub(crate) fn remap(&mut self, f: &impl Fn(TypeId) -> Option<TypeId>) {
        match self {
            Self::Primitive(_) => {}
            Self::Generated(id) => match f(*id) {
                Some(new) => *id = new,
                None => *self = Self::any(),
            },
            Self::Array(inner) | Self::Map(inner) | Self::Nullable(inner) => inner.remap(f),
            Self::Tuple(items) => items.iter_mut().for_each(|i| i.remap(f)),
        }
    }
}

// =============================================================================
// Types
// =============================================================================

/// What a generated type is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    /// Discriminated union base (`oneOf`/`anyOf` + discriminator)
    Interface,
    Enum,
}

/// Per-property facts emitters turn into attributes, docs and renames
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyMetadata {
    pub json_name: String,
    pub required: bool,
    pub nullable: bool,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub read_only: bool,
    pub write_only: bool,
    pub deprecated: bool,
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedProperty {
    /// JSON property name
    pub name: String,
    pub type_ref: TypeReference,
    pub nullable: bool,
    pub required: bool,
    pub metadata: PropertyMetadata,
}

/// Discriminator on a union base or abstract base class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscriminatorInfo {
    pub property: String,
    /// Tag → concrete type, in mapping order (explicit entries first)
    pub mapping: Vec<(String, TypeId)>,
}

impl DiscriminatorInfo {
    pub fn tag_of(&self, id: TypeId) -> Option<&str> {
        self.mapping.iter().find(|(_, t)| *t == id).map(|(tag, _)| tag.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedType {
    pub id: TypeId,
    pub name: String,
    pub kind: TypeKind,
    pub source: NodeId,
    /// Absolute location of the source schema
    pub pointer: String,
    pub description: Option<String>,
    pub properties: Vec<GeneratedProperty>,
    pub base_types: Vec<TypeId>,
    pub discriminator: Option<DiscriminatorInfo>,
    /// Tag selecting this type in its union or base
    pub discriminator_value: Option<String>,
    /// Enum kind only: member values in declaration order
    pub enum_members: Vec<Value>,
    /// Typed catch-all for undeclared properties
    pub additional_properties: Option<TypeReference>,
    pub is_abstract: bool,
}

impl GeneratedType {
    pub fn property(&self, name: &str) -> Option<&GeneratedProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Every generated type this one depends on: bases, properties, catch-all, union members
    pub fn dependencies(&self) -> Vec<TypeId> {
        let mut out = self.base_types.clone();
        out.extend(self.field_dependencies());
        out.sort();
        out.dedup();
        out
    }

    /// Dependencies through properties, the catch-all and union members
    pub fn field_dependencies(&self) -> Vec<TypeId> {
        let mut out = Vec::new();
        for prop in &self.properties {
            out.extend(prop.type_ref.generated());
        }
        if let Some(extra) = &self.additional_properties {
            out.extend(extra.generated());
        }
        if self.kind == TypeKind::Interface {
            if let Some(disc) = &self.discriminator {
                out.extend(disc.mapping.iter().map(|(_, t)| *t));
            }
        }
        out.sort();
        out.dedup();
        out
    }
}

// =============================================================================
// Model
// =============================================================================

/// Every type generated from one resolved document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeModel {
    /// Indexed by `TypeId`
    pub types: Vec<GeneratedType>,
    /// Bases before derived, ties by first-seen id
    pub order: Vec<TypeId>,
    /// How the document root is typed
    pub root: Option<TypeReference>,
    pub diagnostics: Diagnostics,
}

impl TypeModel {
    pub fn get(&self, id: TypeId) -> Option<&GeneratedType> {
        self.types.get(id.0)
    }

    pub fn by_name(&self, name: &str) -> Option<&GeneratedType> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedType> {
        self.types.iter()
    }

    /// Types in `order`
    pub fn ordered(&self) -> impl Iterator<Item = &GeneratedType> {
        self.order.iter().filter_map(|id| self.get(*id))
    }

    /// Referenced-before-referrer order; members of one reference cycle stay adjacent
    pub fn dependency_order(&self) -> Vec<TypeId> {
        order::dependency_order(&self.types)
    }

    /// Groups of mutually (or self) referencing types
    pub fn cycle_groups(&self) -> Vec<Vec<TypeId>> {
        order::cycle_groups(&self.types)
    }

    /// Cycle group containing `id`, if any
    pub fn cycle_group_of(&self, id: TypeId) -> Option<Vec<TypeId>> {
        self.cycle_groups().into_iter().find(|g| g.contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_helpers() {
        let r = TypeReference::Array(Box::new(TypeReference::Nullable(Box::new(
            TypeReference::Generated(TypeId(3)),
        ))));
        assert_eq!(r.generated(), vec![TypeId(3)]);
        assert_eq!(r.direct(), None);

        let n = TypeReference::Nullable(Box::new(TypeReference::Generated(TypeId(1))));
        assert_eq!(n.direct(), Some(TypeId(1)));
    }

    #[test]
    fn test_remap_drops_missing_to_any() {
        let mut r = TypeReference::Map(Box::new(TypeReference::Generated(TypeId(2))));
        r.remap(&|id| if id.0 == 2 { None } else { Some(id) });
        assert_eq!(r, TypeReference::Map(Box::new(TypeReference::any())));
    }
}
