//! Type Model Builder
//!
//! Turns a resolved node graph into a [`TypeModel`]. Runs in three steps:
//! 1. Claim: named definitions of the primary document, then the root,
//!    allocate their types so they own their names before anything synthesized
//! 2. Drain: a FIFO worklist fills each type's body; references to other
//!    type-worthy nodes allocate (and enqueue) those types on first sight
//! 3. Finish: discriminator tags and union bases, inherited re-declaration
//!    checks, removal of failed types, inheritance ordering
//!
//! Types are keyed by canonical `NodeId`, so every use site of one schema
//! maps to one type and reference cycles need no special handling.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::Value;

use super::merge::{merge_into, unify, Conflict, PropertyDraft, TypeFacts};
use super::names::NameRegistry;
use super::order;
use super::{
    DiscriminatorInfo, GeneratedProperty, GeneratedType, PrimitiveType, PropertyMetadata, TypeId, TypeKind,
    TypeModel, TypeReference,
};
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::{BuildError, BuildErrorKind, BuildErrors};
use crate::naming::to_pascal_case;
use crate::resolve::ResolvedDocument;
use crate::schema::serialize::node_to_value;
use crate::schema::{AdditionalProperties, Items, JsonType, NodeId, SchemaArena, SchemaNode};
use crate::settings::{AllOfStrategy, GenerationSettings};

/// Build the type model for the primary document of `resolved`
pub fn build(resolved: &ResolvedDocument, settings: &GenerationSettings) -> Result<TypeModel, BuildErrors> {
    let mut builder = Builder::new(resolved, settings);
    builder.claim();
    builder.drain();
    builder.finish()
}

// =============================================================================
// Shapes
// =============================================================================

/// What a canonical node turns into
#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Any,
    Primitive(PrimitiveType),
    Array(Option<NodeId>),
    Tuple(Vec<NodeId>),
    Map(NodeId),
    /// Properties (or `type: object`): a class
    Object,
    /// `allOf` composing at least one object: a class
    Composition,
    /// Typed as another node
    Alias(NodeId),
    /// Typed as another node, nullable (`oneOf: [X, null]`)
    NullableAlias(NodeId),
    Enum(Vec<Value>),
    /// `oneOf`/`anyOf` with a discriminator: an interface
    Union,
}

impl Shape {
    fn is_type(&self) -> bool {
        matches!(self, Self::Object | Self::Composition | Self::Enum(_) | Self::Union)
    }
}

/// Read-only view of types under construction for the merge rules
struct Slots<'s> {
    types: &'s [GeneratedType],
    doc: &'s ResolvedDocument,
    by_node: &'s HashMap<NodeId, TypeId>,
}

impl Slots<'_> {
    fn class_node(&self, id: TypeId) -> Option<NodeId> {
        self.types.get(id.0).filter(|t| t.kind == TypeKind::Class)?;
        self.by_node.iter().find(|(_, t)| **t == id).map(|(n, _)| *n)
    }

    fn same_schema(&self, a: NodeId, b: NodeId) -> bool {
        let (a, b) = (self.doc.canonical(a), self.doc.canonical(b));
        let dialect = self.doc.primary().dialect;
        a == b || node_to_value(self.doc.arena(), a, dialect) == node_to_value(self.doc.arena(), b, dialect)
    }
}

impl TypeFacts for Slots<'_> {
    fn enum_members(&self, id: TypeId) -> Option<&[Value]> {
        self.types
            .get(id.0)
            .filter(|t| t.kind == TypeKind::Enum)
            .map(|t| t.enum_members.as_slice())
    }

    fn type_name(&self, id: TypeId) -> String {
        self.types.get(id.0).map(|t| t.name.clone()).unwrap_or_else(|| id.to_string())
    }

    fn refines(&self, sub: TypeId, sup: TypeId) -> bool {
        let (Some(sub), Some(sup)) = (self.class_node(sub), self.class_node(sup)) else {
            return false;
        };
        let narrow = Flattened::of(self.doc, sub);
        if narrow.ancestors.contains(&sup) {
            return true;
        }
        let wide = Flattened::of(self.doc, sup);
        wide.required.is_subset(&narrow.required)
            && wide.properties.iter().all(|(name, child)| {
                narrow
                    .properties
                    .get(name)
                    .is_some_and(|other| self.same_schema(*child, *other))
            })
    }
}

/// Properties, required names and `allOf` ancestors of a node, through
/// every level of composition
#[derive(Default)]
struct Flattened {
    properties: HashMap<String, NodeId>,
    required: HashSet<String>,
    ancestors: HashSet<NodeId>,
}

impl Flattened {
    fn of(doc: &ResolvedDocument, id: NodeId) -> Self {
        let mut out = Self::default();
        out.collect(doc, id, &mut HashSet::new());
        out
    }

    fn collect(&mut self, doc: &ResolvedDocument, id: NodeId, seen: &mut HashSet<NodeId>) {
        let id = doc.canonical(id);
        if !seen.insert(id) {
            return;
        }
        let Some(node) = doc.node(id) else { return };
        for member in &node.all_of {
            let member = doc.canonical(*member);
            self.ancestors.insert(member);
            self.collect(doc, member, seen);
        }
        for (name, child) in &node.properties {
            self.properties.entry(name.clone()).or_insert(*child);
        }
        self.required.extend(node.required.iter().cloned());
    }
}

// =============================================================================
// Builder
// =============================================================================

struct Builder<'a> {
    doc: &'a ResolvedDocument,
    arena: &'a SchemaArena,
    settings: &'a GenerationSettings,
    names: NameRegistry,
    diagnostics: Diagnostics,
    slots: Vec<GeneratedType>,
    by_node: HashMap<NodeId, TypeId>,
    definition_names: HashMap<NodeId, String>,
    queue: VecDeque<TypeId>,
    errors: Vec<BuildError>,
    failed: HashSet<TypeId>,
    warned: HashSet<(NodeId, &'static str)>,
    /// (member, tag, union or base)
    tags: Vec<(TypeId, String, TypeId)>,
    root: Option<TypeReference>,
}

impl<'a> Builder<'a> {
    fn new(doc: &'a ResolvedDocument, settings: &'a GenerationSettings) -> Self {
        let arena = doc.arena();

        // Primary document first so its names win over external ones.
        let primary = doc.primary();
        let entries = std::iter::once(primary)
            .chain(doc.documents().iter().filter(|d| d.uri != primary.uri))
            .flat_map(|d| d.named_definitions(arena))
            .collect::<Vec<_>>();

        let mut definition_names = HashMap::new();
        for (name, id) in &entries {
            if !arena.get(*id).is_some_and(SchemaNode::is_reference) {
                definition_names.entry(*id).or_insert_with(|| name.clone());
            }
        }
        for (name, id) in &entries {
            definition_names.entry(doc.canonical(*id)).or_insert_with(|| name.clone());
        }
        // Titled roots of referenced documents are named like definitions.
        for entry in doc.documents().iter().filter(|d| d.uri != primary.uri) {
            let root = doc.canonical(entry.root);
            if let Some(title) = arena.get(root).and_then(|n| n.title.clone()) {
                definition_names.entry(root).or_insert(title);
            }
        }

        Self {
            doc,
            arena,
            settings,
            names: NameRegistry::new(),
            diagnostics: Diagnostics::new(),
            slots: Vec::new(),
            by_node: HashMap::new(),
            definition_names,
            queue: VecDeque::new(),
            errors: Vec::new(),
            failed: HashSet::new(),
            warned: HashSet::new(),
            tags: Vec::new(),
            root: None,
        }
    }

    fn facts(&self) -> Slots<'_> {
        Slots {
            types: &self.slots,
            doc: self.doc,
            by_node: &self.by_node,
        }
    }

    fn canonical(&self, id: NodeId) -> NodeId {
        self.doc.canonical(id)
    }

    fn node(&self, id: NodeId) -> &'a SchemaNode {
        let arena = self.arena;
        &arena[id]
    }

    fn warn_once(&mut self, node: NodeId, code: DiagnosticCode, message: impl Into<String>) {
        if self.warned.insert((node, code.as_str())) {
            let location = self.doc.location(node).to_string();
            self.diagnostics.warning(location, code, message);
        }
    }

    // -------------------------------------------------------------------------
    // Step 1: claim
    // -------------------------------------------------------------------------

    fn claim(&mut self) {
        let definitions = self.doc.primary().named_definitions(self.arena);

        // Concrete definitions first; aliases only claim targets nobody named.
        for (name, id) in &definitions {
            if self.canonical(*id) == *id && self.shape(*id).is_type() {
                self.type_for(*id, name);
            }
        }
        for (name, id) in &definitions {
            let target = self.canonical(*id);
            if target != *id && self.shape(target).is_type() {
                self.type_for(target, name);
            }
        }

        let root = self.doc.root();
        let hint = self.root_name(root);
        let (reference, nullable) = self.reference_for(root, &hint);
        self.root = Some(wrap_nullable(reference, nullable));
    }

    fn root_name(&self, root: NodeId) -> String {
        if let Some(hint) = &self.settings.type_name_generation_hint {
            return hint.clone();
        }
        if let Some(title) = &self.node(self.canonical(root)).title {
            return title.clone();
        }
        let uri = &self.doc.primary().uri;
        uri.path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(|file| file.split('.').next().unwrap_or(file).to_string())
            .filter(|stem| !to_pascal_case(stem).is_empty())
            .unwrap_or_else(|| "Root".to_string())
    }

    /// Type for a canonical, type-worthy node, allocating it on first sight
    fn type_for(&mut self, node: NodeId, hint: &str) -> TypeId {
        if let Some(id) = self.by_node.get(&node) {
            return *id;
        }

        let id = TypeId(self.slots.len());
        let location = self.doc.location(node).to_string();
        let raw = self
            .definition_names
            .get(&node)
            .cloned()
            .unwrap_or_else(|| hint.to_string());
        let name = match self.names.claim(&raw, &location, &mut self.diagnostics) {
            Ok(name) => name,
            Err(kind) => {
                self.fail(id, &raw, &location, kind);
                raw.clone()
            }
        };

        let shape = self.shape(node);
        let kind = match &shape {
            Shape::Enum(_) => TypeKind::Enum,
            Shape::Union => TypeKind::Interface,
            _ => TypeKind::Class,
        };
        let enum_members = match shape {
            Shape::Enum(values) => values,
            _ => Vec::new(),
        };

        tracing::debug!(type_name = %name, location = %location, "type allocated");

        self.slots.push(GeneratedType {
            id,
            name,
            kind,
            source: node,
            pointer: location,
            description: self.node(node).description.clone(),
            properties: Vec::new(),
            base_types: Vec::new(),
            discriminator: None,
            discriminator_value: None,
            enum_members,
            additional_properties: None,
            is_abstract: false,
        });
        self.by_node.insert(node, id);
        if kind != TypeKind::Enum {
            self.queue.push_back(id);
        }
        id
    }

    fn fail(&mut self, id: TypeId, type_name: &str, pointer: &str, kind: BuildErrorKind) {
        self.errors.push(BuildError {
            type_name: type_name.to_string(),
            pointer: pointer.to_string(),
            kind,
        });
        self.failed.insert(id);
    }

    // -------------------------------------------------------------------------
    // Classification
    // -------------------------------------------------------------------------

    fn shape(&mut self, c: NodeId) -> Shape {
        let Some(n) = self.arena.get(c) else {
            return Shape::Any;
        };
        if n.boolean.is_some() {
            return Shape::Any;
        }

        if let Some(values) = &n.enumeration {
            let non_null: Vec<Value> = values.iter().filter(|v| !v.is_null()).cloned().collect();
            if non_null.is_empty() {
                return Shape::Primitive(PrimitiveType::Null);
            }
            if non_null.iter().all(Value::is_string) || non_null.iter().all(|v| v.is_i64() || v.is_u64()) {
                return Shape::Enum(non_null);
            }
            self.warn_once(c, DiagnosticCode::MixedEnum, "enum mixes value types; using open type");
            return Shape::Any;
        }
        if let Some(value) = &n.const_value {
            return Shape::Primitive(primitive_of_value(value, n.format.clone()));
        }

        let union = if n.one_of.is_empty() { &n.any_of } else { &n.one_of };
        if !union.is_empty() && n.discriminator.is_some() {
            return Shape::Union;
        }
        if !n.all_of.is_empty() {
            if self.composes_object(c, &mut HashSet::new()) {
                return Shape::Composition;
            }
            return Shape::Alias(n.all_of[0]);
        }
        if !union.is_empty() {
            return self.union_shape(c, union);
        }

        if let Some(types) = &n.types {
            let non_null: Vec<JsonType> = types.non_null().collect();
            return match non_null.as_slice() {
                [] => Shape::Primitive(PrimitiveType::Null),
                [single] => typed_shape(n, *single),
                _ => {
                    self.warn_once(
                        c,
                        DiagnosticCode::MultipleTypes,
                        "multiple non-null types declared; using open type",
                    );
                    Shape::Any
                }
            };
        }

        if !n.properties.is_empty() {
            return Shape::Object;
        }
        if let Some(AdditionalProperties::Schema(value)) = &n.additional_properties {
            return Shape::Map(*value);
        }
        match &n.items {
            Some(items) => array_shape(items),
            None => Shape::Any,
        }
    }

    /// Whether an `allOf` node (or anything it composes) describes an object
    fn composes_object(&self, c: NodeId, visiting: &mut HashSet<NodeId>) -> bool {
        if !visiting.insert(c) {
            return false;
        }
        let n = self.node(c);
        if !n.properties.is_empty()
            || n.types.as_ref().is_some_and(|t| t.contains(JsonType::Object))
            || matches!(n.additional_properties, Some(AdditionalProperties::Schema(_)))
            || (n.discriminator.is_some() && n.one_of.is_empty() && n.any_of.is_empty())
        {
            return true;
        }
        n.all_of
            .iter()
            .any(|member| self.composes_object(self.canonical(*member), visiting))
    }

    fn union_shape(&mut self, c: NodeId, members: &[NodeId]) -> Shape {
        let canon: Vec<NodeId> = members.iter().map(|m| self.canonical(*m)).collect();
        let non_null: Vec<NodeId> = canon.iter().copied().filter(|m| !self.is_null_schema(*m)).collect();
        let has_null = non_null.len() < canon.len();

        match non_null.as_slice() {
            [] => return Shape::Primitive(PrimitiveType::Null),
            [single] if has_null => return Shape::NullableAlias(*single),
            [single] => return Shape::Alias(*single),
            _ => {}
        }

        let mut values: Vec<Value> = Vec::new();
        let mut all_strings = true;
        for member in &non_null {
            let mn = self.node(*member);
            match (&mn.const_value, &mn.enumeration) {
                (Some(v @ Value::String(_)), _) => values.push(v.clone()),
                (None, Some(vals)) if vals.iter().all(Value::is_string) => values.extend(vals.iter().cloned()),
                _ => {
                    all_strings = false;
                    break;
                }
            }
        }
        if all_strings && !values.is_empty() {
            let mut seen = Vec::new();
            values.retain(|v| {
                let fresh = !seen.contains(v);
                if fresh {
                    seen.push(v.clone());
                }
                fresh
            });
            return Shape::Enum(values);
        }

        if !self.node(c).properties.is_empty() {
            self.warn_once(
                c,
                DiagnosticCode::UntaggedUnion,
                "union has no discriminator; type built from its properties only",
            );
            return Shape::Object;
        }
        self.warn_once(c, DiagnosticCode::UntaggedUnion, "union has no discriminator; using open type");
        Shape::Any
    }

    fn is_null_schema(&self, c: NodeId) -> bool {
        let n = self.node(c);
        let null_type = n
            .types
            .as_ref()
            .is_some_and(|t| t.allows_null() && t.non_null().next().is_none());
        let null_enum = n
            .enumeration
            .as_ref()
            .is_some_and(|vals| !vals.is_empty() && vals.iter().all(Value::is_null));
        null_type || null_enum || n.const_value == Some(Value::Null)
    }

    /// The node itself admits `null`
    fn node_nullable(&self, c: NodeId) -> bool {
        let n = self.node(c);
        if n.allows_null() {
            return true;
        }
        if n.enumeration.as_ref().is_some_and(|vals| vals.iter().any(Value::is_null)) {
            return true;
        }
        let union = if n.one_of.is_empty() { &n.any_of } else { &n.one_of };
        union.iter().any(|m| self.is_null_schema(self.canonical(*m)))
    }

    // -------------------------------------------------------------------------
    // References
    // -------------------------------------------------------------------------

    /// How `id` is typed at a use site, and whether it admits `null`
    fn reference_for(&mut self, id: NodeId, hint: &str) -> (TypeReference, bool) {
        self.reference_inner(id, hint, &mut HashSet::new())
    }

    fn reference_inner(&mut self, id: NodeId, hint: &str, visiting: &mut HashSet<NodeId>) -> (TypeReference, bool) {
        let c = self.canonical(id);
        if !visiting.insert(c) {
            return (TypeReference::any(), false);
        }

        let nullable = self.node_nullable(c);
        let result = match self.shape(c) {
            Shape::Any => (TypeReference::any(), nullable),
            Shape::Primitive(PrimitiveType::Null) => (TypeReference::Primitive(PrimitiveType::Null), true),
            Shape::Primitive(p) => (TypeReference::Primitive(p), nullable),
            Shape::Array(Some(items)) => {
                let inner = self.nested(items, &format!("{}Item", hint), visiting);
                (TypeReference::Array(Box::new(inner)), nullable)
            }
            Shape::Array(None) => (TypeReference::Array(Box::new(TypeReference::any())), nullable),
            Shape::Tuple(items) => {
                let mut refs = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    refs.push(self.nested(*item, &format!("{}Item{}", hint, i + 1), visiting));
                }
                (TypeReference::Tuple(refs), nullable)
            }
            Shape::Map(value) => {
                let inner = self.nested(value, &format!("{}Value", hint), visiting);
                (TypeReference::Map(Box::new(inner)), nullable)
            }
            Shape::Alias(target) => {
                let (reference, inner_nullable) = self.reference_inner(target, hint, visiting);
                (reference, inner_nullable || nullable)
            }
            Shape::NullableAlias(target) => {
                let (reference, _) = self.reference_inner(target, hint, visiting);
                (reference, true)
            }
            Shape::Object | Shape::Composition | Shape::Enum(_) | Shape::Union => {
                (TypeReference::Generated(self.type_for(c, hint)), nullable)
            }
        };

        visiting.remove(&c);
        result
    }

    /// Reference in a container position, nullability folded in
    fn nested(&mut self, id: NodeId, hint: &str, visiting: &mut HashSet<NodeId>) -> TypeReference {
        let (reference, nullable) = self.reference_inner(id, hint, visiting);
        wrap_nullable(reference, nullable)
    }

    // -------------------------------------------------------------------------
    // Step 2: drain
    // -------------------------------------------------------------------------

    fn drain(&mut self) {
        while let Some(id) = self.queue.pop_front() {
            if self.failed.contains(&id) {
                continue;
            }
            let source = self.slots[id.0].source;
            let name = self.slots[id.0].name.clone();

            let result = match self.shape(source) {
                Shape::Union => {
                    self.fill_union(id, source, &name);
                    Ok(())
                }
                Shape::Composition => self.fill_composition(id, source, &name),
                _ => self.fill_object(id, source, &name),
            };

            if let Err(kind) = result {
                let pointer = self.slots[id.0].pointer.clone();
                self.fail(id, &name, &pointer, kind);
            }
        }
    }

    fn fill_object(&mut self, id: TypeId, c: NodeId, name: &str) -> Result<(), BuildErrorKind> {
        let mut drafts = Vec::new();
        self.collect_own(c, name, &mut drafts)?;
        let additional = self.additional(c, name);

        let properties = self.finalize(drafts, &[]);
        let ty = &mut self.slots[id.0];
        ty.properties = properties;
        ty.additional_properties = additional;
        self.attach_discriminator(id, c);
        Ok(())
    }

    fn fill_composition(&mut self, id: TypeId, c: NodeId, name: &str) -> Result<(), BuildErrorKind> {
        let mut drafts = Vec::new();
        let mut required: Vec<String> = Vec::new();
        let mut additional = None;
        let mut bases = Vec::new();

        match self.settings.all_of_strategy {
            AllOfStrategy::Inheritance => {
                let node = self.node(c);
                for (i, member) in node.all_of.iter().enumerate() {
                    let m = self.canonical(*member);
                    if self.is_base_candidate(m) {
                        let base = self.type_for(m, &format!("{}Base{}", name, i + 1));
                        if !bases.contains(&base) {
                            bases.push(base);
                        }
                    } else if self.is_object_like(m) {
                        self.flatten_into(m, name, &mut drafts, &mut required, &mut additional, &mut HashSet::new())?;
                    } else {
                        self.warn_once(
                            m,
                            DiagnosticCode::UnsupportedAllOfMember,
                            "allOf member is not an object schema; ignored",
                        );
                    }
                }
                self.collect_own(c, name, &mut drafts)?;
                required.extend(node.required.iter().cloned());
                if additional.is_none() {
                    additional = self.additional(c, name);
                }
            }
            AllOfStrategy::Merge => {
                self.flatten_into(c, name, &mut drafts, &mut required, &mut additional, &mut HashSet::new())?;
            }
        }

        let properties = self.finalize(drafts, &required);
        let ty = &mut self.slots[id.0];
        ty.properties = properties;
        ty.base_types = bases;
        ty.additional_properties = additional;
        self.attach_discriminator(id, c);
        Ok(())
    }

    /// Members (recursively) then own properties of `c`, merged in order
    fn flatten_into(
        &mut self,
        c: NodeId,
        owner: &str,
        drafts: &mut Vec<PropertyDraft>,
        required: &mut Vec<String>,
        additional: &mut Option<TypeReference>,
        visited: &mut HashSet<NodeId>,
    ) -> Result<(), BuildErrorKind> {
        if !visited.insert(c) {
            return Ok(());
        }
        let node = self.node(c);
        for member in &node.all_of {
            let m = self.canonical(*member);
            if self.is_object_like(m) {
                self.flatten_into(m, owner, drafts, required, additional, visited)?;
            } else {
                self.warn_once(
                    m,
                    DiagnosticCode::UnsupportedAllOfMember,
                    "allOf member is not an object schema; ignored",
                );
            }
        }
        self.collect_own(c, owner, drafts)?;
        required.extend(node.required.iter().cloned());
        if additional.is_none() {
            *additional = self.additional(c, owner);
        }
        Ok(())
    }

    fn is_base_candidate(&mut self, m: NodeId) -> bool {
        self.definition_names.contains_key(&m) && matches!(self.shape(m), Shape::Object | Shape::Composition)
    }

    fn is_object_like(&mut self, m: NodeId) -> bool {
        matches!(self.shape(m), Shape::Object | Shape::Composition | Shape::Map(_))
    }

    fn collect_own(&mut self, c: NodeId, owner: &str, drafts: &mut Vec<PropertyDraft>) -> Result<(), BuildErrorKind> {
        let node = self.node(c);
        for (name, child) in &node.properties {
            let draft = self.draft(name, *child, node.is_required(name), owner);
            merge_into(drafts, draft, &self.facts()).map_err(|(property, conflict)| incompatible(property, conflict))?;
        }
        Ok(())
    }

    fn draft(&mut self, name: &str, child: NodeId, required: bool, owner: &str) -> PropertyDraft {
        let hint = format!("{}{}", owner, to_pascal_case(name));
        let (type_ref, type_nullable) = self.reference_for(child, &hint);

        let own = self.node(child);
        let target = self.node(self.canonical(child));
        let flag = |keyword: &str| own.annotation_flag(keyword) || target.annotation_flag(keyword);

        let metadata = PropertyMetadata {
            json_name: name.to_string(),
            required,
            nullable: false,
            description: own.description.clone().or_else(|| target.description.clone()),
            default: own.default.clone().or_else(|| target.default.clone()),
            read_only: flag("readOnly"),
            write_only: flag("writeOnly"),
            deprecated: flag("deprecated"),
            format: own.format.clone().or_else(|| target.format.clone()),
        };

        PropertyDraft {
            property: GeneratedProperty {
                name: name.to_string(),
                type_ref,
                nullable: false,
                required,
                metadata,
            },
            type_nullable,
        }
    }

    fn additional(&mut self, c: NodeId, owner: &str) -> Option<TypeReference> {
        match &self.node(c).additional_properties {
            Some(AdditionalProperties::Schema(value)) => {
                Some(self.nested(*value, &format!("{}Value", owner), &mut HashSet::new()))
            }
            _ => None,
        }
    }

    /// Final nullability: the schema admits null, the property is optional,
    /// or (when enabled) its default is null. `metadata.nullable` keeps only
    /// what the schema says, so emitters can tell missing from null.
    fn finalize(&self, drafts: Vec<PropertyDraft>, required: &[String]) -> Vec<GeneratedProperty> {
        drafts
            .into_iter()
            .map(|draft| {
                let mut property = draft.property;
                property.required |= required.contains(&property.name);
                let default_null = property.metadata.default == Some(Value::Null);
                let schema_nullable = draft.type_nullable || (self.settings.null_default_is_nullable && default_null);
                property.nullable = schema_nullable || !property.required;
                property.metadata.required = property.required;
                property.metadata.nullable = schema_nullable;
                property
            })
            .collect()
    }

    /// A base schema carrying a discriminator: abstract, tags its mapping targets
    fn attach_discriminator(&mut self, id: TypeId, c: NodeId) {
        let Some(disc) = &self.node(c).discriminator else { return };

        let mut mapping: Vec<(String, TypeId)> = Vec::new();
        for (tag, entry) in &disc.mapping {
            let Some(target) = entry.target.map(|t| self.canonical(t)) else { continue };
            if !self.shape(target).is_type() {
                self.warn_once(
                    target,
                    DiagnosticCode::DiscriminatorTargetOutsideUnion,
                    format!("mapping '{}' does not name an object schema", tag),
                );
                continue;
            }
            let member = self.type_for(target, &to_pascal_case(tag));
            self.push_mapping(&mut mapping, tag, member, c);
        }

        for (tag, member) in &mapping {
            self.tags.push((*member, tag.clone(), id));
        }
        let ty = &mut self.slots[id.0];
        ty.discriminator = Some(DiscriminatorInfo {
            property: disc.property_name.clone(),
            mapping,
        });
        ty.is_abstract = true;
    }

    fn fill_union(&mut self, id: TypeId, c: NodeId, name: &str) {
        let node = self.node(c);
        let Some(disc) = &node.discriminator else { return };
        let members = if node.one_of.is_empty() { &node.any_of } else { &node.one_of };
        let canon: Vec<NodeId> = members.iter().map(|m| self.canonical(*m)).collect();

        let mut mapping: Vec<(String, TypeId)> = Vec::new();
        for (tag, entry) in &disc.mapping {
            let Some(target) = entry.target.map(|t| self.canonical(t)) else { continue };
            if !canon.contains(&target) {
                self.warn_once(
                    target,
                    DiagnosticCode::DiscriminatorTargetOutsideUnion,
                    format!("mapping '{}' targets a schema that is not a member of the union", tag),
                );
            }
            if !self.shape(target).is_type() {
                continue;
            }
            let member = self.type_for(target, &format!("{}{}", name, to_pascal_case(tag)));
            self.push_mapping(&mut mapping, tag, member, c);
        }

        // Members the mapping does not mention are tagged by their definition name.
        for (i, member) in canon.iter().enumerate() {
            if !self.shape(*member).is_type() {
                self.warn_once(
                    *member,
                    DiagnosticCode::UntaggedUnion,
                    "union member is not an object schema and cannot carry a discriminator; skipped",
                );
                continue;
            }
            let hint = match &self.node(*member).title {
                Some(title) => format!("{}{}", name, title),
                None => format!("{}Variant{}", name, i + 1),
            };
            let ty = self.type_for(*member, &hint);
            if mapping.iter().any(|(_, t)| *t == ty) {
                continue;
            }
            let tag = self
                .definition_names
                .get(member)
                .cloned()
                .unwrap_or_else(|| self.slots[ty.0].name.clone());
            mapping.push((tag, ty));
        }

        for (tag, member) in &mapping {
            self.tags.push((*member, tag.clone(), id));
        }
        self.slots[id.0].discriminator = Some(DiscriminatorInfo {
            property: disc.property_name.clone(),
            mapping,
        });
    }

    fn push_mapping(&mut self, mapping: &mut Vec<(String, TypeId)>, tag: &str, member: TypeId, owner: NodeId) {
        if let Some((first, _)) = mapping.iter().find(|(_, t)| *t == member) {
            let message = format!(
                "mapping '{}' targets the same type as '{}'; keeping '{}'",
                tag, first, first
            );
            self.warn_once(owner, DiagnosticCode::DuplicateDiscriminatorTarget, message);
            return;
        }
        mapping.push((tag.to_string(), member));
    }

    // -------------------------------------------------------------------------
    // Step 3: finish
    // -------------------------------------------------------------------------

    fn finish(mut self) -> Result<TypeModel, BuildErrors> {
        self.apply_tags();
        self.tag_implicit_subtypes();
        self.check_inheritance_cycles();
        self.check_inherited_redeclarations();

        let mut types = std::mem::take(&mut self.slots);
        let mut root = self.root.take();
        if !self.failed.is_empty() {
            compact(&mut types, &mut root, &self.failed);
        }
        let order = order::inheritance_order(&types).unwrap_or_else(|_| types.iter().map(|t| t.id).collect());

        tracing::info!(
            types = types.len(),
            warnings = self.diagnostics.warning_count(),
            errors = self.errors.len(),
            "type model built"
        );

        let model = TypeModel {
            types,
            order,
            root,
            diagnostics: self.diagnostics,
        };
        if self.errors.is_empty() {
            Ok(model)
        } else {
            Err(BuildErrors {
                errors: self.errors,
                partial: Box::new(model),
            })
        }
    }

    /// Mapping targets gain their tag and the union as a base
    fn apply_tags(&mut self) {
        for (member, tag, owner) in std::mem::take(&mut self.tags) {
            if member == owner {
                continue;
            }
            let gains_base = match self.slots[owner.0].kind {
                TypeKind::Interface => true,
                _ => self.settings.all_of_strategy == AllOfStrategy::Inheritance,
            };
            let ty = &mut self.slots[member.0];
            if ty.discriminator_value.is_none() {
                ty.discriminator_value = Some(tag);
            }
            if gains_base && !ty.base_types.contains(&owner) {
                ty.base_types.push(owner);
            }
        }
    }

    /// Subtypes of an abstract base that its mapping does not list
    fn tag_implicit_subtypes(&mut self) {
        let mut additions = Vec::new();
        for ty in &self.slots {
            if ty.discriminator_value.is_some() || ty.kind != TypeKind::Class {
                continue;
            }
            let base = ty.base_types.iter().copied().find(|b| {
                let base = &self.slots[b.0];
                base.kind == TypeKind::Class && base.discriminator.is_some()
            });
            if let Some(base) = base {
                let tag = self
                    .definition_names
                    .get(&ty.source)
                    .cloned()
                    .unwrap_or_else(|| ty.name.clone());
                additions.push((ty.id, base, tag));
            }
        }
        for (id, base, tag) in additions {
            self.slots[id.0].discriminator_value = Some(tag.clone());
            if let Some(disc) = self.slots[base.0].discriminator.as_mut() {
                disc.mapping.push((tag, id));
            }
        }
    }

    fn check_inheritance_cycles(&mut self) {
        let Err(cyclic) = order::inheritance_order(&self.slots) else { return };
        let via = cyclic
            .iter()
            .map(|id| self.slots[id.0].name.clone())
            .collect::<Vec<_>>()
            .join(" -> ");
        for id in cyclic {
            let ty = &self.slots[id.0];
            let (name, pointer) = (ty.name.clone(), ty.pointer.clone());
            self.fail(id, &name, &pointer, BuildErrorKind::CircularInheritance { via: via.clone() });
        }
    }

    /// An own property re-declaring an inherited one is dropped when compatible
    fn check_inherited_redeclarations(&mut self) {
        let mut failures = Vec::new();
        let mut drops: Vec<(TypeId, Vec<String>)> = Vec::new();

        for ty in &self.slots {
            if ty.base_types.is_empty() || self.failed.contains(&ty.id) {
                continue;
            }
            let inherited = inherited_properties(&self.slots, ty.id);
            let mut dropped = Vec::new();
            for own in &ty.properties {
                let Some(base_prop) = inherited.iter().find(|p| p.name == own.name) else { continue };
                match unify(&base_prop.type_ref, &own.type_ref, &self.facts()) {
                    Ok(_) => dropped.push(own.name.clone()),
                    Err(conflict) => {
                        failures.push((ty.id, incompatible(own.name.clone(), conflict)));
                        break;
                    }
                }
            }
            if !dropped.is_empty() {
                drops.push((ty.id, dropped));
            }
        }

        for (id, names) in drops {
            self.slots[id.0].properties.retain(|p| !names.contains(&p.name));
        }
        for (id, kind) in failures {
            let ty = &self.slots[id.0];
            let (name, pointer) = (ty.name.clone(), ty.pointer.clone());
            self.fail(id, &name, &pointer, kind);
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn incompatible(property: String, conflict: Conflict) -> BuildErrorKind {
    BuildErrorKind::IncompatibleMerge {
        property,
        left: conflict.left,
        right: conflict.right,
    }
}

fn wrap_nullable(reference: TypeReference, nullable: bool) -> TypeReference {
    let is_null = matches!(reference, TypeReference::Primitive(PrimitiveType::Null));
    if nullable && !is_null && !matches!(reference, TypeReference::Nullable(_)) {
        TypeReference::Nullable(Box::new(reference))
    } else {
        reference
    }
}

fn typed_shape(n: &SchemaNode, ty: JsonType) -> Shape {
    let format = n.format.clone();
    match ty {
        JsonType::Object => match &n.additional_properties {
            Some(AdditionalProperties::Schema(value)) if n.properties.is_empty() => Shape::Map(*value),
            _ => Shape::Object,
        },
        JsonType::Array => match &n.items {
            Some(items) => array_shape(items),
            None => Shape::Array(None),
        },
        JsonType::String => Shape::Primitive(PrimitiveType::String { format }),
        JsonType::Integer => Shape::Primitive(PrimitiveType::Integer { format }),
        JsonType::Number => Shape::Primitive(PrimitiveType::Number { format }),
        JsonType::Boolean => Shape::Primitive(PrimitiveType::Boolean),
        JsonType::Null => Shape::Primitive(PrimitiveType::Null),
    }
}

fn array_shape(items: &Items) -> Shape {
    match items {
        Items::Single(item) => Shape::Array(Some(*item)),
        Items::Tuple(items) => Shape::Tuple(items.clone()),
    }
}

fn primitive_of_value(value: &Value, format: Option<String>) -> PrimitiveType {
    match value {
        Value::String(_) => PrimitiveType::String { format },
        Value::Bool(_) => PrimitiveType::Boolean,
        Value::Number(n) if n.is_i64() || n.is_u64() => PrimitiveType::Integer { format },
        Value::Number(_) => PrimitiveType::Number { format },
        Value::Null => PrimitiveType::Null,
        _ => PrimitiveType::Any,
    }
}

/// Properties a type inherits through class bases (union bases contribute none)
fn inherited_properties(types: &[GeneratedType], id: TypeId) -> Vec<GeneratedProperty> {
    let mut out = Vec::new();
    let mut stack: Vec<TypeId> = types[id.0].base_types.iter().rev().copied().collect();
    let mut seen = HashSet::new();
    while let Some(base) = stack.pop() {
        if base == id || !seen.insert(base) {
            continue;
        }
        let Some(ty) = types.get(base.0) else { continue };
        if ty.kind != TypeKind::Class {
            continue;
        }
        out.extend(ty.properties.iter().cloned());
        stack.extend(ty.base_types.iter().rev().copied());
    }
    out
}

/// Drop failed types, renumber the rest, re-point references (dangling ones become `Any`)
fn compact(types: &mut Vec<GeneratedType>, root: &mut Option<TypeReference>, failed: &HashSet<TypeId>) {
    let mut remap: HashMap<TypeId, TypeId> = HashMap::new();
    let mut next = 0;
    for ty in types.iter() {
        if !failed.contains(&ty.id) {
            remap.insert(ty.id, TypeId(next));
            next += 1;
        }
    }
    let lookup = |id: TypeId| remap.get(&id).copied();

    types.retain(|t| !failed.contains(&t.id));
    for ty in types.iter_mut() {
        ty.id = remap[&ty.id];
        for prop in &mut ty.properties {
            prop.type_ref.remap(&lookup);
        }
        if let Some(extra) = ty.additional_properties.as_mut() {
            extra.remap(&lookup);
        }
        ty.base_types = ty.base_types.iter().filter_map(|b| lookup(*b)).collect();
        if let Some(disc) = ty.discriminator.as_mut() {
            disc.mapping = disc
                .mapping
                .drain(..)
                .filter_map(|(tag, t)| lookup(t).map(|t| (tag, t)))
                .collect();
        }
    }
    if let Some(r) = root.as_mut() {
        r.remap(&lookup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ResolutionSession;
    use crate::schema::parse_str;

    fn model_with(text: &str, settings: &GenerationSettings) -> Result<TypeModel, BuildErrors> {
        let doc = parse_str(text, "file:///model.json").unwrap();
        let resolved = ResolutionSession::offline().resolve_local(doc).unwrap();
        build(&resolved, settings)
    }

    fn model(text: &str) -> TypeModel {
        model_with(text, &GenerationSettings::default()).unwrap()
    }

    #[test]
    fn test_simple_object() {
        let m = model(r#"{"type":"object","properties":{"name":{"type":"string"}},"required":["name"]}"#);
        assert_eq!(m.len(), 1);
        let ty = &m.types[0];
        assert_eq!(ty.name, "Model");
        let name = ty.property("name").unwrap();
        assert_eq!(name.type_ref, TypeReference::string());
        assert!(!name.nullable);
        assert!(name.required);
    }

    #[test]
    fn test_optional_and_null_default_are_nullable() {
        let m = model(
            r#"{"title":"Thing","properties":{
                "a":{"type":"string"},
                "b":{"type":"string","default":null},
                "c":{"type":["integer","null"]}},
              "required":["b","c"]}"#,
        );
        let ty = m.by_name("Thing").unwrap();
        assert!(ty.property("a").unwrap().nullable);
        assert!(ty.property("b").unwrap().nullable);
        assert!(ty.property("c").unwrap().nullable);
        assert!(ty.property("c").unwrap().required);
    }

    #[test]
    fn test_null_default_setting_off() {
        let settings = GenerationSettings {
            null_default_is_nullable: false,
            ..Default::default()
        };
        let m = model_with(
            r#"{"properties":{"b":{"type":"string","default":null}},"required":["b"]}"#,
            &settings,
        )
        .unwrap();
        assert!(!m.types[0].property("b").unwrap().nullable);
    }

    #[test]
    fn test_synthesized_names() {
        let m = model(
            r#"{"title":"Order","properties":{
                "customer":{"type":"object","properties":{"id":{"type":"string"}}},
                "lines":{"type":"array","items":{"type":"object","properties":{"sku":{"type":"string"}}}},
                "tags":{"type":"object","additionalProperties":{"type":"object","properties":{"x":{}}}}}}"#,
        );
        let names: Vec<&str> = m.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Order", "OrderCustomer", "OrderLinesItem", "OrderTagsValue"]);
    }

    #[test]
    fn test_definitions_claim_before_synthesized() {
        let m = model(
            r#"{"title":"Root","properties":{"item":{"type":"object","properties":{"a":{}}}},
                "definitions":{"RootItem":{"type":"object","properties":{"b":{}}}}}"#,
        );
        assert!(m.by_name("RootItem").unwrap().property("b").is_some());
        assert!(m.by_name("RootItem2").unwrap().property("a").is_some());
    }

    #[test]
    fn test_enum_and_untagged_union() {
        let m = model(
            r#"{"properties":{
                "color":{"enum":["red","green"]},
                "mixed":{"enum":["a",1]},
                "either":{"oneOf":[{"type":"string"},{"type":"integer"}]},
                "maybe":{"oneOf":[{"type":"string"},{"type":"null"}]}}}"#,
        );
        let root = &m.types[0];
        let color = root.property("color").unwrap().type_ref.direct().unwrap();
        assert_eq!(m.get(color).unwrap().kind, TypeKind::Enum);
        assert!(root.property("mixed").unwrap().type_ref.is_any());
        assert!(root.property("either").unwrap().type_ref.is_any());
        assert_eq!(root.property("maybe").unwrap().type_ref, TypeReference::string());
        assert_eq!(m.diagnostics.with_code(DiagnosticCode::MixedEnum).count(), 1);
        assert_eq!(m.diagnostics.with_code(DiagnosticCode::UntaggedUnion).count(), 1);
    }

    #[test]
    fn test_inheritance_drops_compatible_redeclaration() {
        let m = model(
            r##"{"definitions":{
                "Base":{"type":"object","properties":{"id":{"type":"string"}}},
                "Derived":{"allOf":[{"$ref":"#/definitions/Base"}],
                           "properties":{"id":{"type":"string","format":"uuid"},"extra":{"type":"integer"}}}}}"##,
        );
        let derived = m.by_name("Derived").unwrap();
        let base = m.by_name("Base").unwrap();
        assert_eq!(derived.base_types, vec![base.id]);
        let own: Vec<&str> = derived.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(own, vec!["extra"]);
        assert_eq!(m.order.first(), Some(&base.id));
    }

    #[test]
    fn test_incompatible_redeclaration_fails_only_that_type() {
        let err = model_with(
            r##"{"definitions":{
                "Base":{"type":"object","properties":{"id":{"type":"string"}}},
                "Bad":{"allOf":[{"$ref":"#/definitions/Base"}],"properties":{"id":{"type":"integer"}}},
                "Fine":{"type":"object","properties":{"bad":{"$ref":"#/definitions/Bad"}}}}}"##,
            &GenerationSettings::default(),
        )
        .unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].type_name, "Bad");
        let partial = &err.partial;
        assert!(partial.by_name("Bad").is_none());
        assert!(partial.by_name("Fine").unwrap().property("bad").unwrap().type_ref.is_any());
    }

    #[test]
    fn test_merge_strategy_flattens() {
        let settings = GenerationSettings::default().with_strategy(AllOfStrategy::Merge);
        let m = model_with(
            r##"{"definitions":{
                "Base":{"type":"object","properties":{"id":{"type":"string"}},"required":["id"]},
                "Derived":{"allOf":[{"$ref":"#/definitions/Base"},{"properties":{"extra":{"type":"integer"}}}]}}}"##,
            &settings,
        )
        .unwrap();
        let derived = m.by_name("Derived").unwrap();
        assert!(derived.base_types.is_empty());
        let names: Vec<&str> = derived.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "extra"]);
        assert!(derived.property("id").unwrap().required);
    }

    #[test]
    fn test_merge_keeps_refining_object_type() {
        let settings = GenerationSettings::default().with_strategy(AllOfStrategy::Merge);
        let m = model_with(
            r##"{"definitions":{
                "P":{"type":"object","properties":{"a":{"type":"string"}},"required":["a"]},
                "Q":{"type":"object","properties":{"a":{"type":"string"},"b":{"type":"integer"}},"required":["a"]},
                "Sub":{"allOf":[{"$ref":"#/definitions/P"},{"properties":{"c":{"type":"boolean"}}}]},
                "M":{"allOf":[{"properties":{"v":{"$ref":"#/definitions/P"}}},{"properties":{"v":{"$ref":"#/definitions/Q"}}}]},
                "N":{"allOf":[{"properties":{"w":{"$ref":"#/definitions/Sub"}}},{"properties":{"w":{"$ref":"#/definitions/P"}}}]}}}"##,
            &settings,
        )
        .unwrap();
        let q = m.by_name("Q").unwrap().id;
        let sub = m.by_name("Sub").unwrap().id;
        assert_eq!(m.by_name("M").unwrap().property("v").unwrap().type_ref, TypeReference::Generated(q));
        assert_eq!(m.by_name("N").unwrap().property("w").unwrap().type_ref, TypeReference::Generated(sub));
    }

    #[test]
    fn test_merge_rejects_unrelated_object_types() {
        let settings = GenerationSettings::default().with_strategy(AllOfStrategy::Merge);
        let err = model_with(
            r##"{"definitions":{
                "P":{"type":"object","properties":{"a":{"type":"string"}},"required":["a"]},
                "Loose":{"type":"object","properties":{"a":{"type":"string"},"b":{"type":"integer"}}},
                "Z":{"type":"object","properties":{"z":{"type":"boolean"}}},
                "M":{"allOf":[{"properties":{"v":{"$ref":"#/definitions/P"}}},{"properties":{"v":{"$ref":"#/definitions/Z"}}}]},
                "L":{"allOf":[{"properties":{"v":{"$ref":"#/definitions/P"}}},{"properties":{"v":{"$ref":"#/definitions/Loose"}}}]}}}"##,
            &settings,
        )
        .unwrap_err();
        let mut failed: Vec<&str> = err.errors.iter().map(|e| e.type_name.as_str()).collect();
        failed.sort();
        assert_eq!(failed, vec!["L", "M"]);
        let m = err.errors.iter().find(|e| e.type_name == "M").unwrap();
        assert!(matches!(
            &m.kind,
            BuildErrorKind::IncompatibleMerge { property, left, right }
                if property == "v" && left == "P" && right == "Z"
        ));
    }

    #[test]
    fn test_unions_of_objects_discriminated() {
        let m = model(
            r##"{"definitions":{
                "Shape":{"oneOf":[{"$ref":"#/definitions/Circle"},{"$ref":"#/definitions/Square"}],
                         "discriminator":{"propertyName":"kind","mapping":{"circle":"#/definitions/Circle"}}},
                "Circle":{"type":"object","properties":{"kind":{"type":"string"},"r":{"type":"number"}}},
                "Square":{"type":"object","properties":{"kind":{"type":"string"},"side":{"type":"number"}}}}}"##,
        );
        let shape = m.by_name("Shape").unwrap();
        assert_eq!(shape.kind, TypeKind::Interface);
        let disc = shape.discriminator.as_ref().unwrap();
        assert_eq!(disc.property, "kind");
        let tags: Vec<&str> = disc.mapping.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(tags, vec!["circle", "Square"]);

        let circle = m.by_name("Circle").unwrap();
        assert_eq!(circle.discriminator_value.as_deref(), Some("circle"));
        assert_eq!(circle.base_types, vec![shape.id]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let text = r##"{"definitions":{
            "A":{"type":"object","properties":{"b":{"$ref":"#/definitions/B"},"list":{"type":"array","items":{"$ref":"#/definitions/A"}}}},
            "B":{"type":"object","properties":{"a":{"$ref":"#/definitions/A"},"inline":{"properties":{"z":{}}}}}}}"##;
        let doc = parse_str(text, "file:///cycle.json").unwrap();
        let resolved = ResolutionSession::offline().resolve_local(doc).unwrap();
        let settings = GenerationSettings::default();
        assert_eq!(build(&resolved, &settings).unwrap(), build(&resolved, &settings).unwrap());
    }
}
