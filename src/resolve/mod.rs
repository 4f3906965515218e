//! Reference Resolver
//!
//! Links every `$ref` placeholder (and discriminator mapping entry) to its
//! target node, across one or many documents:
//! - Same-document fragments (`#/definitions/Foo`, `#anchor`)
//! - Schemas under keywords the dialect does not interpret (`#/x-models/Pet`),
//!   parsed into the arena the first time a pointer reaches them
//! - Documents registered up front with [`ResolutionSession::preload`]
//! - External documents fetched through the session's [`DocumentCache`]
//!
//! Binding stores the target `NodeId` on the placeholder; nothing is copied,
//! so all referrers of one pointer share one node and cycles need no special
//! casing. A pointer is marked in progress while its target is located; only
//! a chain of references that never reaches a concrete schema can revisit it.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use url::Url;

pub mod loader;

pub use loader::{DocumentCache, DocumentLoader, MemoryLoader};

use crate::error::{ResolutionCause, ResolutionError, ResolutionErrors};
use crate::schema::parse::parse_fragment;
use crate::schema::pointer::{without_fragment, Fragment, JsonPointer, ReferenceTarget};
use crate::schema::serialize::node_to_value;
use crate::schema::{AdditionalProperties, Document, Items, NodeId, SchemaArena, SchemaDialect, SchemaNode};

// =============================================================================
// Resolved Document
// =============================================================================

/// One document linked into a session
#[derive(Debug, Clone)]
pub struct DocumentEntry {
    pub uri: Url,
    pub dialect: SchemaDialect,
    pub root: NodeId,
    pub components: IndexMap<String, NodeId>,
    pub components_extra: IndexMap<String, Value>,
}

impl DocumentEntry {
    /// Named definitions in declaration order: `definitions`, `$defs`, then components
    pub fn named_definitions(&self, arena: &SchemaArena) -> Vec<(String, NodeId)> {
        let Some(root) = arena.get(self.root) else {
            return Vec::new();
        };
        root.definitions
            .iter()
            .chain(root.defs.iter())
            .chain(self.components.iter())
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

/// A fully linked graph: the primary document plus everything it reaches
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    arena: SchemaArena,
    documents: Vec<DocumentEntry>,
    primary: usize,
    locations: Vec<String>,
    bound: usize,
}

impl ResolvedDocument {
    pub fn arena(&self) -> &SchemaArena {
        &self.arena
    }

    pub fn node(&self, id: NodeId) -> Option<&SchemaNode> {
        self.arena.get(id)
    }

    pub fn primary(&self) -> &DocumentEntry {
        &self.documents[self.primary]
    }

    pub fn root(&self) -> NodeId {
        self.primary().root
    }

    pub fn documents(&self) -> &[DocumentEntry] {
        &self.documents
    }

    /// Bound target of a reference placeholder
    pub fn target(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id)?.reference.as_ref()?.target
    }

    /// Follow reference bindings to the concrete node
    pub fn canonical(&self, id: NodeId) -> NodeId {
        let mut current = id;
        for _ in 0..=self.arena.len() {
            match self.target(current) {
                Some(next) => current = next,
                None => return current,
            }
        }
        current
    }

    /// Absolute location of a node: `<document uri>#<json pointer>`
    pub fn location(&self, id: NodeId) -> &str {
        self.locations.get(id.index()).map(String::as_str).unwrap_or("")
    }

    /// Number of placeholders bound
    pub fn bound_references(&self) -> usize {
        self.bound
    }

    /// Primary document as JSON, reference shapes as originally written
    pub fn to_value(&self) -> Value {
        let primary = self.primary();
        let mut root = node_to_value(&self.arena, primary.root, primary.dialect);
        if !primary.components.is_empty() || !primary.components_extra.is_empty() {
            let mut components = serde_json::Map::new();
            if !primary.components.is_empty() {
                let schemas = primary
                    .components
                    .iter()
                    .map(|(name, id)| (name.clone(), node_to_value(&self.arena, *id, primary.dialect)))
                    .collect();
                components.insert("schemas".into(), Value::Object(schemas));
            }
            for (key, value) in &primary.components_extra {
                components.insert(key.clone(), value.clone());
            }
            if let Value::Object(obj) = &mut root {
                obj.insert("components".into(), Value::Object(components));
            }
        }
        root
    }

    pub fn serialize(&self) -> Vec<u8> {
        serde_json::to_vec_pretty(&self.to_value()).unwrap_or_default()
    }
}

// =============================================================================
// Resolution Session
// =============================================================================

/// Explicit resolution scope: arena being linked, document registry,
/// identifier indexes and the per-pointer memo
#[derive(Debug, Default)]
pub struct ResolutionSession {
    cache: Option<Arc<DocumentCache>>,
    arena: SchemaArena,
    documents: Vec<DocumentEntry>,
    locations: Vec<String>,
    by_uri: HashMap<Url, usize>,
    /// Nodes carrying an absolute `$id`
    embedded: HashMap<Url, NodeId>,
    anchors: HashMap<(Url, String), NodeId>,
    memo: HashMap<String, NodeId>,
    in_progress: HashSet<String>,
    failed: HashMap<Url, ResolutionCause>,
    /// Nodes parsed from `extension_data`, by owner and consumed segments
    fragments: HashMap<(NodeId, Vec<String>), NodeId>,
}

impl ResolutionSession {
    /// Session that can fetch external documents through `cache`
    pub fn new(cache: Arc<DocumentCache>) -> Self {
        Self {
            cache: Some(cache),
            ..Default::default()
        }
    }

    /// Session limited to local and preloaded documents
    pub fn offline() -> Self {
        Self::default()
    }

    /// Register an already-loaded document for cross-document pointers
    pub fn preload(&mut self, document: Document) -> &mut Self {
        self.import(document);
        self
    }

    /// Resolve `document`, loading external documents as needed
    pub async fn resolve(mut self, document: Document) -> Result<ResolvedDocument, ResolutionErrors> {
        let primary = self.import(document);

        if let Some(cache) = self.cache.clone() {
            loop {
                // Early binding parses extension fragments, whose references
                // may point at further documents.
                self.bind_pass();
                let pending = self.pending_documents();
                if pending.is_empty() {
                    break;
                }
                let fetches = pending.iter().map(|uri| cache.fetch(uri));
                let results = futures::future::join_all(fetches).await;
                for (uri, result) in pending.into_iter().zip(results) {
                    match result {
                        Ok(doc) => {
                            self.import(Document::clone(&doc));
                        }
                        Err(cause) => {
                            self.failed.insert(uri, cause);
                        }
                    }
                }
            }
        }

        self.finish(primary)
    }

    /// Resolve without loading: external documents must have been preloaded
    pub fn resolve_local(mut self, document: Document) -> Result<ResolvedDocument, ResolutionErrors> {
        let primary = self.import(document);
        self.finish(primary)
    }

    fn finish(mut self, primary: usize) -> Result<ResolvedDocument, ResolutionErrors> {
        let mut errors = ResolutionErrors::new();
        let bound = self.bind_references(&mut errors);
        self.bind_discriminators(&mut errors);
        self.check_alias_cycles(&mut errors);
        self.check_required(&mut errors);

        tracing::info!(
            documents = self.documents.len(),
            nodes = self.arena.len(),
            bound,
            errors = errors.len(),
            "reference resolution finished"
        );

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(ResolvedDocument {
            arena: self.arena,
            documents: self.documents,
            primary,
            locations: self.locations,
            bound,
        })
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    fn import(&mut self, document: Document) -> usize {
        let key = without_fragment(&document.base_uri);
        if let Some(existing) = self.by_uri.get(&key) {
            return *existing;
        }

        let start = self.arena.len();
        let offset = self.arena.absorb(document.arena);
        let shift = |id: NodeId| NodeId(id.0 + offset);

        let entry = DocumentEntry {
            uri: key.clone(),
            dialect: document.dialect,
            root: shift(document.root),
            components: document.components.into_iter().map(|(k, v)| (k, shift(v))).collect(),
            components_extra: document.components_extra,
        };

        self.locations.resize(self.arena.len(), String::new());
        self.record_locations(&entry, &key);
        self.index_identifiers(start);

        tracing::debug!(uri = %key, nodes = self.arena.len() - start, "document registered");

        let index = self.documents.len();
        self.documents.push(entry);
        self.by_uri.insert(key, index);
        index
    }

    fn record_locations(&mut self, entry: &DocumentEntry, uri: &Url) {
        let uri = uri.to_string();
        self.record_subtree(entry.root, JsonPointer::root(), &uri);
        let components = JsonPointer::root().child("components").child("schemas");
        for (name, id) in &entry.components {
            self.record_subtree(*id, components.child(name.as_str()), &uri);
        }
    }

    fn record_subtree(&mut self, root: NodeId, at: JsonPointer, uri: &str) {
        let mut stack = vec![(root, at)];
        while let Some((id, pointer)) = stack.pop() {
            if let Some(slot) = self.locations.get_mut(id.index()) {
                *slot = format!("{}#{}", uri, pointer);
            }
            if let Some(node) = self.arena.get(id) {
                stack.extend(structural_children(node, &pointer));
            }
        }
    }

    fn index_identifiers(&mut self, start: usize) {
        let ids: Vec<NodeId> = self.arena.ids().skip(start).collect();
        for id in ids {
            let Some(node) = self.arena.get(id) else { continue };
            let Some(base) = self.arena.base_uri(id).cloned() else { continue };

            if let Some(text) = &node.id {
                match text.strip_prefix('#') {
                    Some(name) => {
                        self.anchors.entry((base.clone(), name.to_string())).or_insert(id);
                    }
                    None => {
                        self.embedded.entry(without_fragment(&base)).or_insert(id);
                    }
                }
            }
            if let Some(anchor) = &node.anchor {
                self.anchors.entry((base, anchor.clone())).or_insert(id);
            }
        }
    }

    /// External documents referenced but not yet registered
    fn pending_documents(&self) -> Vec<Url> {
        let mut pending = BTreeSet::new();
        for (id, node) in self.arena.iter() {
            let Some(base) = self.arena.base_uri(id) else { continue };
            for reference in outgoing_references(node) {
                let Ok(target) = ReferenceTarget::parse(base, reference) else { continue };
                if !self.knows(&target.document) && !self.failed.contains_key(&target.document) {
                    pending.insert(target.document);
                }
            }
        }
        pending.into_iter().collect()
    }

    fn knows(&self, uri: &Url) -> bool {
        self.by_uri.contains_key(uri) || self.embedded.contains_key(uri)
    }

    // -------------------------------------------------------------------------
    // Binding
    // -------------------------------------------------------------------------

    fn bind_references(&mut self, errors: &mut ResolutionErrors) -> usize {
        let (bound, failures) = self.bind_pass();
        for (id, cause) in failures {
            errors.push(ResolutionError::new(self.location_of(id), cause));
        }
        bound
    }

    /// Bind every placeholder once, including those of fragments parsed
    /// along the way. Returns the bound count and the failures.
    fn bind_pass(&mut self) -> (usize, Vec<(NodeId, ResolutionCause)>) {
        let mut attempted = HashSet::new();
        let mut bound = 0;
        let mut failures = Vec::new();
        loop {
            let batch: Vec<NodeId> = self
                .arena
                .iter()
                .filter(|(id, n)| n.is_reference() && !attempted.contains(id))
                .map(|(id, _)| id)
                .collect();
            if batch.is_empty() {
                break;
            }
            for id in batch {
                attempted.insert(id);
                match self.bind(id) {
                    Ok(_) => bound += 1,
                    Err(cause) => failures.push((id, cause)),
                }
            }
        }
        (bound, failures)
    }

    /// Bind one placeholder, returning its target
    fn bind(&mut self, id: NodeId) -> Result<NodeId, ResolutionCause> {
        let Some(reference) = self.arena.get(id).and_then(|n| n.reference.clone()) else {
            return Ok(id);
        };
        if let Some(target) = reference.target {
            return Ok(target);
        }

        let base = self
            .arena
            .base_uri(id)
            .cloned()
            .ok_or_else(|| ResolutionCause::MalformedUri(reference.pointer.clone()))?;
        let target = ReferenceTarget::parse(&base, &reference.pointer).map_err(ResolutionCause::MalformedUri)?;
        let found = self.locate_memoized(&target)?;

        if let Some(slot) = self.arena.get_mut(id).and_then(|n| n.reference.as_mut()) {
            slot.target = Some(found);
        }
        Ok(found)
    }

    fn locate_memoized(&mut self, target: &ReferenceTarget) -> Result<NodeId, ResolutionCause> {
        let key = target.key();
        if let Some(found) = self.memo.get(&key) {
            return Ok(*found);
        }
        if !self.in_progress.insert(key.clone()) {
            return Err(ResolutionCause::AliasCycle(key));
        }
        let result = self.locate(target);
        self.in_progress.remove(&key);

        let found = result?;
        self.memo.insert(key, found);
        Ok(found)
    }

    fn locate(&mut self, target: &ReferenceTarget) -> Result<NodeId, ResolutionCause> {
        let start = match (self.embedded.get(&target.document), self.by_uri.get(&target.document)) {
            (Some(node), _) => *node,
            (None, Some(doc)) => self.documents[*doc].root,
            (None, None) => {
                return Err(self
                    .failed
                    .get(&target.document)
                    .cloned()
                    .unwrap_or_else(|| ResolutionCause::DocumentNotLoaded(target.document.to_string())));
            }
        };

        match &target.fragment {
            Fragment::Anchor(name) => self
                .anchors
                .get(&(target.document.clone(), name.clone()))
                .copied()
                .ok_or_else(|| ResolutionCause::MissingTarget(format!("#{}", name))),
            Fragment::Pointer(pointer) => {
                let doc = self.by_uri.get(&target.document).copied();
                self.navigate(start, doc, pointer)
            }
        }
    }

    /// Walk `pointer` from `start`. A reference crossed on the way is bound and
    /// followed when the placeholder itself has no matching child.
    fn navigate(&mut self, start: NodeId, doc: Option<usize>, pointer: &JsonPointer) -> Result<NodeId, ResolutionCause> {
        let missing = || ResolutionCause::MissingTarget(pointer.to_fragment());
        let segments = pointer.segments();
        let doc_root = doc.map(|d| self.documents[d].root);
        let mut current = start;
        let mut i = 0;

        while i < segments.len() {
            // OpenAPI components live beside the root schema.
            if Some(current) == doc_root && segments[i] == "components" {
                let entry = &self.documents[doc.ok_or_else(missing)?];
                if segments.get(i + 1).map(String::as_str) != Some("schemas") {
                    return Err(missing());
                }
                let name = segments.get(i + 2).ok_or_else(missing)?;
                current = *entry.components.get(name).ok_or_else(missing)?;
                i += 3;
                continue;
            }

            let mut seen = HashSet::new();
            let (child, consumed) = loop {
                let node = self.arena.get(current).ok_or_else(missing)?;
                if let Some(step) = child_at(node, &segments[i..]) {
                    break step;
                }
                if node.extension_data.contains_key(&segments[i]) {
                    break self.materialize(current, doc, &segments[i..])?;
                }
                if !node.is_reference() || !seen.insert(current) {
                    return Err(missing());
                }
                current = self.bind(current)?;
            };

            current = child;
            i += consumed;
        }

        Ok(current)
    }

    /// Parse the schema addressed by `rest` inside `owner`'s extension data.
    /// The walk stops at the first value the pointer continues into through
    /// a keyword the dialect interprets, or where the pointer ends.
    fn materialize(&mut self, owner: NodeId, doc: Option<usize>, rest: &[String]) -> Result<(NodeId, usize), ResolutionCause> {
        let missing = || ResolutionCause::MissingTarget(JsonPointer::from_segments(rest).to_fragment());
        let dialect = doc.map(|d| self.documents[d].dialect).unwrap_or_default();
        let owner_node = self.arena.get(owner).ok_or_else(missing)?;
        let scope = owner_node.scope;
        let mut value = owner_node.extension_data.get(&rest[0]).ok_or_else(missing)?;

        let mut consumed = 1;
        while consumed < rest.len() {
            let next = rest[consumed].as_str();
            if let Value::Object(obj) = value {
                if dialect.recognizes(next) && obj.contains_key(next) {
                    break;
                }
            }
            value = match value {
                Value::Object(obj) => obj.get(next),
                Value::Array(list) => next.parse::<usize>().ok().and_then(|k| list.get(k)),
                _ => None,
            }
            .ok_or_else(missing)?;
            consumed += 1;
        }

        let key = (owner, rest[..consumed].to_vec());
        if let Some(found) = self.fragments.get(&key) {
            return Ok((*found, consumed));
        }

        let owner_location = self.location_of(owner);
        let (uri, fragment) = owner_location.split_once('#').unwrap_or((owner_location.as_str(), ""));
        let pointer = rest[..consumed]
            .iter()
            .fold(JsonPointer::parse(fragment).unwrap_or_default(), |p, s| p.child(s.as_str()));

        let value = value.clone();
        let start = self.arena.len();
        let id = parse_fragment(&mut self.arena, &value, &pointer, scope, dialect).map_err(ResolutionCause::Parse)?;
        self.locations.resize(self.arena.len(), String::new());
        let uri = uri.to_string();
        self.record_subtree(id, pointer, &uri);
        self.index_identifiers(start);

        tracing::debug!(location = %self.location_of(id), nodes = self.arena.len() - start, "parsed extension fragment");
        self.fragments.insert(key, id);
        Ok((id, consumed))
    }

    fn bind_discriminators(&mut self, errors: &mut ResolutionErrors) {
        let owners: Vec<NodeId> = self
            .arena
            .iter()
            .filter(|(_, n)| n.discriminator.as_ref().is_some_and(|d| !d.mapping.is_empty()))
            .map(|(id, _)| id)
            .collect();

        for owner in owners {
            let Some(base) = self.arena.base_uri(owner).cloned() else { continue };
            let doc = self.by_uri.get(&base).copied();
            let entries: Vec<(String, String)> = self.arena[owner]
                .discriminator
                .as_ref()
                .map(|d| d.mapping.iter().map(|(t, e)| (t.clone(), e.reference.clone())).collect())
                .unwrap_or_default();

            for (tag, reference) in entries {
                let result = match self.bare_schema_name(doc, &reference) {
                    Some(found) => Ok(found),
                    None => ReferenceTarget::parse(&base, &reference)
                        .map_err(ResolutionCause::MalformedUri)
                        .and_then(|target| self.locate_memoized(&target)),
                };
                match result {
                    Ok(found) => {
                        if let Some(entry) = self
                            .arena
                            .get_mut(owner)
                            .and_then(|n| n.discriminator.as_mut())
                            .and_then(|d| d.mapping.get_mut(&tag))
                        {
                            entry.target = Some(found);
                        }
                    }
                    Err(cause) => {
                        let at = format!("{}/discriminator/mapping/{}", self.location_of(owner), tag);
                        errors.push(ResolutionError::new(at, cause));
                    }
                }
            }
        }
    }

    /// OpenAPI allows a mapping value to be a plain schema name
    fn bare_schema_name(&self, doc: Option<usize>, reference: &str) -> Option<NodeId> {
        if reference.contains('#') || reference.contains('/') {
            return None;
        }
        let entry = &self.documents[doc?];
        entry
            .named_definitions(&self.arena)
            .into_iter()
            .find(|(name, _)| name == reference)
            .map(|(_, id)| id)
    }

    /// Follow bound references; `None` when the chain loops
    fn follow(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        for _ in 0..=self.arena.len() {
            match self.arena.get(current).and_then(|n| n.reference.as_ref()).and_then(|r| r.target) {
                Some(next) => current = next,
                None => return Some(current),
            }
        }
        None
    }

    fn check_alias_cycles(&self, errors: &mut ResolutionErrors) {
        for (id, node) in self.arena.iter() {
            if node.reference.as_ref().and_then(|r| r.target).is_none() || self.follow(id).is_some() {
                continue;
            }
            let at = self.location_of(id);
            if errors.for_pointer(&at).is_none() {
                errors.push(ResolutionError::new(at.clone(), ResolutionCause::AliasCycle(at)));
            }
        }
    }

    /// `required` names must be declared in `properties` (own or through `allOf`)
    fn check_required(&self, errors: &mut ResolutionErrors) {
        for (id, node) in self.arena.iter() {
            if node.properties.is_empty() || node.required.is_empty() {
                continue;
            }
            for name in &node.required {
                if !self.declares_property(id, name, &mut HashSet::new()) {
                    errors.push(ResolutionError::new(
                        self.location_of(id),
                        ResolutionCause::UndeclaredRequired(name.clone()),
                    ));
                }
            }
        }
    }

    fn declares_property(&self, id: NodeId, name: &str, seen: &mut HashSet<NodeId>) -> bool {
        let Some(current) = self.follow(id) else { return false };
        if !seen.insert(current) {
            return false;
        }
        let Some(node) = self.arena.get(current) else { return false };
        node.properties.contains_key(name)
            || node.all_of.iter().any(|member| self.declares_property(*member, name, seen))
    }

    fn location_of(&self, id: NodeId) -> String {
        match self.locations.get(id.index()) {
            Some(loc) if !loc.is_empty() => loc.clone(),
            _ => id.to_string(),
        }
    }
}

/// Child addressed by the leading pointer segments, and how many it consumed
fn child_at(node: &SchemaNode, rest: &[String]) -> Option<(NodeId, usize)> {
    let segment = rest.first()?.as_str();
    let next = rest.get(1);
    let index = next.and_then(|s| s.parse::<usize>().ok());

    let named = |map: &IndexMap<String, NodeId>| next.and_then(|n| map.get(n)).map(|id| (*id, 2));
    let listed = |list: &[NodeId]| index.and_then(|k| list.get(k)).map(|id| (*id, 2));

    match segment {
        "properties" => named(&node.properties),
        "definitions" => named(&node.definitions),
        "$defs" => named(&node.defs),
        "patternProperties" => named(&node.pattern_properties),
        "allOf" => listed(&node.all_of),
        "anyOf" => listed(&node.any_of),
        "oneOf" => listed(&node.one_of),
        "items" => match &node.items {
            Some(Items::Single(child)) => Some((*child, 1)),
            Some(Items::Tuple(children)) => listed(children),
            None => None,
        },
        "additionalProperties" => match &node.additional_properties {
            Some(AdditionalProperties::Schema(child)) => Some((*child, 1)),
            _ => None,
        },
        other => node
            .applicators
            .get(other)
            .map(|id| (*id, 1))
            .or_else(|| node.schema_maps.get(other).and_then(named)),
    }
}

/// Children paired with their pointer, for location bookkeeping
fn structural_children(node: &SchemaNode, at: &JsonPointer) -> Vec<(NodeId, JsonPointer)> {
    let mut out = Vec::new();
    let map = |out: &mut Vec<(NodeId, JsonPointer)>, keyword: &str, entries: &IndexMap<String, NodeId>| {
        let base = at.child(keyword);
        for (name, id) in entries {
            out.push((*id, base.child(name.as_str())));
        }
    };
    map(&mut out, "properties", &node.properties);
    map(&mut out, "patternProperties", &node.pattern_properties);
    map(&mut out, "definitions", &node.definitions);
    map(&mut out, "$defs", &node.defs);
    for (keyword, entries) in &node.schema_maps {
        map(&mut out, keyword, entries);
    }
    match &node.items {
        Some(Items::Single(id)) => out.push((*id, at.child("items"))),
        Some(Items::Tuple(ids)) => {
            let base = at.child("items");
            out.extend(ids.iter().enumerate().map(|(i, id)| (*id, base.child_index(i))));
        }
        None => {}
    }
    if let Some(AdditionalProperties::Schema(id)) = &node.additional_properties {
        out.push((*id, at.child("additionalProperties")));
    }
    for (keyword, members) in [("allOf", &node.all_of), ("anyOf", &node.any_of), ("oneOf", &node.one_of)] {
        let base = at.child(keyword);
        out.extend(members.iter().enumerate().map(|(i, id)| (*id, base.child_index(i))));
    }
    for (keyword, id) in &node.applicators {
        out.push((*id, at.child(keyword.as_str())));
    }
    out
}

/// Reference strings a node points at: its `$ref` and mapping values
fn outgoing_references(node: &SchemaNode) -> Vec<&str> {
    let mut out = Vec::new();
    if let Some(reference) = &node.reference {
        out.push(reference.pointer.as_str());
    }
    if let Some(disc) = &node.discriminator {
        out.extend(
            disc.mapping
                .values()
                .map(|e| e.reference.as_str())
                .filter(|r| r.contains('#') || r.contains('/')),
        );
    }
    out
}

/// Resolve `document`, fetching external documents through `loader`
pub async fn resolve(
    document: Document,
    loader: Arc<dyn DocumentLoader>,
) -> Result<ResolvedDocument, ResolutionErrors> {
    let cache = Arc::new(DocumentCache::new(loader, document.dialect));
    ResolutionSession::new(cache).resolve(document).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_str;

    fn local(text: &str) -> Result<ResolvedDocument, ResolutionErrors> {
        let doc = parse_str(text, "file:///test.json").unwrap();
        ResolutionSession::offline().resolve_local(doc)
    }

    #[test]
    fn test_root_ref_shares_identity() {
        let resolved = local(r##"{"definitions":{"Foo":{"type":"object"}},"$ref":"#/definitions/Foo"}"##).unwrap();
        let foo = resolved.node(resolved.root()).unwrap().definitions["Foo"];
        assert_eq!(resolved.canonical(resolved.root()), foo);
        assert_eq!(resolved.bound_references(), 1);
    }

    #[test]
    fn test_two_refs_one_node() {
        let resolved = local(
            r##"{"properties":{"a":{"$ref":"#/definitions/X"},"b":{"$ref":"#/definitions/X"}},
                "definitions":{"X":{"type":"string"}}}"##,
        )
        .unwrap();
        let root = resolved.node(resolved.root()).unwrap();
        let a = resolved.canonical(root.properties["a"]);
        let b = resolved.canonical(root.properties["b"]);
        assert_eq!(a, b);
        assert_eq!(a, root.definitions["X"]);
    }

    #[test]
    fn test_mutual_cycle_binds_by_identity() {
        let resolved = local(
            r##"{"definitions":{
                "A":{"type":"object","properties":{"b":{"$ref":"#/definitions/B"}}},
                "B":{"type":"object","properties":{"a":{"$ref":"#/definitions/A"}}}}}"##,
        )
        .unwrap();
        let root = resolved.node(resolved.root()).unwrap();
        let (a, b) = (root.definitions["A"], root.definitions["B"]);
        let a_b = resolved.node(a).unwrap().properties["b"];
        let b_a = resolved.node(b).unwrap().properties["a"];
        assert_eq!(resolved.canonical(a_b), b);
        assert_eq!(resolved.canonical(b_a), a);
    }

    #[test]
    fn test_pointer_through_reference() {
        let resolved = local(
            r##"{"definitions":{
                "Alias":{"$ref":"#/definitions/Real"},
                "Real":{"properties":{"inner":{"type":"integer"}}},
                "Uses":{"$ref":"#/definitions/Alias/properties/inner"}}}"##,
        )
        .unwrap();
        let root = resolved.node(resolved.root()).unwrap();
        let real = resolved.node(root.definitions["Real"]).unwrap();
        assert_eq!(resolved.canonical(root.definitions["Uses"]), real.properties["inner"]);
    }

    #[test]
    fn test_all_unresolved_pointers_reported() {
        let errors = local(
            r##"{"properties":{"a":{"$ref":"#/definitions/Missing"},"b":{"$ref":"#/nope/0"}}}"##,
        )
        .unwrap_err();
        assert_eq!(errors.len(), 2);
        let first = errors.for_pointer("file:///test.json#/properties/a").unwrap();
        assert_eq!(
            first.cause,
            ResolutionCause::MissingTarget("#/definitions/Missing".into())
        );
    }

    #[test]
    fn test_alias_cycle_is_an_error() {
        let errors = local(
            r##"{"definitions":{"A":{"$ref":"#/definitions/B"},"B":{"$ref":"#/definitions/A"}}}"##,
        )
        .unwrap_err();
        assert!(errors.iter().any(|e| matches!(e.cause, ResolutionCause::AliasCycle(_))));
    }

    #[test]
    fn test_undeclared_required_is_an_error() {
        let errors = local(r#"{"properties":{"a":{}},"required":["a","b"]}"#).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.iter().next().unwrap().cause,
            ResolutionCause::UndeclaredRequired("b".into())
        );
    }

    #[test]
    fn test_required_through_all_of() {
        let resolved = local(
            r##"{"allOf":[{"$ref":"#/definitions/Base"}],"properties":{"extra":{}},
                "required":["id","extra"],
                "definitions":{"Base":{"properties":{"id":{"type":"string"}}}}}"##,
        );
        assert!(resolved.is_ok());
    }

    #[test]
    fn test_anchor_and_embedded_id() {
        let resolved = local(
            r##"{"definitions":{
                "A":{"$id":"#item","type":"string"},
                "B":{"$id":"http://example.com/b.json","type":"integer"}},
                "properties":{"x":{"$ref":"#item"},"y":{"$ref":"http://example.com/b.json"}}}"##,
        )
        .unwrap();
        let root = resolved.node(resolved.root()).unwrap();
        assert_eq!(resolved.canonical(root.properties["x"]), root.definitions["A"]);
        assert_eq!(resolved.canonical(root.properties["y"]), root.definitions["B"]);
    }

    #[test]
    fn test_external_document_not_loaded_offline() {
        let errors = local(r#"{"properties":{"a":{"$ref":"common.json#/definitions/Id"}}}"#).unwrap_err();
        assert!(matches!(
            errors.iter().next().unwrap().cause,
            ResolutionCause::DocumentNotLoaded(_)
        ));
    }

    #[test]
    fn test_preloaded_document() {
        let common = parse_str(r#"{"definitions":{"Id":{"type":"string"}}}"#, "file:///common.json").unwrap();
        let main = parse_str(r#"{"properties":{"id":{"$ref":"common.json#/definitions/Id"}}}"#, "file:///main.json").unwrap();

        let mut session = ResolutionSession::offline();
        session.preload(common);
        let resolved = session.resolve_local(main).unwrap();

        let root = resolved.node(resolved.root()).unwrap();
        let id = resolved.canonical(root.properties["id"]);
        assert_eq!(resolved.location(id), "file:///common.json#/definitions/Id");
        assert_eq!(resolved.documents().len(), 2);
    }

    #[test]
    fn test_discriminator_mapping_bound() {
        let doc = parse_str(
            r##"{"openapi":"3.0.0","components":{"schemas":{
                "Pet":{"oneOf":[{"$ref":"#/components/schemas/Cat"},{"$ref":"#/components/schemas/Dog"}],
                       "discriminator":{"propertyName":"kind","mapping":{"cat":"#/components/schemas/Cat","dog":"Dog"}}},
                "Cat":{"type":"object","properties":{"kind":{"type":"string"}}},
                "Dog":{"type":"object","properties":{"kind":{"type":"string"}}}}}}"##,
            "file:///pets.json",
        )
        .unwrap();
        let resolved = ResolutionSession::offline().resolve_local(doc).unwrap();
        let pet = resolved.primary().components["Pet"];
        let disc = resolved.node(pet).unwrap().discriminator.clone().unwrap();
        assert_eq!(disc.mapping["cat"].target, Some(resolved.primary().components["Cat"]));
        assert_eq!(disc.mapping["dog"].target, Some(resolved.primary().components["Dog"]));
    }

    #[test]
    fn test_draft7_defs_pointer() {
        let resolved = local(
            r##"{"$schema":"http://json-schema.org/draft-07/schema#",
                "$defs":{"A":{"type":"string"}},
                "properties":{"a":{"$ref":"#/$defs/A"}}}"##,
        )
        .unwrap();
        let root = resolved.node(resolved.root()).unwrap();
        assert_eq!(resolved.canonical(root.properties["a"]), root.defs["A"]);
        assert_eq!(resolved.location(root.defs["A"]), "file:///test.json#/$defs/A");
    }

    #[test]
    fn test_pointer_into_extension_data() {
        let resolved = local(
            r##"{"$schema":"http://json-schema.org/draft-04/schema#",
                "x-models":{"Pet":{"type":"object","properties":{"name":{"type":"string"},
                                    "owner":{"$ref":"#/x-models/Person"}}},
                            "Person":{"type":"object","properties":{"pet":{"$ref":"#/x-models/Pet"}}}},
                "properties":{
                    "pet":{"$ref":"#/x-models/Pet"},
                    "again":{"$ref":"#/x-models/Pet"},
                    "name":{"$ref":"#/x-models/Pet/properties/name"}}}"##,
        )
        .unwrap();
        let root = resolved.node(resolved.root()).unwrap();
        let pet = resolved.canonical(root.properties["pet"]);
        assert_eq!(pet, resolved.canonical(root.properties["again"]));
        assert_eq!(resolved.location(pet), "file:///test.json#/x-models/Pet");

        // Deeper pointers land inside the same parsed fragment.
        let pet_node = resolved.node(pet).unwrap();
        assert_eq!(resolved.canonical(root.properties["name"]), pet_node.properties["name"]);

        // References inside the fragment are bound too, cycles included.
        let person = resolved.canonical(pet_node.properties["owner"]);
        let back = resolved.node(person).unwrap().properties["pet"];
        assert_eq!(resolved.canonical(back), pet);

        // The document itself still serializes as written.
        assert_eq!(resolved.to_value()["x-models"]["Pet"]["properties"]["owner"]["$ref"], "#/x-models/Person");
    }

    #[test]
    fn test_missing_extension_pointer_reported() {
        let errors = local(r##"{"x-models":{},"properties":{"a":{"$ref":"#/x-models/Nope"}}}"##).unwrap_err();
        let a = errors.for_pointer("file:///test.json#/properties/a").unwrap();
        assert!(matches!(a.cause, ResolutionCause::MissingTarget(_)));
    }
}
