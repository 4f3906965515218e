//! Code Generator Engine
//!
//! Walks a [`TypeModel`] and assembles output units through a
//! [`LanguageEmitter`]. The engine owns:
//! - traversal order (the emitter picks bases-first or dependencies-first)
//! - final identifiers (emitter spelling, made unique per run)
//! - deduplication of shared helper fragments by SHA-256 digest
//! - layout into one unit or one unit per type plus an index
//!
//! Emitters only turn one type or reference into text. They never see the
//! node graph, and they report constructs they cannot express through the
//! [`RenderContext`], which degrades them to an open type.

pub mod profile;
pub mod python;
pub mod rust;
pub mod typescript;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use sha2::{Digest, Sha256};

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::GenerationError;
use crate::model::{GeneratedProperty, GeneratedType, TypeId, TypeKind, TypeModel, TypeReference};
use crate::naming::with_suffix;
use crate::settings::{GenerationSettings, NullHandling, OutputLayout};

pub use profile::{KeywordEscape, Language, RenderProfile, TypeMappings};
pub use python::PythonEmitter;
pub use rust::RustEmitter;
pub use typescript::TypeScriptEmitter;

// =============================================================================
// Emitter capability set
// =============================================================================

/// Which model ordering an emitter needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationOrder {
    /// Bases before derived (`TypeModel::order`)
    BasesFirst,
    /// Also referenced before referrer (`TypeModel::dependency_order`)
    DependenciesFirst,
}

/// Target-language syntax for one language
pub trait LanguageEmitter: Send + Sync {
    fn language(&self) -> Language;

    fn profile(&self) -> &RenderProfile;

    fn file_extension(&self) -> &'static str;

    fn declaration_order(&self) -> DeclarationOrder;

    /// Type names this language already uses and generated types must avoid
    fn reserved_type_names(&self) -> &'static [&'static str] {
        &[]
    }

    /// Identifier for a type; empty when none can be formed
    fn name_for_type(&self, ty: &GeneratedType) -> String;

    /// Identifier for a property; empty when none can be formed
    fn name_for_property(&self, property: &GeneratedProperty, settings: &GenerationSettings) -> String;

    fn render_type(&self, reference: &TypeReference, ctx: &RenderContext<'_>) -> String;

    fn render_class(&self, ty: &GeneratedType, ctx: &RenderContext<'_>) -> String;

    fn render_enum(&self, ty: &GeneratedType, ctx: &RenderContext<'_>) -> String;

    /// Discriminated union base
    fn render_interface(&self, ty: &GeneratedType, ctx: &RenderContext<'_>) -> String;

    /// Leading text of a unit. `imports` are types the unit uses from other units.
    fn prelude(&self, unit: &[&GeneratedType], imports: &[&GeneratedType], ctx: &RenderContext<'_>) -> String;

    /// The shared `Nullable<T>` alias
    fn nullable_helper(&self, ctx: &RenderContext<'_>) -> String;

    /// Shared fragments `ty` needs; the engine keeps one copy per unit
    fn helpers(&self, ty: &GeneratedType, ctx: &RenderContext<'_>) -> Vec<String> {
        if ctx.settings.null_handling == NullHandling::WrapperType && uses_nullable(ty) {
            vec![self.nullable_helper(ctx)]
        } else {
            Vec::new()
        }
    }

    /// Trailing text of a single-file unit
    fn epilogue(&self, _unit: &[&GeneratedType], _ctx: &RenderContext<'_>) -> String {
        String::new()
    }

    /// File stem for a unit holding `name`
    fn module_name(&self, name: &str) -> String;

    /// Index unit for the file-per-type layout: (file name, text)
    fn index(&self, types: &[&GeneratedType], ctx: &RenderContext<'_>) -> (String, String);

    fn unit_file_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.file_extension())
    }
}

impl Language {
    /// Emitter with this language's default profile
    pub fn emitter(&self) -> Box<dyn LanguageEmitter> {
        match self {
            Self::Rust => Box::new(RustEmitter::new()),
            Self::TypeScript => Box::new(TypeScriptEmitter::new()),
            Self::Python => Box::new(PythonEmitter::new()),
        }
    }
}

// =============================================================================
// Render context
// =============================================================================

/// Per-run facts shared by every render call
pub struct RenderContext<'m> {
    pub model: &'m TypeModel,
    pub settings: &'m GenerationSettings,
    names: Vec<String>,
    cycle_of: Vec<Option<usize>>,
    diagnostics: RefCell<Diagnostics>,
}

impl<'m> RenderContext<'m> {
    fn new(
        model: &'m TypeModel,
        settings: &'m GenerationSettings,
        emitter: &dyn LanguageEmitter,
    ) -> Result<Self, GenerationError> {
        let mut taken: HashSet<String> = emitter.reserved_type_names().iter().map(|s| s.to_string()).collect();
        let mut names = Vec::with_capacity(model.len());
        for ty in model.iter() {
            let base = emitter.name_for_type(ty);
            if base.is_empty() {
                return Err(GenerationError::InvalidIdentifier {
                    language: emitter.language().to_string(),
                    name: ty.name.clone(),
                });
            }
            let mut name = base.clone();
            let mut n = 2;
            while taken.contains(&name) {
                name = with_suffix(&base, n);
                n += 1;
            }
            taken.insert(name.clone());
            names.push(name);

            for prop in &ty.properties {
                if emitter.name_for_property(prop, settings).is_empty() {
                    return Err(GenerationError::InvalidIdentifier {
                        language: emitter.language().to_string(),
                        name: format!("{}.{}", ty.name, prop.name),
                    });
                }
            }
        }

        let mut cycle_of = vec![None; model.len()];
        for (group, members) in model.cycle_groups().iter().enumerate() {
            for id in members {
                cycle_of[id.index()] = Some(group);
            }
        }

        Ok(Self {
            model,
            settings,
            names,
            cycle_of,
            diagnostics: RefCell::new(Diagnostics::new()),
        })
    }

    pub fn get(&self, id: TypeId) -> Option<&'m GeneratedType> {
        self.model.get(id)
    }

    /// Final identifier of a type in this run
    pub fn type_name(&self, id: TypeId) -> &str {
        self.names.get(id.index()).map(String::as_str).unwrap_or("")
    }

    pub fn in_cycle(&self, id: TypeId) -> bool {
        self.cycle_of.get(id.index()).is_some_and(Option::is_some)
    }

    /// Both types sit on one reference cycle
    pub fn same_cycle(&self, a: TypeId, b: TypeId) -> bool {
        match (self.cycle_of.get(a.index()), self.cycle_of.get(b.index())) {
            (Some(Some(x)), Some(Some(y))) => x == y,
            _ => false,
        }
    }

    /// Bases this type inherits fields from (union bases excluded)
    pub fn class_bases(&self, ty: &GeneratedType) -> Vec<&'m GeneratedType> {
        ty.base_types
            .iter()
            .filter_map(|b| self.get(*b))
            .filter(|b| b.kind == TypeKind::Class)
            .collect()
    }

    /// (tag property, tag value) when `ty` is a member of a discriminated union
    pub fn union_tag<'t>(&'t self, ty: &'t GeneratedType) -> Option<(&'t str, &'t str)> {
        let value = ty.discriminator_value.as_deref()?;
        ty.base_types
            .iter()
            .filter_map(|b| self.get(*b))
            .find(|b| b.kind == TypeKind::Interface)
            .and_then(|union| union.discriminator.as_ref())
            .map(|disc| (disc.property.as_str(), value))
    }

    /// Types `ty` spells by name: class bases, property and catch-all targets, union members
    pub fn referenced(&self, ty: &GeneratedType) -> Vec<&'m GeneratedType> {
        let mut ids: Vec<TypeId> = self.class_bases(ty).iter().map(|b| b.id).collect();
        ids.extend(ty.field_dependencies());
        ids.sort();
        ids.dedup();
        ids.into_iter().filter(|id| *id != ty.id).filter_map(|id| self.get(id)).collect()
    }

    /// Nullable spelling per the configured null handling
    pub fn nullable(&self, profile: &RenderProfile, inner: &str) -> String {
        match self.settings.null_handling {
            NullHandling::NullableType => profile.wrap_nullable(inner),
            NullHandling::WrapperType => profile.wrap_wrapper(inner),
        }
    }

    /// Record that a construct was replaced by an open type
    pub fn fallback(&self, location: &str, construct: &str, rendered: &str) {
        self.diagnostics.borrow_mut().fallback(location, construct, rendered);
    }

    pub fn warn(&self, location: &str, code: DiagnosticCode, message: impl Into<String>) {
        self.diagnostics.borrow_mut().warning(location, code, message);
    }

    fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics.into_inner()
    }
}

/// Whether any reference of `ty` is nullable
pub fn uses_nullable(ty: &GeneratedType) -> bool {
    fn nested(r: &TypeReference) -> bool {
        match r {
            TypeReference::Nullable(_) => true,
            TypeReference::Array(inner) | TypeReference::Map(inner) => nested(inner),
            TypeReference::Tuple(items) => items.iter().any(nested),
            TypeReference::Primitive(_) | TypeReference::Generated(_) => false,
        }
    }
    ty.properties.iter().any(|p| p.nullable || nested(&p.type_ref))
        || ty.additional_properties.as_ref().is_some_and(nested)
}

/// Identifier made unique within one scope (fields of a type, members of an enum)
pub(crate) struct ScopedNames {
    taken: HashSet<String>,
}

impl ScopedNames {
    pub(crate) fn new() -> Self {
        Self { taken: HashSet::new() }
    }

    /// `candidate`, or the first free suffixed form; `true` when a suffix was needed
    pub(crate) fn claim(&mut self, candidate: &str) -> (String, bool) {
        if self.taken.insert(candidate.to_string()) {
            return (candidate.to_string(), false);
        }
        let mut n = 2;
        loop {
            let name = with_suffix(candidate, n);
            if self.taken.insert(name.clone()) {
                return (name, true);
            }
            n += 1;
        }
    }
}

// =============================================================================
// Generated Output
// =============================================================================

/// Output from code generation
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedOutput {
    /// Logical file name → source text
    pub files: BTreeMap<String, String>,
    pub type_count: usize,
    /// Builder warnings followed by generation warnings
    pub diagnostics: Diagnostics,
}

impl GeneratedOutput {
    pub fn file(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Render `model` through `emitter`. Byte-identical for identical input.
pub fn generate(
    model: &TypeModel,
    emitter: &dyn LanguageEmitter,
    settings: &GenerationSettings,
) -> Result<GeneratedOutput, GenerationError> {
    check_references(model)?;
    let ctx = RenderContext::new(model, settings, emitter)?;

    let order: Vec<&GeneratedType> = match emitter.declaration_order() {
        DeclarationOrder::BasesFirst => model.ordered().collect(),
        DeclarationOrder::DependenciesFirst => model
            .dependency_order()
            .into_iter()
            .filter_map(|id| model.get(id))
            .collect(),
    };

    let mut files = BTreeMap::new();
    match settings.layout {
        OutputLayout::SingleFile => {
            let blocks = order.iter().map(|ty| render(emitter, ty, &ctx)).collect();
            let mut text = assemble(emitter, &order, &[], blocks, &ctx);
            let epilogue = emitter.epilogue(&order, &ctx);
            if !epilogue.is_empty() {
                text.push('\n');
                text.push_str(&epilogue);
            }
            files.insert(emitter.unit_file_name(&emitter.module_name(&settings.namespace)), text);
        }
        OutputLayout::FilePerType => {
            for ty in &order {
                let imports = ctx.referenced(ty);
                let block = render(emitter, ty, &ctx);
                let text = assemble(emitter, &[*ty], &imports, vec![block], &ctx);
                let file = emitter.unit_file_name(&emitter.module_name(ctx.type_name(ty.id)));
                files.insert(file, text);
            }
            let (name, text) = emitter.index(&order, &ctx);
            files.insert(name, text);
        }
    }

    let type_count = order.len();
    let mut diagnostics = model.diagnostics.clone();
    diagnostics.merge(ctx.into_diagnostics());

    tracing::info!(
        language = %emitter.language(),
        units = files.len(),
        types = type_count,
        "generation finished"
    );

    Ok(GeneratedOutput {
        files,
        type_count,
        diagnostics,
    })
}

/// [`generate`] with the default emitter for `language`
pub fn generate_for(
    model: &TypeModel,
    language: Language,
    settings: &GenerationSettings,
) -> Result<GeneratedOutput, GenerationError> {
    generate(model, language.emitter().as_ref(), settings)
}

fn render(emitter: &dyn LanguageEmitter, ty: &GeneratedType, ctx: &RenderContext<'_>) -> String {
    match ty.kind {
        TypeKind::Class => emitter.render_class(ty, ctx),
        TypeKind::Enum => emitter.render_enum(ty, ctx),
        TypeKind::Interface => emitter.render_interface(ty, ctx),
    }
}

fn assemble(
    emitter: &dyn LanguageEmitter,
    unit: &[&GeneratedType],
    imports: &[&GeneratedType],
    blocks: Vec<String>,
    ctx: &RenderContext<'_>,
) -> String {
    let mut out = emitter.prelude(unit, imports, ctx);
    let mut seen: HashSet<[u8; 32]> = HashSet::new();

    let mut helpers = String::new();
    for ty in unit {
        for helper in emitter.helpers(ty, ctx) {
            if seen.insert(digest(&helper)) {
                helpers.push_str(&helper);
            }
        }
    }
    if !helpers.is_empty() {
        out.push('\n');
        out.push_str(&helpers);
    }

    for block in blocks {
        if seen.insert(digest(&block)) {
            out.push('\n');
            out.push_str(&block);
        }
    }
    out
}

fn digest(text: &str) -> [u8; 32] {
    Sha256::digest(text.as_bytes()).into()
}

/// Every type id the model mentions must exist in it
fn check_references(model: &TypeModel) -> Result<(), GenerationError> {
    let known: HashMap<TypeId, &str> = model.iter().map(|t| (t.id, t.name.as_str())).collect();
    for (i, ty) in model.iter().enumerate() {
        if ty.id.index() != i {
            return Err(GenerationError::DanglingTypeReference {
                from: ty.name.clone(),
                missing: ty.id.index(),
            });
        }
        let mut mentioned = ty.dependencies();
        if let Some(disc) = &ty.discriminator {
            mentioned.extend(disc.mapping.iter().map(|(_, t)| *t));
        }
        if let Some(missing) = mentioned.into_iter().find(|id| !known.contains_key(id)) {
            return Err(GenerationError::DanglingTypeReference {
                from: ty.name.clone(),
                missing: missing.index(),
            });
        }
    }
    if let Some(missing) = model
        .root
        .iter()
        .flat_map(TypeReference::generated)
        .find(|id| !known.contains_key(id))
    {
        return Err(GenerationError::DanglingTypeReference {
            from: "<root>".to_string(),
            missing: missing.index(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::build;
    use crate::resolve::ResolutionSession;
    use crate::schema::parse_str;

    fn model(text: &str) -> TypeModel {
        let doc = parse_str(text, "file:///pets.json").unwrap();
        let resolved = ResolutionSession::offline().resolve_local(doc).unwrap();
        build(&resolved, &GenerationSettings::default()).unwrap()
    }

    const PETS: &str = r##"{"definitions":{
        "Pet":{"type":"object","properties":{"name":{"type":"string"},"owner":{"$ref":"#/definitions/Owner"}},"required":["name"]},
        "Owner":{"type":"object","properties":{"pets":{"type":"array","items":{"$ref":"#/definitions/Pet"}},"nick":{"type":["string","null"]}}}}}"##;

    #[test]
    fn test_generate_is_deterministic() {
        let m = model(PETS);
        let settings = GenerationSettings::default();
        for language in Language::ALL {
            let a = generate_for(&m, language, &settings).unwrap();
            let b = generate_for(&m, language, &settings).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.type_count, 2);
        }
    }

    #[test]
    fn test_single_file_named_after_namespace() {
        let m = model(PETS);
        let settings = GenerationSettings::default().with_namespace("petstore");
        let out = generate_for(&m, Language::Rust, &settings).unwrap();
        assert_eq!(out.files.keys().collect::<Vec<_>>(), vec!["petstore.rs"]);
        let out = generate_for(&m, Language::TypeScript, &settings).unwrap();
        assert!(out.file("petstore.ts").is_some());
    }

    #[test]
    fn test_file_per_type_layout_has_index() {
        let m = model(PETS);
        let settings = GenerationSettings {
            layout: OutputLayout::FilePerType,
            ..Default::default()
        };
        let rust = generate_for(&m, Language::Rust, &settings).unwrap();
        let names: Vec<&String> = rust.files.keys().collect();
        assert_eq!(names, vec!["mod.rs", "owner.rs", "pet.rs"]);

        let ts = generate_for(&m, Language::TypeScript, &settings).unwrap();
        assert!(ts.file("index.ts").unwrap().contains("export * from \"./Pet\";"));

        let py = generate_for(&m, Language::Python, &settings).unwrap();
        assert!(py.file("__init__.py").unwrap().contains("from .pet import Pet"));
    }

    #[test]
    fn test_wrapper_helper_emitted_once() {
        let m = model(PETS);
        let settings = GenerationSettings {
            null_handling: NullHandling::WrapperType,
            ..Default::default()
        };
        let out = generate_for(&m, Language::Rust, &settings).unwrap();
        let text = out.file("generated.rs").unwrap();
        assert_eq!(text.matches("pub type Nullable<T> = Option<T>;").count(), 1);
        assert!(text.contains("Nullable<String>"));
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let mut m = model(PETS);
        m.types[0].base_types.push(TypeId(42));
        let err = generate_for(&m, Language::Rust, &GenerationSettings::default()).unwrap_err();
        assert!(matches!(err, GenerationError::DanglingTypeReference { missing: 42, .. }));
    }

    #[test]
    fn test_reserved_type_name_suffixed() {
        let m = model(r#"{"definitions":{"Option":{"type":"object","properties":{"a":{"type":"string"}}}}}"#);
        let out = generate_for(&m, Language::Rust, &GenerationSettings::default()).unwrap();
        assert!(out.file("generated.rs").unwrap().contains("pub struct Option2 {"));
    }
}
