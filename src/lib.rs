//! schema-typegen
//!
//! Reads JSON Schema (draft-04 through 2019-09) and OpenAPI 3 schema
//! documents, resolves every `$ref` into one shared node graph, and generates
//! deterministic type declarations for Rust, TypeScript and Python.
//!
//! ## Pipeline
//!
//! ```text
//! bytes ──parse──▶ Document ──resolve──▶ ResolvedDocument ──build──▶ TypeModel ──generate──▶ files
//!                   (arena)     (loader,      (one node per            (classes,         (per language
//!                               single-flight  pointer, cycles          unions, enums)     emitter)
//!                               cache)         as shared ids)
//! ```
//!
//! Parsing, building and generation are synchronous. Only resolution of
//! external documents touches I/O, through an injected
//! [`resolve::DocumentLoader`].

pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod naming;
pub mod resolve;
pub mod schema;
pub mod settings;

pub use codegen::{generate, generate_for, GeneratedOutput, Language, LanguageEmitter};
pub use config::TypegenConfig;
pub use diagnostics::{DiagnosticCode, Diagnostics, Severity};
pub use error::{BuildError, BuildErrors, Error, GenerationError, LoadError, ParseError, ResolutionError, ResolutionErrors, Result};
pub use model::{build, GeneratedProperty, GeneratedType, TypeId, TypeKind, TypeModel, TypeReference};
pub use resolve::{resolve, DocumentLoader, MemoryLoader, ResolutionSession, ResolvedDocument};
pub use schema::{parse, parse_str, parse_with, serialize, Document, NodeId, SchemaDialect, SchemaNode};
pub use settings::{AllOfStrategy, GenerationSettings, NullHandling, OutputLayout};

/// Parse, resolve, build and generate one self-contained document
pub fn generate_from_str(
    text: &str,
    base_uri: &str,
    language: Language,
    settings: &GenerationSettings,
) -> Result<GeneratedOutput> {
    let document = parse_str(text, base_uri)?;
    let resolved = ResolutionSession::offline().resolve_local(document)?;
    let model = build(&resolved, settings)?;
    Ok(generate_for(&model, language, settings)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_from_str() {
        let out = generate_from_str(
            r#"{"title":"Person","type":"object","properties":{"name":{"type":"string"}},"required":["name"]}"#,
            "file:///person.json",
            Language::Rust,
            &GenerationSettings::default(),
        )
        .unwrap();
        assert_eq!(out.type_count, 1);
        assert!(out.file("generated.rs").unwrap().contains("pub name: String,"));
    }

    #[test]
    fn test_parse_error_surfaces_through_pipeline() {
        let err = generate_from_str(r#"{"type": 5}"#, "file:///bad.json", Language::Rust, &GenerationSettings::default())
            .unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::InvalidKeyword { .. })));
    }
}
