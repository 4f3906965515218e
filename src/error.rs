//! Error types for parsing, resolution, model building and generation
//!
//! Each pipeline stage has its own error type so callers can tell a
//! malformed document from a dangling pointer or an impossible merge:
//! - [`ParseError`]: malformed JSON or a keyword with the wrong value shape
//! - [`ResolutionError`]: one unresolvable pointer (collected in [`ResolutionErrors`])
//! - [`BuildError`]: one type that could not be built (collected in [`BuildErrors`])
//! - [`GenerationError`]: a model the emitter cannot produce meaningful output for

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::model::TypeModel;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Parse Errors
// =============================================================================

/// Structural parse failure. Fatal for the document being parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed JSON at line {line}, column {column}: {message}")]
    Malformed {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Invalid value for '{keyword}' at {pointer}: expected {expected}")]
    InvalidKeyword {
        pointer: String,
        keyword: String,
        expected: String,
    },

    #[error("Invalid base URI '{uri}': {message}")]
    InvalidBaseUri { uri: String, message: String },
}

impl ParseError {
    pub(crate) fn keyword(pointer: &str, keyword: &str, expected: impl Into<String>) -> Self {
        Self::InvalidKeyword {
            pointer: pointer.to_string(),
            keyword: keyword.to_string(),
            expected: expected.into(),
        }
    }

    /// JSON pointer of the offending location, when the error has one
    pub fn pointer(&self) -> Option<&str> {
        match self {
            Self::InvalidKeyword { pointer, .. } => Some(pointer),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Load Errors
// =============================================================================

/// Failure reported by a [`crate::resolve::DocumentLoader`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Load timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unsupported URI scheme: {0}")]
    UnsupportedScheme(String),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

// =============================================================================
// Resolution Errors
// =============================================================================

/// Why a pointer could not be resolved
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionCause {
    #[error("malformed reference URI: {0}")]
    MalformedUri(String),

    #[error("no schema at fragment '{0}'")]
    MissingTarget(String),

    #[error("document '{0}' is not loaded")]
    DocumentNotLoaded(String),

    #[error("loader failed: {0}")]
    Load(LoadError),

    #[error("referenced document is malformed: {0}")]
    Parse(ParseError),

    #[error("reference chain never reaches a schema: {0}")]
    AliasCycle(String),

    #[error("required property '{0}' is not declared in properties")]
    UndeclaredRequired(String),
}

/// An unresolvable pointer and its cause
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{pointer}: {cause}")]
pub struct ResolutionError {
    /// Absolute location of the reference (or node) that failed
    pub pointer: String,
    pub cause: ResolutionCause,
}

impl ResolutionError {
    pub fn new(pointer: impl Into<String>, cause: ResolutionCause) -> Self {
        Self {
            pointer: pointer.into(),
            cause,
        }
    }
}

/// Every pointer that failed in one resolution session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionErrors {
    errors: Vec<ResolutionError>,
}

impl ResolutionErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ResolutionError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolutionError> {
        self.errors.iter()
    }

    /// Look up the error reported for one pointer
    pub fn for_pointer(&self, pointer: &str) -> Option<&ResolutionError> {
        self.errors.iter().find(|e| e.pointer == pointer)
    }
}

impl fmt::Display for ResolutionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} unresolved pointer(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolutionErrors {}

impl IntoIterator for ResolutionErrors {
    type Item = ResolutionError;
    type IntoIter = std::vec::IntoIter<ResolutionError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

// =============================================================================
// Build Errors
// =============================================================================

/// Why a type could not be built
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildErrorKind {
    #[error("property '{property}' has incompatible types across composed schemas: {left} vs {right}")]
    IncompatibleMerge {
        property: String,
        left: String,
        right: String,
    },

    #[error("name '{candidate}' does not produce a valid identifier")]
    InvalidIdentifier { candidate: String },

    #[error("type inherits from itself through {via}")]
    CircularInheritance { via: String },
}

/// A type that failed to build, identified by its schema pointer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{type_name} ({pointer}): {kind}")]
pub struct BuildError {
    pub type_name: String,
    pub pointer: String,
    pub kind: BuildErrorKind,
}

/// All per-type failures of one build, plus the model of the siblings that succeeded
#[derive(Debug, Clone)]
pub struct BuildErrors {
    pub errors: Vec<BuildError>,
    pub partial: Box<TypeModel>,
}

impl fmt::Display for BuildErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} type(s) failed to build", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildErrors {}

// =============================================================================
// Generation Errors
// =============================================================================

/// Conditions that make emitted output meaningless
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("type '{from}' references type #{missing} which is not in the model")]
    DanglingTypeReference { from: String, missing: usize },

    #[error("emitter '{language}' produced no identifier for '{name}'")]
    InvalidIdentifier { language: String, name: String },
}

// =============================================================================
// Pipeline Error
// =============================================================================

/// Errors surfaced by the end-to-end pipeline helpers
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Resolution failed: {0}")]
    Resolution(#[from] ResolutionErrors),

    #[error("Build failed: {0}")]
    Build(#[from] BuildErrors),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
