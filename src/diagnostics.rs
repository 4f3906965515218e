//! Diagnostics
//!
//! Collects warnings raised while building the type model and emitting code.
//! Fallbacks (an open type standing in for a construct the target cannot
//! express) are always recorded here, never silently dropped.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Unions ===
    /// oneOf/anyOf without discriminator degraded to an open type
    UntaggedUnion,
    /// Enum values of mixed JSON types degraded to an open type
    MixedEnum,
    /// Several non-null types in `type` degraded to an open type
    MultipleTypes,

    // === Composition ===
    /// allOf member that is neither object-like nor a named base
    UnsupportedAllOfMember,
    /// Discriminator mapping names a target outside the union members
    DiscriminatorTargetOutsideUnion,
    /// Same schema is mapped under several tags; the first tag is used
    DuplicateDiscriminatorTarget,

    // === Emission ===
    /// Emitter replaced a construct it cannot express with an open type
    EmitterFallback,
    /// Emitted identifier was disambiguated after keyword escaping
    IdentifierCollision,
    /// Enum members would collide after casing conversion
    EnumMemberConflict,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UntaggedUnion => "W001",
            Self::MixedEnum => "W002",
            Self::MultipleTypes => "W003",
            Self::UnsupportedAllOfMember => "W004",
            Self::DiscriminatorTargetOutsideUnion => "W005",
            Self::DuplicateDiscriminatorTarget => "W006",
            Self::EmitterFallback => "W007",
            Self::IdentifierCollision => "I001",
            Self::EnumMemberConflict => "I002",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::IdentifierCollision | Self::EnumMemberConflict => Severity::Info,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Schema pointer or type name the diagnostic is about
    pub location: String,
    pub code: DiagnosticCode,
    pub message: String,
    /// Additional context (member pointers, rendered fallback, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(location: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.location
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Ordered collection of diagnostics from build and emission passes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: DiagnosticItem) {
        match item.severity() {
            Severity::Info => tracing::info!(code = item.code.as_str(), location = %item.location, "{}", item.message),
            Severity::Warning => tracing::warn!(code = item.code.as_str(), location = %item.location, "{}", item.message),
        }
        self.items.push(item);
    }

    /// Add a warning
    pub fn warning(
        &mut self,
        location: impl Into<String>,
        code: DiagnosticCode,
        message: impl Into<String>,
    ) {
        self.push(DiagnosticItem::new(location, code, message));
    }

    /// Record that `construct` was replaced by an open type
    pub fn fallback(&mut self, location: impl Into<String>, construct: &str, rendered: &str) {
        self.push(
            DiagnosticItem::new(
                location,
                DiagnosticCode::EmitterFallback,
                format!("{} cannot be expressed; using open type", construct),
            )
            .with_context(format!("rendered as {}", rendered)),
        );
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }

    /// Items carrying a given code
    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }

    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Merge another Diagnostics into this one
    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Format all diagnostics for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if !self.is_empty() {
            output.push_str(&format!("\n{} warning(s)\n", self.warning_count()));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl IntoIterator for Diagnostics {
    type Item = DiagnosticItem;
    type IntoIter = std::vec::IntoIter<DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticItem;
    type IntoIter = std::slice::Iter<'a, DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
