//! Type Name Registry
//!
//! Assigns unique PascalCase type names within one namespace. The first
//! claimant of a name keeps it; later claimants get a numeric suffix
//! starting at 2. Names are language-agnostic here: emitters apply their
//! own keyword escaping on top.

use std::collections::HashMap;

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::BuildErrorKind;
use crate::naming::{to_pascal_case, with_suffix};

/// A claimed name and the source it was claimed for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedName {
    pub name: String,
    /// Location of the schema that claimed it (for diagnostics)
    pub source: String,
    /// Whether a suffix was needed
    pub disambiguated: bool,
}

/// Name → claimant table for one namespace
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    claimed: HashMap<String, ClaimedName>,
    next_suffix: HashMap<String, usize>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a name derived from `raw`. Collisions are reported as `I001`.
    pub fn claim(
        &mut self,
        raw: &str,
        source: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<String, BuildErrorKind> {
        let base = to_pascal_case(raw);
        if base.is_empty() {
            return Err(BuildErrorKind::InvalidIdentifier {
                candidate: raw.to_string(),
            });
        }

        if !self.claimed.contains_key(&base) {
            self.insert(base.clone(), source, false);
            return Ok(base);
        }

        let mut n = self.next_suffix.get(&base).copied().unwrap_or(2);
        let mut candidate = with_suffix(&base, n);
        while self.claimed.contains_key(&candidate) {
            n += 1;
            candidate = with_suffix(&base, n);
        }
        self.next_suffix.insert(base.clone(), n + 1);

        let first = self.claimed.get(&base).map(|c| c.source.clone()).unwrap_or_default();
        diagnostics.warning(
            source,
            DiagnosticCode::IdentifierCollision,
            format!("type name '{}' already used by {}; using '{}'", base, first, candidate),
        );

        self.insert(candidate.clone(), source, true);
        Ok(candidate)
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        self.claimed.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ClaimedName> {
        self.claimed.get(name)
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }

    fn insert(&mut self, name: String, source: &str, disambiguated: bool) {
        self.claimed.insert(
            name.clone(),
            ClaimedName {
                name,
                source: source.to_string(),
                disambiguated,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_claimant_keeps_name() {
        let mut registry = NameRegistry::new();
        let mut diagnostics = Diagnostics::new();

        assert_eq!(registry.claim("pet", "#/a", &mut diagnostics).unwrap(), "Pet");
        assert_eq!(registry.claim("Pet", "#/b", &mut diagnostics).unwrap(), "Pet2");
        assert_eq!(registry.claim("pet_", "#/c", &mut diagnostics).unwrap(), "Pet3");

        assert!(!registry.get("Pet").unwrap().disambiguated);
        assert!(registry.get("Pet2").unwrap().disambiguated);
        assert_eq!(diagnostics.with_code(DiagnosticCode::IdentifierCollision).count(), 2);
    }

    #[test]
    fn test_suffix_skips_taken_names() {
        let mut registry = NameRegistry::new();
        let mut diagnostics = Diagnostics::new();

        registry.claim("Item2", "#/x", &mut diagnostics).unwrap();
        registry.claim("Item", "#/y", &mut diagnostics).unwrap();
        assert_eq!(registry.claim("Item", "#/z", &mut diagnostics).unwrap(), "Item3");
    }

    #[test]
    fn test_unusable_name_is_an_error() {
        let mut registry = NameRegistry::new();
        let err = registry.claim("@@@", "#/q", &mut Diagnostics::new()).unwrap_err();
        assert_eq!(err, BuildErrorKind::InvalidIdentifier { candidate: "@@@".into() });
    }
}
