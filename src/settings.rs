//! Generation Settings
//!
//! Language-agnostic knobs shared by the model builder and the code
//! generator engine. Every field is serde-defaulted so partial TOML sections
//! and `TYPEGEN__GENERATION__*` overrides deserialize cleanly.

use serde::{Deserialize, Serialize};

use crate::naming::NamingStrategy;

/// How `allOf` composition becomes types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllOfStrategy {
    /// Named object members become base types
    #[default]
    Inheritance,
    /// All members' properties are merged into one flat type
    Merge,
}

/// How nullable references are spelled in emitted code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NullHandling {
    /// Native spelling: `Option<T>`, `T | null`, `Optional[T]`
    #[default]
    NullableType,
    /// One shared `Nullable<T>` alias per output unit
    WrapperType,
}

/// How rendered types are grouped into output units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputLayout {
    /// One unit named after the namespace
    #[default]
    SingleFile,
    /// One unit per type plus an index unit
    FilePerType,
}

/// Settings for one build + generate run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub all_of_strategy: AllOfStrategy,
    pub null_handling: NullHandling,
    /// Property naming; `None` means each language's convention
    pub naming_strategy: Option<NamingStrategy>,
    pub namespace: String,
    pub generate_default_constructors: bool,
    /// Name for the document root when it has no definition name or title
    pub type_name_generation_hint: Option<String>,
    /// Treat `"default": null` as making a property nullable
    pub null_default_is_nullable: bool,
    pub layout: OutputLayout,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            all_of_strategy: AllOfStrategy::Inheritance,
            null_handling: NullHandling::NullableType,
            naming_strategy: None,
            namespace: "generated".to_string(),
            generate_default_constructors: false,
            type_name_generation_hint: None,
            null_default_is_nullable: true,
            layout: OutputLayout::SingleFile,
        }
    }
}

impl GenerationSettings {
    pub fn with_strategy(mut self, strategy: AllOfStrategy) -> Self {
        self.all_of_strategy = strategy;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_root_name(mut self, hint: impl Into<String>) -> Self {
        self.type_name_generation_hint = Some(hint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_section_uses_defaults() {
        let settings: GenerationSettings =
            toml::from_str("all_of_strategy = \"merge\"\nnull_handling = \"wrapperType\"").unwrap();
        assert_eq!(settings.all_of_strategy, AllOfStrategy::Merge);
        assert_eq!(settings.null_handling, NullHandling::WrapperType);
        assert_eq!(settings.namespace, "generated");
        assert_eq!(settings.layout, OutputLayout::SingleFile);
        assert!(settings.null_default_is_nullable);
    }

    #[test]
    fn test_naming_strategy_names() {
        let settings: GenerationSettings = toml::from_str("naming_strategy = \"camel\"").unwrap();
        assert_eq!(settings.naming_strategy, Some(NamingStrategy::Camel));
    }
}
