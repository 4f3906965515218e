//! Configuration management for schema-typegen
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (typegen.toml)
//! - Environment variables (TYPEGEN__*)
//!
//! ## Example config file (typegen.toml):
//! ```toml
//! [input]
//! dialect = "openApi3"
//! load_timeout_secs = 10
//!
//! [generation]
//! all_of_strategy = "merge"
//! null_handling = "wrapperType"
//! namespace = "petstore"
//!
//! [output]
//! languages = ["rust", "typescript"]
//! directory = "generated"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::codegen::Language;
use crate::schema::SchemaDialect;
use crate::settings::GenerationSettings;

/// Main configuration for schema-typegen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypegenConfig {
    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub output: OutputConfig,
}

/// How input documents are read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Dialect to parse with; detected from `$schema`/`openapi` when unset
    #[serde(default)]
    pub dialect: Option<SchemaDialect>,

    /// Timeout for each external document load
    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: u64,
}

/// Where and what to generate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_languages")]
    pub languages: Vec<Language>,

    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
}

fn default_load_timeout() -> u64 {
    30
}

fn default_languages() -> Vec<Language> {
    vec![Language::Rust]
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("generated")
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dialect: None,
            load_timeout_secs: default_load_timeout(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            directory: default_output_dir(),
        }
    }
}

impl InputConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

impl TypegenConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["typegen.toml", ".typegen.toml", "config/typegen.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(dirs) = directories::ProjectDirs::from("dev", "schema-typegen", "typegen") {
            let xdg_config = dirs.config_dir().join("typegen.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // TYPEGEN__GENERATION__NAMESPACE=petstore
        builder = builder.add_source(
            Environment::with_prefix("TYPEGEN")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let config: Self = config.try_deserialize()?;
        tracing::debug!(
            languages = config.output.languages.len(),
            namespace = %config.generation.namespace,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Output directory, resolved against the working directory when relative
    pub fn output_dir(&self) -> std::io::Result<PathBuf> {
        if self.output.directory.is_absolute() {
            Ok(self.output.directory.clone())
        } else {
            Ok(std::env::current_dir()?.join(&self.output.directory))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{AllOfStrategy, NullHandling};

    #[test]
    fn test_default_config() {
        let config = TypegenConfig::default();
        assert_eq!(config.input.load_timeout(), Duration::from_secs(30));
        assert_eq!(config.output.languages, vec![Language::Rust]);
        assert_eq!(config.generation.namespace, "generated");
    }

    #[test]
    fn test_serialize_config() {
        let config = TypegenConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[input]"));
        assert!(toml_str.contains("[generation]"));
        assert!(toml_str.contains("[output]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[input]
dialect = "openApi3"

[generation]
all_of_strategy = "merge"
null_handling = "wrapperType"
namespace = "petstore"

[output]
languages = ["typescript", "python"]
"#,
        )
        .unwrap();

        let config = TypegenConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.input.dialect, Some(SchemaDialect::OpenApi3));
        assert_eq!(config.generation.all_of_strategy, AllOfStrategy::Merge);
        assert_eq!(config.generation.null_handling, NullHandling::WrapperType);
        assert_eq!(config.generation.namespace, "petstore");
        assert_eq!(config.output.languages, vec![Language::TypeScript, Language::Python]);
        assert_eq!(config.output.directory, PathBuf::from("generated"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typegen.toml");
        let mut config = TypegenConfig::default();
        config.generation.namespace = "billing".to_string();
        config.output.languages = vec![Language::Python];
        config.save(&path).unwrap();

        let loaded = TypegenConfig::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.generation.namespace, "billing");
        assert_eq!(loaded.output.languages, vec![Language::Python]);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TypegenConfig::load_from(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_output_dir_resolution() {
        let mut config = TypegenConfig::default();
        let relative = config.output_dir().unwrap();
        assert!(relative.is_absolute());
        assert!(relative.ends_with("generated"));

        let dir = tempfile::tempdir().unwrap();
        config.output.directory = dir.path().to_path_buf();
        assert_eq!(config.output_dir().unwrap(), dir.path());
    }
}
