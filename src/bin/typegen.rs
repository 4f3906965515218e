//! schema-typegen CLI
//!
//! Generates type declarations from a schema document, or re-serializes a
//! document to check round-trip fidelity.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use url::Url;

use schema_typegen::resolve::DocumentCache;
use schema_typegen::{
    build, generate_for, parse, parse_with, AllOfStrategy, Diagnostics, DocumentLoader, Language, LoadError,
    OutputLayout, ResolutionSession, ResolvedDocument, SchemaDialect, TypegenConfig,
};

#[derive(Parser)]
#[command(name = "schema-typegen")]
#[command(about = "Generate Rust, TypeScript and Python types from JSON Schema / OpenAPI documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate types for one or more languages
    Generate {
        /// Schema document
        input: PathBuf,

        /// Target language (repeatable); defaults to the configured languages
        #[arg(short, long = "lang")]
        lang: Vec<Language>,

        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Input dialect (draft4, draft6, draft7, 2019-09, openApi3)
        #[arg(long)]
        dialect: Option<SchemaDialect>,

        /// Config file layered over the default locations
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Namespace / module name of the generated code
        #[arg(long)]
        namespace: Option<String>,

        /// allOf handling: inheritance or merge
        #[arg(long)]
        strategy: Option<Strategy>,

        /// Name for an untitled document root
        #[arg(long)]
        root_name: Option<String>,

        /// One file per type plus an index
        #[arg(long)]
        file_per_type: bool,
    },

    /// Parse and resolve a document, then print it re-serialized
    Roundtrip {
        /// Schema document
        input: PathBuf,

        #[arg(long)]
        dialect: Option<SchemaDialect>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Strategy {
    Inheritance,
    Merge,
}

impl From<Strategy> for AllOfStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Inheritance => AllOfStrategy::Inheritance,
            Strategy::Merge => AllOfStrategy::Merge,
        }
    }
}

/// Reads `file://` documents; any other scheme is refused
struct FileLoader;

#[async_trait]
impl DocumentLoader for FileLoader {
    async fn load(&self, uri: &Url) -> Result<Vec<u8>, LoadError> {
        if uri.scheme() != "file" {
            return Err(LoadError::UnsupportedScheme(uri.scheme().to_string()));
        }
        let path = uri
            .to_file_path()
            .map_err(|_| LoadError::Other(format!("not a local path: {}", uri)))?;
        tracing::debug!(path = %path.display(), "reading document");
        Ok(tokio::fs::read(&path).await?)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate {
            input,
            lang,
            out,
            dialect,
            config,
            namespace,
            strategy,
            root_name,
            file_per_type,
        } => {
            let mut config = TypegenConfig::load_from(config.as_deref()).context("loading configuration")?;
            if let Some(namespace) = namespace {
                config.generation.namespace = namespace;
            }
            if let Some(strategy) = strategy {
                config.generation.all_of_strategy = strategy.into();
            }
            if let Some(root_name) = root_name {
                config.generation.type_name_generation_hint = Some(root_name);
            }
            if file_per_type {
                config.generation.layout = OutputLayout::FilePerType;
            }
            if let Some(out) = out {
                config.output.directory = out;
            }
            if !lang.is_empty() {
                config.output.languages = lang;
            }
            let dialect = dialect.or(config.input.dialect);

            let resolved = load_and_resolve(&input, dialect, &config).await?;
            let model = match build(&resolved, &config.generation) {
                Ok(model) => model,
                Err(errors) => {
                    report(&errors.partial.diagnostics);
                    return Err(errors.into());
                }
            };

            let out_dir = config.output_dir().context("resolving the output directory")?;
            let mut diagnostics = Diagnostics::new();
            for language in &config.output.languages {
                let output = generate_for(&model, *language, &config.generation)?;
                let dir = out_dir.join(language.as_str());
                tokio::fs::create_dir_all(&dir)
                    .await
                    .with_context(|| format!("creating {}", dir.display()))?;
                for (name, text) in &output.files {
                    let path = dir.join(name);
                    tokio::fs::write(&path, text)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                }
                println!("{}: {} type(s), {} file(s) in {}", language, output.type_count, output.files.len(), dir.display());
                diagnostics.merge(output.diagnostics);
            }
            report(&diagnostics);
            Ok(())
        }

        Commands::Roundtrip { input, dialect } => {
            let config = TypegenConfig::load().context("loading configuration")?;
            let resolved = load_and_resolve(&input, dialect.or(config.input.dialect), &config).await?;
            let text = String::from_utf8(resolved.serialize()).context("serialized document is not UTF-8")?;
            println!("{}", text);
            Ok(())
        }
    }
}

async fn load_and_resolve(
    input: &Path,
    dialect: Option<SchemaDialect>,
    config: &TypegenConfig,
) -> anyhow::Result<ResolvedDocument> {
    let path = std::fs::canonicalize(input).with_context(|| format!("reading {}", input.display()))?;
    let Ok(uri) = Url::from_file_path(&path) else {
        bail!("cannot form a file URI for {}", path.display());
    };
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let document = match dialect {
        Some(dialect) => parse_with(&bytes, uri.as_str(), dialect)?,
        None => parse(&bytes, uri.as_str())?,
    };
    let cache = DocumentCache::new(Arc::new(FileLoader), document.dialect).with_timeout(config.input.load_timeout());
    let resolved = ResolutionSession::new(Arc::new(cache)).resolve(document).await?;
    Ok(resolved)
}

fn report(diagnostics: &Diagnostics) {
    if !diagnostics.is_empty() {
        eprint!("{}", diagnostics.format_all());
    }
}
