//! objql CLI - Compile object queries against an entity mapping
//!
//! Usage:
//!   objql compile --mapping <mapping.toml> --query <query.json> [--output json|summary]
//!   objql entities --mapping <mapping.toml>
//!   objql check --mapping <mapping.toml>
//!
//! Examples:
//!   objql compile --mapping demos/art.toml --query demos/artist_paintings.json
//!   objql entities --mapping demos/art.toml
//!
//! When `--mapping` is omitted, `[mapping] path` from the settings file is
//! used. Set `OBJQL_LOG=debug` to trace compilation.

use clap::{Parser, Subcommand, ValueEnum};
use objql::ast::{QueryDocument, Statement};
use objql::catalog::EntityCatalog;
use objql::compiler::{CompiledExpression, Compiler, ResultComponent};
use objql::config::Settings;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "objql")]
#[command(about = "objql - Compile object queries into resolved expressions")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to $OBJQL_CONFIG, ./objql.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query parse tree
    Compile {
        /// Entity mapping file
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// Query parse tree as JSON
        #[arg(short, long)]
        query: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "summary")]
        output: OutputFormat,
    },

    /// List the entities of a mapping
    Entities {
        /// Entity mapping file
        #[arg(short, long)]
        mapping: Option<PathBuf>,
    },

    /// Validate a mapping without compiling anything
    Check {
        /// Entity mapping file
        #[arg(short, long)]
        mapping: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Full compiled expression as JSON
    Json,
    /// Human-readable overview
    Summary,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("OBJQL_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Compile {
            mapping,
            query,
            output,
        } => cmd_compile(&settings, mapping, query, output),
        Commands::Entities { mapping } => cmd_entities(&settings, mapping),
        Commands::Check { mapping } => cmd_check(&settings, mapping),
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings, objql::config::SettingsError> {
    match path {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    }
}

fn load_catalog(settings: &Settings, mapping: Option<PathBuf>) -> Result<EntityCatalog, String> {
    let path = match mapping {
        Some(path) => path,
        None => settings
            .mapping
            .resolved_path()
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "no mapping given; pass --mapping or set [mapping] path".to_string())?,
    };
    EntityCatalog::from_file(&path).map_err(|e| format!("'{}': {}", path.display(), e))
}

fn read_query(path: &Path) -> Result<QueryDocument, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Error reading file '{}': {}", path.display(), e))?;

    // Accept either a full document or a bare statement.
    if let Ok(document) = serde_json::from_str::<QueryDocument>(&content) {
        return Ok(document);
    }
    serde_json::from_str::<Statement>(&content)
        .map(|statement| QueryDocument {
            source: String::new(),
            statement,
        })
        .map_err(|e| format!("Error parsing query '{}': {}", path.display(), e))
}

fn cmd_compile(
    settings: &Settings,
    mapping: Option<PathBuf>,
    query: PathBuf,
    output: OutputFormat,
) -> ExitCode {
    let catalog = match load_catalog(settings, mapping) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading mapping {}", e);
            return ExitCode::FAILURE;
        }
    };

    let document = match read_query(&query) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let compiler = Compiler::new(catalog).with_settings(settings.compiler.clone());
    let compiled = match compiler.compile(&document.source, &document.statement) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Compilation failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match output {
        OutputFormat::Json => match serde_json::to_string_pretty(&compiled) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing compiled expression: {}", e);
                return ExitCode::FAILURE;
            }
        },
        OutputFormat::Summary => print_summary(&compiled),
    }
    ExitCode::SUCCESS
}

fn print_summary(compiled: &CompiledExpression) {
    if !compiled.source().is_empty() {
        println!("Query: {}", compiled.source());
    }
    println!(
        "Root: {} ({})",
        compiled.root_id(),
        compiled.root_descriptor().name
    );

    println!();
    println!("Variables:");
    for binding in compiled.bindings() {
        println!("  {:<30} {:<16} {:?}", binding.key, binding.entity.name, binding.origin);
    }

    let traversals: Vec<_> = compiled.traversals().collect();
    if !traversals.is_empty() {
        println!();
        println!("Traversals:");
        for t in traversals {
            let hops: Vec<&str> = t.hops.iter().map(|h| h.name.as_str()).collect();
            println!(
                "  {:<30} via {}{}",
                t.target,
                hops.join(" -> "),
                if t.outer { " (outer)" } else { "" }
            );
        }
    }

    if let Some(tree) = compiled.prefetch_tree() {
        println!();
        println!("Prefetch:");
        for node in tree.nodes() {
            let depth = node.path.matches('.').count();
            println!(
                "  {}{} [{}{}]",
                "  ".repeat(depth),
                node.name,
                node.semantics,
                if node.phantom { ", phantom" } else { "" }
            );
        }
    }

    if let Some(result) = compiled.result() {
        println!();
        println!("Result:");
        for (position, component) in result.components().iter().enumerate() {
            match component {
                ResultComponent::Scalar(s) => println!(
                    "  {}: scalar {} : {}",
                    position,
                    s.column,
                    s.value_type.map_or("unknown", |t| t.as_str())
                ),
                ResultComponent::Entity(e) => {
                    println!("  {}: entity {} as {}", position, e.entity, e.variable);
                    for f in &e.fields {
                        println!("       {:<28} {}", f.field, f.column);
                    }
                }
            }
        }
    }
}

fn cmd_entities(settings: &Settings, mapping: Option<PathBuf>) -> ExitCode {
    let catalog = match load_catalog(settings, mapping) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading mapping {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Entities ({}):", catalog.len());
    for entity in catalog.entities() {
        let parent = entity
            .super_entity
            .as_deref()
            .map(|s| format!(" extends {}", s))
            .unwrap_or_default();
        println!("  {} -> {}{}", entity.name, entity.table, parent);
        for attr in &entity.attributes {
            println!("    {:<24} {:<20} {}", attr.name, attr.column, attr.value_type);
        }
        for rel in &entity.relationships {
            println!(
                "    {:<24} {} {}",
                rel.name,
                if rel.to_many { "to-many" } else { "to-one " },
                rel.target
            );
        }
    }
    ExitCode::SUCCESS
}

fn cmd_check(settings: &Settings, mapping: Option<PathBuf>) -> ExitCode {
    match load_catalog(settings, mapping) {
        Ok(catalog) => {
            println!("✓ Mapping is valid");
            println!("  Entities: {}", catalog.len());
            println!("  Hash: {}", catalog.content_hash());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Invalid mapping {}", e);
            ExitCode::FAILURE
        }
    }
}
