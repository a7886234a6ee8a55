//! Schema Logic CLI
//!
//! Answers emptiness, subsumption and equivalence questions about JSON
//! Schema files, prints canonical DNFs and checks version compatibility.

use anyhow::Context;
use clap::{Parser, Subcommand};
use familiar_schema_logic::config::LogicConfig;
use familiar_schema_logic::{
    schema_describes_empty_set, schema_describes_subset, schemas_are_equivalent, to_dnf, CompatibilityChecker,
    CompatibilityVerdict, Options,
};
use semver::Version;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-logic")]
#[command(about = "Reason about JSON Schemas as logical predicates")]
struct Cli {
    /// Configuration file (defaults to schema-logic.toml lookup)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URI for input schemas without an $id
    #[arg(long)]
    base_uri: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Does the schema admit no value at all?
    Empty {
        schema: PathBuf,
    },

    /// Is every value of A also a value of B?
    Subset {
        a: PathBuf,
        b: PathBuf,
    },

    /// Do A and B admit exactly the same values?
    Equivalent {
        a: PathBuf,
        b: PathBuf,
    },

    /// Print the canonical disjunctive normal form
    Dnf {
        schema: PathBuf,
    },

    /// Check that a schema change is backward compatible
    Compat {
        old: PathBuf,
        new: PathBuf,
        /// Version of the old schema
        #[arg(long, requires = "new_version")]
        old_version: Option<Version>,
        /// Version of the new schema
        #[arg(long, requires = "old_version")]
        new_version: Option<Version>,
        /// Undecided checks count as breaking
        #[arg(long)]
        strict: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn read_schema(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn tri_state(answer: Option<bool>) -> &'static str {
    match answer {
        Some(true) => "true",
        Some(false) => "false",
        None => "unknown",
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let path = cli.config.as_deref().and_then(Path::to_str);
    let mut config = LogicConfig::load_from(path).context("loading configuration")?;
    if let Some(base_uri) = cli.base_uri {
        config.resolution.base_uri = Some(base_uri);
    }
    let options: Options = config.to_options()?;

    match cli.command {
        Commands::Empty { schema } => {
            let schema = read_schema(&schema)?;
            println!("{}", tri_state(schema_describes_empty_set(&schema, &options)?));
        }

        Commands::Subset { a, b } => {
            let (a, b) = (read_schema(&a)?, read_schema(&b)?);
            println!("{}", tri_state(schema_describes_subset(&a, &b, &options)?));
        }

        Commands::Equivalent { a, b } => {
            let (a, b) = (read_schema(&a)?, read_schema(&b)?);
            println!("{}", tri_state(schemas_are_equivalent(&a, &b, &options)?));
        }

        Commands::Dnf { schema } => {
            let schema = read_schema(&schema)?;
            let dnf = to_dnf(&schema, &options)?;
            println!("{}", config.output.format.render(&dnf.to_json_schema())?);
        }

        Commands::Compat {
            old,
            new,
            old_version,
            new_version,
            strict,
        } => {
            let (old, new) = (read_schema(&old)?, read_schema(&new)?);
            let mut checker = CompatibilityChecker::from_config(&config.compatibility).with_options(options);
            if strict {
                checker = checker.strict();
            }
            let result = match (old_version, new_version) {
                (Some(from), Some(to)) => checker.check_versioned(&old, &from, &new, &to)?,
                _ => checker.check(&old, &new)?,
            };

            let marker = match result.verdict {
                CompatibilityVerdict::Compatible => "✅",
                CompatibilityVerdict::Breaking => "❌",
                CompatibilityVerdict::Undetermined => "❔",
            };
            println!("{} {}", marker, result.summary);
            println!("  backward: {}", tri_state(result.backward));
            println!("  forward:  {}", tri_state(result.forward));
            if result.is_breaking() {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
