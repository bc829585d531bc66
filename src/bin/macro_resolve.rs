//! Macro resolution CLI
//!
//! Resolves a batch of texts against a YAML configuration snapshot and
//! prints the result as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Resolve texts keyed by host id
//! macro-resolve --snapshot snapshot.yaml resolve host-interface-ip-dns --input texts.yaml
//!
//! # Resolve the `description` field of trigger records
//! macro-resolve --snapshot snapshot.yaml records trigger-name --input triggers.json
//!
//! # List known scenarios, including those in MACRO_SCENARIO_DIR
//! macro-resolve --snapshot snapshot.yaml scenarios
//! ```

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use macro_resolver::{InMemoryStore, MacroResolver, RegistryLoader, TextBatch};

#[derive(Parser)]
#[command(name = "macro-resolve")]
#[command(version)]
#[command(about = "Resolve macros in monitoring configuration strings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration snapshot (YAML)
    #[arg(long, short, env = "MACRO_SNAPSHOT")]
    snapshot: PathBuf,

    /// Directory with extra scenario definitions
    #[arg(long, env = "MACRO_SCENARIO_DIR")]
    scenario_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a map of `id -> text | [texts]`
    Resolve {
        scenario: String,

        /// Input file, YAML or JSON (reads stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Print literal and macro fragments instead of flat strings
        #[arg(long)]
        fragments: bool,
    },

    /// Resolve the scenario's source field in a map of `id -> record`
    Records {
        scenario: String,

        /// Input file, YAML or JSON (reads stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// List known scenarios
    Scenarios,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let loader = match &cli.scenario_dir {
        Some(dir) => RegistryLoader::new(dir),
        None => RegistryLoader::from_env(),
    };
    let registry = loader.load()?;
    info!("Loaded {} scenarios", registry.len());

    let store = Arc::new(InMemoryStore::from_yaml_file(&cli.snapshot)?);
    let resolver = MacroResolver::from_store(store).with_registry(registry);

    match cli.command {
        Commands::Resolve {
            scenario,
            input,
            fragments,
        } => {
            let batch: TextBatch = read_input(input.as_deref())?;
            if fragments {
                let output = resolver.resolve_fragments(&scenario, &batch).await?;
                print_json(&output)
            } else {
                let output = resolver.resolve(&scenario, batch).await?;
                print_json(&output)
            }
        }
        Commands::Records { scenario, input } => {
            let records: BTreeMap<u64, serde_json::Value> = read_input(input.as_deref())?;
            let output = resolver.resolve_records(&scenario, records).await?;
            print_json(&output)
        }
        Commands::Scenarios => {
            for name in resolver.registry().names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

/// YAML is a superset of JSON, so one parser covers both
fn read_input<T: serde::de::DeserializeOwned>(file: Option<&Path>) -> Result<T> {
    let content = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input {:?}", path))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    serde_yaml::from_str(&content).context("Failed to parse input")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("JSON serialization failed")?
    );
    Ok(())
}
