//! Tandem CLI - drive and inspect the conversation orchestrator
//!
//! Feeds hand-written or recorded signal bundles through the full turn
//! pipeline against a file-backed store, so routing behavior can be
//! exercised without the surrounding chat service.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use tracing_subscriber::EnvFilter;

use tandem_core::{
    JsonFileStore, Orchestrator, OrchestratorConfig, SignalBundle, StateStore, TurnInput,
};

#[derive(Parser)]
#[command(name = "tandem")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Conversation orchestration core, driven from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Persistence scope, e.g. a user id
    #[arg(short, long, default_value = "default")]
    scope: String,

    /// Override the state directory (defaults to the platform data dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the config file (defaults to <config dir>/tandem.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one turn: a message plus its classifier signal bundle
    Turn {
        /// The user message
        message: String,

        /// Signal bundle as inline JSON; omit for an all-default bundle
        #[arg(long)]
        signals: Option<String>,

        /// Read the signal bundle from a JSON file instead
        #[arg(long, conflicts_with = "signals")]
        signals_file: Option<PathBuf>,
    },

    /// Print the stored state for the scope
    State,

    /// Replay a JSONL file of recorded turns against the scope
    Replay {
        /// Each line: {"message": "...", "signals": {...}}
        file: PathBuf,
    },

    /// Show the effective configuration
    Config,

    /// Delete the stored state for the scope
    Reset,
}

#[derive(serde::Deserialize)]
struct RecordedTurn {
    message: String,
    #[serde(default)]
    signals: SignalBundle,
}

fn dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "tandem").context("could not determine platform directories")
}

fn load_config(cli: &Cli) -> Result<OrchestratorConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => dirs()?.config_dir().join("tandem.toml"),
    };
    Ok(OrchestratorConfig::load(&path)?)
}

fn store_for(cli: &Cli) -> Result<JsonFileStore> {
    let root = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => dirs()?.data_dir().join("state"),
    };
    Ok(JsonFileStore::new(root))
}

fn parse_signals(
    inline: Option<&String>,
    file: Option<&PathBuf>,
) -> Result<SignalBundle> {
    match (inline, file) {
        (Some(json), _) => serde_json::from_str(json).context("invalid --signals JSON"),
        (None, Some(path)) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).context("invalid signal bundle file")
        }
        (None, None) => Ok(SignalBundle::default()),
    }
}

async fn run_turn(
    orchestrator: &Orchestrator<JsonFileStore>,
    scope: &str,
    message: String,
    signals: SignalBundle,
) -> Result<()> {
    let output = orchestrator
        .turn(TurnInput {
            scope: scope.to_string(),
            message,
            signals,
        })
        .await?;
    let rendered = serde_json::json!({
        "target": output.target,
        "directive": output.directive,
        "audit": output.audit,
        "sweep": output.sweep,
    });
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let store = store_for(&cli)?;

    match cli.command {
        Commands::Turn {
            message,
            signals,
            signals_file,
        } => {
            let bundle = parse_signals(signals.as_ref(), signals_file.as_ref())?;
            let orchestrator = Orchestrator::new(store, config);
            run_turn(&orchestrator, &cli.scope, message, bundle).await?;
        }
        Commands::State => match store.load(&cli.scope).await? {
            Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
            None => println!("no state for scope {:?}", cli.scope),
        },
        Commands::Replay { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let orchestrator = Orchestrator::new(store, config);
            for (lineno, line) in text.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let turn: RecordedTurn = serde_json::from_str(line)
                    .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
                println!("--- turn {} ---", lineno + 1);
                run_turn(&orchestrator, &cli.scope, turn.message, turn.signals).await?;
            }
        }
        Commands::Config => {
            // TOML output so it can be pasted straight into a config file.
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Reset => {
            store.delete(&cli.scope).await?;
            println!("reset scope {:?}", cli.scope);
        }
    }
    Ok(())
}
