//! project-memory - stdio host for the per-project memory store
//!
//! `serve` reads one JSON call per line from stdin and writes one JSON
//! response per line to stdout. `call` runs a single operation. Logs go to
//! stderr so they never interleave with responses.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use project_memory::{handle_call, handle_line, BackendKind, ConfigService, ProjectMemoryStore};

#[derive(Debug, Parser)]
#[command(name = "project-memory", version, about = "Per-project persistent memory store")]
struct Cli {
    /// Project root holding the `.claude` directory
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Storage backend, overriding the config file (`sqlite` or `document`)
    #[arg(long, env = "PROJECT_MEMORY_BACKEND")]
    backend: Option<BackendKind>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Answer line-delimited JSON calls on stdin until EOF
    Serve,
    /// Run one operation and print its response
    Call {
        operation: String,
        /// JSON object of arguments
        arguments: Option<String>,
    },
}

fn log_filter() -> tracing_subscriber::EnvFilter {
    let level = if let Ok(v) = std::env::var("RUST_LOG") {
        v
    } else if let Ok(v) = std::env::var("PROJECT_MEMORY_LOG") {
        v
    } else {
        "warn".to_string()
    };

    tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
}

fn open_store(cli: &Cli) -> Result<ProjectMemoryStore> {
    let mut config = ConfigService::load(&cli.project_root)
        .with_context(|| format!("Failed to load config under {}", cli.project_root.display()))?;
    if let Some(backend) = cli.backend {
        config.override_backend(backend);
    }
    tracing::debug!(
        "[main] {} backend, config {}",
        config.get_config().backend,
        config.config_path().display()
    );

    let store = ProjectMemoryStore::open_with(&cli.project_root, config.get_config())
        .with_context(|| format!("Failed to open store at {}", config.data_file_path().display()))?;
    Ok(store)
}

fn serve(store: &ProjectMemoryStore) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    tracing::info!("[serve] Listening on stdin ({} backend)", store.backend_name());
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = handle_line(store, line);
        serde_json::to_writer(&mut out, &response)?;
        out.write_all(b"\n")?;
        out.flush()?;
    }
    tracing::info!("[serve] stdin closed");
    Ok(())
}

fn call(store: &ProjectMemoryStore, operation: &str, arguments: Option<&str>) -> Result<bool> {
    let arguments: Value = match arguments {
        Some(raw) => serde_json::from_str(raw).context("Arguments must be a JSON object")?,
        None => Value::Null,
    };

    let response = handle_call(store, operation, arguments);
    let success = response.success;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(success)
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = open_store(&cli)?;

    match &cli.command {
        Command::Serve => {
            serve(&store)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Call {
            operation,
            arguments,
        } => {
            if call(&store, operation, arguments.as_deref())? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
