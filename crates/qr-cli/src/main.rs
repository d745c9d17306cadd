//! Interactive front end for the quarry search index.
//!
//! Indexes the given files and directories, keeps them in sync with the
//! filesystem, and answers queries typed at a prompt.
//!
//! # Usage
//!
//! ```bash
//! quarry [OPTIONS] [PATHS]...
//!
//! # Index two directories and watch them
//! quarry ~/notes ~/papers
//!
//! # Index once, no watching, verbose logs
//! quarry --no-watch -v ~/notes
//! ```
//!
//! At the `query> ` prompt, a single word is looked up on its own and
//! several words are matched as a phrase. Type `exit` or send end of input
//! to quit. Logs go to stderr so they never mix with results.

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use color_eyre::eyre::WrapErr;
use qr_core::{Config, Directory, Document};
use qr_index::{AddOptions, Reconciler};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// The input line that ends the session.
const EXIT_COMMAND: &str = "exit";

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Full-text search over files and directories, kept in sync as they change.
#[derive(Parser, Debug)]
#[command(name = "quarry", version, about, long_about = None)]
struct Cli {
    /// Files and directories to index.
    paths: Vec<Utf8PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored log output.
    #[arg(long)]
    no_color: bool,

    /// JSON configuration file.
    #[arg(long, env = "QUARRY_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Coalescing delay for filesystem changes, in milliseconds.
    #[arg(long, env = "QUARRY_DEBOUNCE_MS")]
    debounce_ms: Option<u64>,

    /// Number of tokenization workers (defaults to one per CPU core).
    #[arg(long, env = "QUARRY_WORKERS")]
    workers: Option<usize>,

    /// Index the paths without watching them for changes.
    #[arg(long)]
    no_watch: bool,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber, writing to stderr.
///
/// Respects `RUST_LOG` if set. Otherwise uses `debug` with `--verbose` and
/// `info` by default, with `notify` held at `warn`.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},notify=warn"))
    });

    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Builds a [`Config`] from the optional config file and CLI overrides.
///
/// # Errors
///
/// Returns an error if the config file can't be loaded or the result is
/// invalid.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .wrap_err_with(|| format!("Failed to load config from {path}"))?,
        None => Config::default(),
    };

    if let Some(debounce_ms) = cli.debounce_ms {
        config.watch.debounce_ms = debounce_ms;
    }
    if let Some(workers) = cli.workers {
        config.index.worker_threads = Some(workers);
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Adds every path, directories recursively, on the blocking pool.
///
/// # Errors
///
/// Returns an error for the first path that can't be added.
async fn add_paths(
    reconciler: &Reconciler,
    paths: Vec<Utf8PathBuf>,
    track: bool,
) -> color_eyre::Result<()> {
    for path in paths {
        let worker = reconciler.clone();
        let label = path.clone();
        tokio::task::spawn_blocking(move || {
            let options = AddOptions::new().track(track);
            if path.is_dir() {
                worker.add_directory(Directory::new(path), options).map(drop)
            } else {
                worker.add_document(Document::new(path), options).map(drop)
            }
        })
        .await?
        .wrap_err_with(|| format!("Failed to add {label}"))?;
    }
    Ok(())
}

/// Returns `true` if the input line, exactly as read, ends the session.
fn is_exit(line: &str) -> bool {
    line == EXIT_COMMAND
}

/// Reads queries from stdin until `exit` or end of input.
///
/// Each query prints the matching paths, sorted, then a match count.
async fn run_prompt(reconciler: &Reconciler) -> color_eyre::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        {
            let mut stdout = std::io::stdout().lock();
            write!(stdout, "query> ")?;
            stdout.flush()?;
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let mut paths: Vec<Utf8PathBuf> = reconciler
            .search(&line)
            .into_iter()
            .map(|document| document.path().to_owned())
            .collect();
        paths.sort();

        let mut stdout = std::io::stdout().lock();
        for path in &paths {
            writeln!(stdout, "{path}")?;
        }
        writeln!(stdout, "{} match(es)", paths.len())?;

        if is_exit(&line) {
            break;
        }
    }
    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.no_color);

    let config = build_config(&cli)?;
    let reconciler = Reconciler::new(&config)?;
    let track = !cli.no_watch;

    add_paths(&reconciler, cli.paths, track).await?;

    let registry = reconciler.registry();
    info!(
        tracked = registry.size(),
        documents = reconciler.index().size_documents(),
        tokens = reconciler.index().size_tokens(),
        watching = track,
        "Index ready"
    );

    let dispatcher = if track {
        Some(reconciler.start()?)
    } else {
        None
    };

    let prompt = run_prompt(&reconciler).await;

    if let Some(dispatcher) = dispatcher {
        if let Err(err) = dispatcher.shutdown().await {
            warn!(error = %err, "Watch dispatcher stopped with an error");
        }
    }

    let stats = reconciler.stats().snapshot();
    info!(
        indexed = stats.indexed,
        removed = stats.removed,
        events = stats.events(),
        errors = stats.errors,
        "Shut down"
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from(["quarry", "--debounce-ms", "50", "--workers", "3", "notes"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.watch.debounce_ms, 50);
        assert_eq!(config.index.worker_threads, Some(3));
        assert_eq!(cli.paths, vec![Utf8PathBuf::from("notes")]);
    }

    #[test]
    fn test_config_file_then_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("quarry.json")).unwrap();
        std::fs::write(&path, r#"{"watch": {"debounce_ms": 250}, "index": {"skip_binary": false}}"#)
            .unwrap();

        let cli = Cli::parse_from(["quarry", "--config", path.as_str(), "--workers", "2"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.watch.debounce_ms, 250);
        assert!(!config.index.skip_binary);
        assert_eq!(config.index.worker_threads, Some(2));
    }

    #[test]
    fn test_only_literal_exit_ends_session() {
        assert!(is_exit("exit"));
        assert!(!is_exit(" exit "));
        assert!(!is_exit("exit now"));
        assert!(!is_exit("EXIT"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let cli = Cli::parse_from(["quarry", "--workers", "0"]);
        assert!(build_config(&cli).is_err());
    }
}
