//! CLI entry point for regwatch.
//!
//! This binary watches directory-backed keys, queries them, and replays
//! scripted mutations against an in-memory store to show which events a set
//! of watches would receive.
//!
//! # Usage
//!
//! ```bash
//! regwatch [OPTIONS] <COMMAND>
//!
//! # Watch two keys under a directory root, printing events as NDJSON
//! regwatch watch --root work=/srv/work 'work\app' 'work\app\plugins'
//!
//! # List subkeys and values, read one value
//! regwatch list --root work=/srv/work 'work\app'
//! regwatch get --root work=/srv/work 'work\app' name
//!
//! # Replay a script against the in-memory registry model
//! regwatch replay scenario.json
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{WrapErr, eyre};
use rw_core::{ChangeEvent, Config, FsRootConfig, KeyPath, PathError, Value};
use rw_engine::{
    Engine, FsSource, Listener, MemoryStore, ResourceSource, WatchError, WatchHandle,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Quiet period after which a replay `settle` step considers delivery done.
const DEFAULT_SETTLE_MS: u64 = 200;

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Watch hierarchical keys and report add, change and delete events.
#[derive(Parser)]
#[command(name = "regwatch", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON configuration file.
    #[arg(short, long, global = true, env = "REGWATCH_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Directory root as NAME=DIR, added to the configured roots.
    #[arg(long = "root", global = true, value_parser = FsRootConfig::parse)]
    roots: Vec<FsRootConfig>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Watch keys and print events as JSON lines until interrupted.
    Watch {
        /// Keys to watch, e.g. `work\app`.
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// List the subkeys and values of a key.
    List {
        /// Key to list.
        key: String,
    },

    /// Read one value of a key.
    Get {
        /// Key holding the value.
        key: String,
        /// Value name.
        name: String,
    },

    /// Run a JSON script of mutations and watches against an in-memory store.
    Replay {
        /// Script file.
        script: Utf8PathBuf,
    },

    /// Print the effective configuration.
    Config,
}

// =============================================================================
// REPLAY SCRIPT TYPES
// =============================================================================

/// A replay script.
#[derive(Debug, Deserialize)]
struct Script {
    /// Steps run in order.
    steps: Vec<Step>,
}

/// One replay step.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    /// Create a key and any missing ancestors.
    Create { key: String },
    /// Delete a key and everything below it.
    Delete { key: String },
    /// Store a value.
    Set { key: String, name: String, value: Value },
    /// Remove a value.
    DeleteValue { key: String, name: String },
    /// Subscribe the named listener.
    Watch { key: String, listener: String },
    /// Unsubscribe the named listener.
    Unwatch { key: String, listener: String },
    /// Deliver events until none arrive for `ms` milliseconds.
    Settle {
        #[serde(default = "default_settle_ms")]
        ms: u64,
    },
}

const fn default_settle_ms() -> u64 {
    DEFAULT_SETTLE_MS
}

/// An event as printed by `replay`.
#[derive(Serialize)]
struct Delivered<'a> {
    listener: &'a str,
    #[serde(flatten)]
    event: &'a ChangeEvent,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default. Logs go
/// to stderr so stdout carries only event output.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},mio=warn,notify=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
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

/// Builds the effective [`Config`]: the config file if given, plus roots
/// from `--root`.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .wrap_err_with(|| format!("Failed to load configuration from {path}"))?,
        None => Config::default(),
    };
    config.roots.extend(cli.roots.iter().cloned());
    config.validate()?;
    Ok(config)
}

/// Creates the directory-backed source, requiring at least one root.
fn fs_source(config: &Config) -> color_eyre::Result<FsSource> {
    if config.roots.is_empty() {
        return Err(eyre!(
            "No roots configured; pass --root NAME=DIR or set roots in the config file"
        ));
    }
    Ok(FsSource::new(config)?)
}

/// Writes one JSON line to stdout.
fn print_json_line(value: &impl Serialize) {
    let line = match serde_json::to_string(value) {
        Ok(line) => line,
        Err(error) => {
            warn!(error = %error, "Failed to serialize event");
            return;
        }
    };
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let _ = writeln!(handle, "{line}");
}

/// A value printed by `get`, with its conventional type name.
#[derive(Debug, Serialize)]
struct ValueRecord<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    type_name: &'static str,
    value: &'a Value,
}

/// Prefixes a report caused by a bad key with the key error's stable code,
/// so scripts can match on `[ERR_INVALID_ROOT]` and friends.
fn with_error_code(report: color_eyre::Report) -> color_eyre::Report {
    let code = report.chain().find_map(|cause| {
        if let Some(error) = cause.downcast_ref::<PathError>() {
            return Some(error.code());
        }
        match cause.downcast_ref::<WatchError>() {
            Some(WatchError::Path(error)) => Some(error.code()),
            _ => None,
        }
    });
    match code {
        Some(code) => report.wrap_err(format!("[{code}]")),
        None => report,
    }
}

/// Prints a delivered event as one JSON line.
fn print_event(event: &ChangeEvent) {
    print_json_line(event);
}

/// Completes on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(error) => {
                warn!(error = %error, "Cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Watches `keys` and prints every delivered event until interrupted.
async fn run_watch(config: &Config, keys: &[String]) -> color_eyre::Result<()> {
    let source = fs_source(config)?;
    let engine = Engine::start(source, config.engine.clone())?;

    let listener = Listener::new(print_event);
    let mut handles: Vec<WatchHandle> = Vec::with_capacity(keys.len());
    for key in keys {
        let handle = engine
            .watch(key, listener.clone())
            .wrap_err_with(|| format!("Cannot watch {key}"))?;
        info!(key = %handle.key(), "Watching");
        handles.push(handle);
    }

    let report = engine.run_dispatcher(shutdown_signal()).await;
    info!(
        records = report.records,
        deliveries = report.deliveries,
        "Stopped watching"
    );

    for mut handle in handles {
        handle.stop()?;
    }
    engine.shutdown()?;
    Ok(())
}

/// Prints the listing of one key as JSON.
fn run_list(config: &Config, key: &str) -> color_eyre::Result<()> {
    let source = fs_source(config)?;
    let path = KeyPath::parse(key, source.roots())?;
    let listing = source.list(&path)?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", serde_json::to_string_pretty(&listing)?)?;
    Ok(())
}

/// Prints one value as JSON.
fn run_get(config: &Config, key: &str, name: &str) -> color_eyre::Result<()> {
    let source = fs_source(config)?;
    let path = KeyPath::parse(key, source.roots())?;
    let value = source.get(&path, name)?;
    let record = ValueRecord {
        name,
        type_name: value.type_name(),
        value: &value,
    };

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", serde_json::to_string_pretty(&record)?)?;
    Ok(())
}

/// Delivers events until none arrive for `quiet`.
async fn settle(engine: &Engine, quiet: Duration) -> usize {
    let mut delivered = 0;
    loop {
        delivered += engine.dispatch_pending().deliveries;
        if tokio::time::timeout(quiet, engine.changed()).await.is_err() {
            return delivered + engine.dispatch_pending().deliveries;
        }
    }
}

/// Returns the listener registered under `name`, creating it on first use.
fn named_listener(listeners: &mut Vec<(String, Listener)>, name: &str) -> Listener {
    if let Some((_, listener)) = listeners.iter().find(|(n, _)| n == name) {
        return listener.clone();
    }
    let label = name.to_owned();
    let listener = Listener::new(move |event| {
        print_json_line(&Delivered {
            listener: &label,
            event,
        });
    });
    listeners.push((name.to_owned(), listener.clone()));
    listener
}

/// Runs a replay script against a fresh [`MemoryStore`].
async fn run_replay(config: &Config, script_path: &Utf8Path) -> color_eyre::Result<()> {
    let text = std::fs::read_to_string(script_path)
        .wrap_err_with(|| format!("Failed to read {script_path}"))?;
    let script: Script =
        serde_json::from_str(&text).wrap_err_with(|| format!("Invalid script {script_path}"))?;

    let store = MemoryStore::new();
    let engine = Engine::start(store.clone(), config.engine.clone())?;
    let mut listeners = Vec::new();

    info!(steps = script.steps.len(), "Replaying script");
    for (index, step) in script.steps.into_iter().enumerate() {
        let result = match step {
            Step::Create { key } => store.create_key(&key).map(drop),
            Step::Delete { key } => store.delete_key(&key).map(drop),
            Step::Set { key, name, value } => store.set_value(&key, &name, value),
            Step::DeleteValue { key, name } => store.delete_value(&key, &name).map(drop),
            Step::Watch { key, listener } => {
                engine.subscribe(&key, &named_listener(&mut listeners, &listener))
            }
            Step::Unwatch { key, listener } => {
                engine.unsubscribe(&key, &named_listener(&mut listeners, &listener))
            }
            Step::Settle { ms } => {
                let delivered = settle(&engine, Duration::from_millis(ms)).await;
                debug!(step = index, delivered, "Settled");
                Ok(())
            }
        };
        result.wrap_err_with(|| format!("Step {index} failed"))?;
    }

    settle(&engine, Duration::from_millis(DEFAULT_SETTLE_MS)).await;
    let stats = engine.stats()?;
    info!(
        enqueued = stats.enqueued,
        coalesced = stats.coalesced,
        "Replay finished"
    );
    engine.shutdown()?;
    Ok(())
}

/// Prints the effective configuration as JSON.
fn run_config(config: &Config) -> color_eyre::Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", serde_json::to_string_pretty(config)?)?;
    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Build configuration and route to the command
    let config = build_config(&cli)?;
    let result = match &cli.command {
        Commands::Watch { keys } => run_watch(&config, keys).await,
        Commands::List { key } => run_list(&config, key),
        Commands::Get { key, name } => run_get(&config, key, name),
        Commands::Replay { script } => run_replay(&config, script).await,
        Commands::Config => run_config(&config),
    };
    result.map_err(with_error_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_root_flags_are_parsed() {
        let cli = Cli::parse_from([
            "regwatch",
            "--root",
            "work=/srv/work",
            "--root",
            "home=/home/me",
            "watch",
            "work\\app",
        ]);
        assert_eq!(cli.roots.len(), 2);
        assert_eq!(cli.roots[1].name, "home");
        assert!(matches!(cli.command, Commands::Watch { ref keys } if keys.len() == 1));
    }

    #[test]
    fn test_bad_root_flag_is_rejected() {
        assert!(Cli::try_parse_from(["regwatch", "--root", "nodir", "config"]).is_err());
    }

    #[test]
    fn test_script_steps_deserialize() {
        let script: Script = serde_json::from_str(
            r#"{"steps": [
                {"op": "watch", "key": "HKCU\\Software", "listener": "a"},
                {"op": "create", "key": "HKCU\\Software\\x"},
                {"op": "set", "key": "HKCU\\Software\\x", "name": "v", "value": {"dword": 7}},
                {"op": "delete_value", "key": "HKCU\\Software\\x", "name": "v"},
                {"op": "settle"},
                {"op": "settle", "ms": 50},
                {"op": "unwatch", "key": "HKCU\\Software", "listener": "a"},
                {"op": "delete", "key": "HKCU\\Software\\x"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(script.steps.len(), 8);
        assert!(matches!(
            script.steps[2],
            Step::Set { value: Value::Dword(7), .. }
        ));
        assert!(matches!(script.steps[4], Step::Settle { ms: DEFAULT_SETTLE_MS }));
        assert!(matches!(script.steps[5], Step::Settle { ms: 50 }));
    }

    #[test]
    fn test_named_listener_is_reused() {
        let mut listeners = Vec::new();
        let a = named_listener(&mut listeners, "a");
        let again = named_listener(&mut listeners, "a");
        let b = named_listener(&mut listeners, "b");
        assert!(a.same_as(&again));
        assert!(!a.same_as(&b));
        assert_eq!(listeners.len(), 2);
    }

    #[test]
    fn test_key_errors_carry_their_code() {
        let parse = color_eyre::Report::new(PathError::NoSubkey);
        assert!(with_error_code(parse).to_string().contains("[ERR_NO_SUBKEY]"));

        let engine = color_eyre::Report::new(WatchError::from(PathError::InvalidRoot(
            "HKEY_NOWHERE".to_owned(),
        )))
        .wrap_err("Failed to watch HKEY_NOWHERE\\x");
        assert!(with_error_code(engine).to_string().contains("[ERR_INVALID_ROOT]"));

        let other = eyre!("disk on fire");
        assert_eq!(with_error_code(other).to_string(), "disk on fire");
    }

    #[test]
    fn test_value_record_names_the_type() {
        let value = Value::Dword(7);
        let line = serde_json::to_string(&ValueRecord {
            name: "count",
            type_name: value.type_name(),
            value: &value,
        })
        .unwrap();
        assert_eq!(line, r#"{"name":"count","type":"REG_DWORD","value":{"dword":7}}"#);
    }

    #[test]
    fn test_delivered_line_format() {
        let event = ChangeEvent::new(rw_core::EventKind::Add, "HKEY_CURRENT_USER\\x");
        let line = serde_json::to_string(&Delivered {
            listener: "a",
            event: &event,
        })
        .unwrap();
        assert_eq!(
            line,
            r#"{"listener":"a","type":"add","key":"HKEY_CURRENT_USER\\x"}"#
        );
    }
}
