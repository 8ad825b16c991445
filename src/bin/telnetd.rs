//! telnetd - Embeddable line-oriented network daemon
//!
//! Boots every listener named in the configuration, serves until a
//! shutdown signal arrives, then stops them all.
//!
//! # Usage
//!
//! ```bash
//! # Run with the default configuration file
//! telnetd run
//!
//! # Run with an explicit configuration file
//! telnetd --config /etc/telnetd.toml run
//!
//! # Validate configuration and print the prepared listeners
//! telnetd check
//!
//! # Enable debug logging
//! RUST_LOG=telnetd=debug telnetd run
//! ```
//!
//! The configuration path is taken from `--config`, then `TELNETD_CONFIG`,
//! then `<config dir>/telnetd/telnetd.toml`.
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use std::env;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use telnetd::daemon::TelnetDaemon;
use telnetd::listener::PortListenerFactory;
use telnetd::shells::builtin_shells;
use telnetd_core::ConfigSnapshot;

/// Environment variable overriding the configuration path
const CONFIG_ENV: &str = "TELNETD_CONFIG";

/// telnetd - line-oriented network daemon
#[derive(Parser, Debug)]
#[command(name = "telnetd", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start all configured listeners and serve until signalled
    Run,
    /// Prepare listeners without starting them and print their status
    Check,
}

/// Returns the configuration path to use.
fn config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("/etc"))
                .join("telnetd")
                .join("telnetd.toml")
        })
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("telnetd=info".parse()?)
                .add_directive("telnetd_core=info".parse()?),
        )
        .init();
    Ok(())
}

fn load_config(path: &Path) -> Result<ConfigSnapshot> {
    ConfigSnapshot::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let path = config_path(args.config);

    init_logging()?;

    // Default to 'run' if no subcommand given
    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_daemon(&path),
        Command::Check => check(&path),
    }
}

/// Bootstraps without starting and prints the daemon status as JSON.
fn check(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    let daemon = TelnetDaemon::bootstrap(&config, builtin_shells().build(), PortListenerFactory)
        .context("Configuration check failed")?;

    let status = serde_json::to_string_pretty(&daemon.status())?;
    println!("{status}");
    Ok(())
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(path: &Path) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        config = %path.display(),
        "telnetd starting"
    );

    let config = load_config(path)?;
    let mut daemon = TelnetDaemon::bootstrap(&config, builtin_shells().build(), PortListenerFactory)
        .context("Failed to bootstrap daemon")?;

    if daemon.is_empty() {
        warn!("No listeners configured; nothing will accept connections");
    }

    daemon.start();

    wait_for_shutdown_signal().await?;
    info!("Shutdown signal received");

    daemon.stop();
    info!("telnetd stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
