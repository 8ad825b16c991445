//! telnetd - Embeddable line-oriented network daemon
//!
//! This crate provides the daemon infrastructure:
//! - `endpoint` - Endpoint and factory contracts plus lifecycle state
//! - `daemon` - The coordinator that prepares, starts and stops endpoints
//! - `listener` - TCP `PortListener` endpoints
//! - `shells` - Built-in shells
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     telnetd daemon                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ConfigSnapshot ──listeners──▶ TelnetDaemon::bootstrap      │
//! │                                      │ prepare(name)        │
//! │                                      ▼                      │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  ShellRegistry  │◀────│  PortListener (per name)    │   │
//! │  │   (shared)      │     │  start() / stop()           │   │
//! │  └─────────────────┘     └──────────────┬──────────────┘   │
//! │                                         │ accept            │
//! │                                         ▼                   │
//! │                          ┌─────────────────────────────┐   │
//! │                          │  Shell::run(Session)        │   │
//! │                          └─────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use telnetd::daemon::TelnetDaemon;
//! use telnetd::listener::PortListenerFactory;
//! use telnetd::shells::builtin_shells;
//! use telnetd_core::ConfigSnapshot;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigSnapshot::load("telnetd.toml")?;
//!     let mut daemon =
//!         TelnetDaemon::bootstrap(&config, builtin_shells().build(), PortListenerFactory)?;
//!     daemon.start();
//!     tokio::signal::ctrl_c().await?;
//!     daemon.stop();
//!     Ok(())
//! }
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`

pub mod daemon;
pub mod endpoint;
pub mod listener;
pub mod shells;
