//! telnetd Core - Shared types for the line-oriented daemon
//!
//! This crate provides the domain types shared between the daemon
//! library (`telnetd`) and anything embedding it:
//! - `config` - Immutable key/value configuration snapshots
//! - `shell` - The `Shell` trait and the session-factory registry
//! - `session` - Line-framed sessions handed to shells
//! - `terminal` - Terminal-type resolution from configuration
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod config;
pub mod error;
pub mod session;
pub mod shell;
pub mod terminal;

// Re-exports for convenience
pub use config::{ConfigSection, ConfigSnapshot, LISTENERS_KEY};
pub use error::{ConfigError, SessionError, SessionResult, TerminalError};
pub use session::{IdlePolicy, Session, SessionInfo, SessionStream, MAX_LINE_LENGTH};
pub use shell::{Shell, ShellConstructor, ShellRegistry, ShellRegistryBuilder};
pub use terminal::{TerminalResolver, DEFAULT_TERMINAL};
