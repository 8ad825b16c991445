//! Endpoint contracts consumed by the daemon coordinator.
//!
//! An endpoint is one named listening point. It is built by an
//! `EndpointFactory` during preparation, which must not accept any
//! connection, and only begins serving once `start` is called.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use telnetd_core::{ConfigError, ConfigSnapshot, ShellRegistry, TerminalResolver};

// ============================================================================
// Lifecycle State
// ============================================================================

/// Lifecycle state of a registered endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointState {
    /// Constructed and registered, not yet serving
    Prepared,
    /// Accepting connections
    Started,
    /// Stopped after having been started
    Stopped,
}

impl EndpointState {
    /// Returns a short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Prepared => "prepared",
            Self::Started => "started",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for EndpointState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Traits
// ============================================================================

/// One independently startable and stoppable listening unit.
pub trait Endpoint: Send {
    /// Returns the endpoint's unique name.
    fn name(&self) -> &str;

    /// Begins accepting connections.
    fn start(&mut self) -> Result<(), EndpointError>;

    /// Ceases accepting connections and ends running sessions.
    fn stop(&mut self);
}

/// Builds endpoints from configuration.
pub trait EndpointFactory {
    /// Endpoint type produced by this factory
    type Endpoint: Endpoint;

    /// Creates a bound-but-not-serving endpoint named `name`.
    ///
    /// `shells` and `terminals` are shared by every endpoint the daemon
    /// creates and are passed through unchanged.
    fn create(
        &self,
        name: &str,
        config: &ConfigSnapshot,
        shells: Arc<ShellRegistry>,
        terminals: Arc<TerminalResolver>,
    ) -> Result<Self::Endpoint, EndpointError>;
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while creating or starting an endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// A setting is missing or malformed
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configured login shell is not registered
    #[error("Unknown login shell '{shell}'")]
    UnknownShell { shell: String },

    /// `start` was called outside a tokio runtime
    #[error("No async runtime available to start the endpoint")]
    NoRuntime,

    /// The listening socket could not be bound
    #[error("Failed to bind {address}: {error}")]
    Bind { address: SocketAddr, error: String },

    /// Any other setup failure
    #[error("{0}")]
    Other(String),
}
