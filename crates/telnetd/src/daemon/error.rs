//! Bootstrap errors.

use thiserror::Error;

use telnetd_core::TerminalError;

use crate::endpoint::EndpointError;

/// Non-retryable failure while assembling the daemon.
///
/// Any of these aborts the in-progress assembly; the caller is expected to
/// abandon the boot rather than retry.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The endpoint factory failed for `name`
    #[error("Failed to prepare endpoint '{name}': {source}")]
    Endpoint {
        name: String,
        #[source]
        source: EndpointError,
    },

    /// An endpoint with this name is already registered
    #[error("Endpoint '{name}' is already registered")]
    DuplicateEndpoint { name: String },

    /// Endpoint names must be non-empty
    #[error("Endpoint name must not be empty")]
    InvalidName,

    /// Endpoints can only be prepared before the daemon is started
    #[error("Cannot prepare endpoint '{name}': daemon is no longer assembling")]
    NotAssembling { name: String },

    /// The terminal resolver could not be built
    #[error("Failed to configure terminals: {0}")]
    Terminals(#[from] TerminalError),
}

impl BootstrapError {
    /// Returns the endpoint this error concerns, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Endpoint { name, .. }
            | Self::DuplicateEndpoint { name }
            | Self::NotAssembling { name } => Some(name),
            Self::InvalidName | Self::Terminals(_) => None,
        }
    }
}
