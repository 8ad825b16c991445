//! Assembling a daemon from one configuration snapshot.
//!
//! The snapshot's `listeners` key names the endpoints to prepare, e.g.
//! `listeners = "std,admin"`. Every other key is handed to the endpoint
//! factory as-is.

use std::sync::Arc;

use tracing::info;

use telnetd_core::{ConfigSnapshot, ShellRegistry, TerminalResolver, LISTENERS_KEY};

use super::{BootstrapError, TelnetDaemon};
use crate::endpoint::EndpointFactory;

/// Splits the `listeners` value into endpoint names.
///
/// Names are trimmed and empty segments skipped; a missing or blank value
/// yields no names.
pub fn endpoint_names(config: &ConfigSnapshot) -> Vec<String> {
    config
        .list(LISTENERS_KEY)
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl<F: EndpointFactory> TelnetDaemon<F> {
    /// Builds a daemon from `config`, deriving the terminal resolver from
    /// the same snapshot.
    ///
    /// # Errors
    ///
    /// - `BootstrapError::Terminals` if the terminal declarations conflict
    /// - any error from [`TelnetDaemon::bootstrap_with`]
    pub fn bootstrap(
        config: &ConfigSnapshot,
        shells: impl Into<Arc<ShellRegistry>>,
        factory: F,
    ) -> Result<Self, BootstrapError> {
        let terminals = TerminalResolver::from_config(config)?;
        Self::bootstrap_with(config, shells, terminals, factory)
    }

    /// Builds a daemon from `config` with a caller-supplied terminal
    /// resolver, preparing each listed endpoint left to right.
    ///
    /// On failure the partially assembled daemon is dropped and only the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// - the first `BootstrapError` raised by [`TelnetDaemon::prepare`]
    pub fn bootstrap_with(
        config: &ConfigSnapshot,
        shells: impl Into<Arc<ShellRegistry>>,
        terminals: impl Into<Arc<TerminalResolver>>,
        factory: F,
    ) -> Result<Self, BootstrapError> {
        let mut daemon = Self::new(factory, shells, terminals);

        for name in endpoint_names(config) {
            daemon.prepare(&name, config)?;
        }

        info!(
            endpoints = daemon.len(),
            names = ?daemon.endpoint_names(),
            "Daemon assembled"
        );
        Ok(daemon)
    }
}
