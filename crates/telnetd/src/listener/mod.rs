//! TCP endpoint for the daemon.
//!
//! A `PortListener` is created by `PortListenerFactory` with validated
//! settings but no socket. `start` binds the port and spawns the accept
//! loop on the current tokio runtime; `stop` cancels the loop and every
//! session it spawned. A stopped listener can be started again.
//!
//! The accept loop closes its socket only once it observes the
//! cancellation. Until then the listener keeps a weak handle to it, and a
//! `start` in that window adopts the open socket instead of binding the
//! port a second time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  PortListener   │  start(): bind + spawn
//! │                 │  stop():  cancel
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │    Acceptor     │────▶│  ShellRegistry  │  lookup(loginshell)
//! │ (per listener)  │     └─────────────────┘
//! └───────┬─────────┘
//!         │ spawn per connection
//!         ▼
//! ┌─────────────────┐
//! │ Shell::run over │
//! │    Session      │
//! └─────────────────┘
//! ```

mod connection;
mod settings;

pub use settings::{
    ListenerSettings, DEFAULT_BACKLOG, DEFAULT_MAX_CONNECTIONS, DEFAULT_TIMEOUT_MS,
    DEFAULT_WARNING_MS,
};

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use tokio::net::{TcpListener, TcpSocket};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use telnetd_core::{ConfigSnapshot, ShellRegistry, TerminalResolver};

use crate::endpoint::{Endpoint, EndpointError, EndpointFactory};
use self::connection::Acceptor;

// ============================================================================
// Factory
// ============================================================================

/// Creates `PortListener`s from `<name>.*` settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortListenerFactory;

impl EndpointFactory for PortListenerFactory {
    type Endpoint = PortListener;

    fn create(
        &self,
        name: &str,
        config: &ConfigSnapshot,
        shells: Arc<ShellRegistry>,
        terminals: Arc<TerminalResolver>,
    ) -> Result<PortListener, EndpointError> {
        let settings = ListenerSettings::from_config(name, config)?;

        if !shells.contains(&settings.login_shell) {
            return Err(EndpointError::UnknownShell {
                shell: settings.login_shell,
            });
        }

        debug!(
            endpoint = %name,
            address = %settings.bind_addr(),
            shell = %settings.login_shell,
            "Listener configured"
        );
        Ok(PortListener::new(name, settings, shells, terminals))
    }
}

// ============================================================================
// Listener
// ============================================================================

/// Resources held while the listener is serving.
struct Running {
    socket: Arc<TcpListener>,
    cancel: CancellationToken,
    local_addr: SocketAddr,
}

/// A named TCP listening point.
pub struct PortListener {
    name: String,
    settings: ListenerSettings,
    shells: Arc<ShellRegistry>,
    terminals: Arc<TerminalResolver>,
    running: Option<Running>,
    /// Socket of a stopped accept loop that may still be open.
    draining: Weak<TcpListener>,
}

impl PortListener {
    /// Creates a listener that is not yet serving.
    pub fn new(
        name: impl Into<String>,
        settings: ListenerSettings,
        shells: Arc<ShellRegistry>,
        terminals: Arc<TerminalResolver>,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            shells,
            terminals,
            running: None,
            draining: Weak::new(),
        }
    }

    /// Returns the listener settings.
    pub fn settings(&self) -> &ListenerSettings {
        &self.settings
    }

    /// Returns the bound address while serving.
    ///
    /// Differs from the configured address when port 0 was requested.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }

    /// Returns true while the accept loop is running.
    pub fn is_serving(&self) -> bool {
        self.running.is_some()
    }

    fn bind_error(&self, error: io::Error) -> EndpointError {
        EndpointError::Bind {
            address: self.settings.bind_addr(),
            error: error.to_string(),
        }
    }
}

impl Endpoint for PortListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), EndpointError> {
        if self.running.is_some() {
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|_| EndpointError::NoRuntime)?;
        let _guard = runtime.enter();

        let socket = match self.draining.upgrade() {
            Some(socket) => {
                debug!(endpoint = %self.name, "Adopting socket from previous accept loop");
                socket
            }
            None => Arc::new(
                bind(self.settings.bind_addr(), self.settings.backlog)
                    .map_err(|e| self.bind_error(e))?,
            ),
        };
        self.draining = Weak::new();
        let local_addr = socket.local_addr().map_err(|e| self.bind_error(e))?;

        let cancel = CancellationToken::new();
        let acceptor = Acceptor {
            endpoint: self.name.clone(),
            settings: self.settings.clone(),
            shells: Arc::clone(&self.shells),
            terminals: Arc::clone(&self.terminals),
            cancel: cancel.clone(),
            permits: self
                .settings
                .connection_limit()
                .map(|limit| Arc::new(Semaphore::new(limit))),
        };
        runtime.spawn(acceptor.run(Arc::clone(&socket)));

        info!(
            endpoint = %self.name,
            address = %local_addr,
            shell = %self.settings.login_shell,
            "Listener accepting connections"
        );
        self.running = Some(Running {
            socket,
            cancel,
            local_addr,
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            self.draining = Arc::downgrade(&running.socket);
            debug!(endpoint = %self.name, "Listener stop requested");
        }
    }
}

impl Drop for PortListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Binds a listening socket with an explicit backlog.
fn bind(address: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = if address.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(address)?;
    socket.listen(backlog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shells::{EchoShell, ECHO_SHELL};

    fn shells() -> Arc<ShellRegistry> {
        Arc::new(
            ShellRegistry::builder()
                .register_default::<EchoShell>(ECHO_SHELL)
                .build(),
        )
    }

    fn local_config(shell: &str) -> ConfigSnapshot {
        [
            ("std.port", "0"),
            ("std.address", "127.0.0.1"),
            ("std.loginshell", shell),
        ]
        .into_iter()
        .collect()
    }

    fn create(config: &ConfigSnapshot) -> Result<PortListener, EndpointError> {
        PortListenerFactory.create(
            "std",
            config,
            shells(),
            Arc::new(TerminalResolver::default()),
        )
    }

    #[test]
    fn test_create_does_not_bind() {
        let listener = create(&local_config(ECHO_SHELL)).unwrap();
        assert_eq!(listener.name(), "std");
        assert!(!listener.is_serving());
        assert!(listener.local_addr().is_none());
    }

    #[test]
    fn test_create_rejects_unknown_shell() {
        let err = create(&local_config("bash")).err().unwrap();
        assert!(matches!(err, EndpointError::UnknownShell { ref shell } if shell == "bash"));
    }

    #[test]
    fn test_create_rejects_bad_settings() {
        let err = create(&ConfigSnapshot::new()).err().unwrap();
        assert!(matches!(err, EndpointError::Config(_)));
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let mut listener = create(&local_config(ECHO_SHELL)).unwrap();
        assert!(matches!(listener.start(), Err(EndpointError::NoRuntime)));
        assert!(!listener.is_serving());
    }

    #[tokio::test]
    async fn test_start_binds_and_stop_releases() {
        let mut listener = create(&local_config(ECHO_SHELL)).unwrap();

        listener.start().unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);

        // Starting again while serving keeps the same socket.
        listener.start().unwrap();
        assert_eq!(listener.local_addr(), Some(addr));

        listener.stop();
        assert!(!listener.is_serving());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let mut first = create(&local_config(ECHO_SHELL)).unwrap();
        first.start().unwrap();
        let taken = first.local_addr().unwrap();

        let config: ConfigSnapshot = [
            ("std.port", taken.port().to_string()),
            ("std.address", "127.0.0.1".to_string()),
            ("std.loginshell", ECHO_SHELL.to_string()),
        ]
        .into_iter()
        .collect();
        let mut second = create(&config).unwrap();

        assert!(matches!(second.start(), Err(EndpointError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_restart_reuses_socket_not_yet_released() {
        let mut listener = create(&local_config(ECHO_SHELL)).unwrap();
        listener.start().unwrap();
        let addr = listener.local_addr().unwrap();

        // No await in between: the old accept loop still owns the socket.
        listener.stop();
        listener.start().unwrap();

        assert!(listener.is_serving());
        assert_eq!(listener.local_addr(), Some(addr));
        listener.stop();
    }
}
