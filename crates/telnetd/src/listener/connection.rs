//! Accept loop and per-connection dispatch.
//!
//! Each accepted connection:
//! - takes a permit from the listener's connection cap (or is refused)
//! - asks the shell registry for a fresh login shell
//! - is wrapped in a `Session` with the listener's idle policy
//! - runs the shell on its own task until it returns
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept and session errors are logged; the loop keeps serving

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use telnetd_core::{Session, SessionError, SessionInfo, Shell, ShellRegistry, TerminalResolver};

use super::settings::ListenerSettings;

/// Line sent to a client refused by the connection cap.
pub(crate) const CONNECTIONS_EXHAUSTED: &str = "Too many connections, please try again later.";

/// Line sent when the login shell cannot be constructed.
pub(crate) const SHELL_UNAVAILABLE: &str = "Login shell unavailable, closing connection.";

/// Everything the accept loop needs, moved onto its task.
pub(crate) struct Acceptor {
    pub(crate) endpoint: String,
    pub(crate) settings: ListenerSettings,
    pub(crate) shells: Arc<ShellRegistry>,
    pub(crate) terminals: Arc<TerminalResolver>,
    pub(crate) cancel: CancellationToken,
    pub(crate) permits: Option<Arc<Semaphore>>,
}

impl Acceptor {
    /// Accepts connections until the cancellation token fires.
    ///
    /// The listener is shared so that a restarted `PortListener` can take
    /// over a socket this loop has not released yet.
    pub(crate) async fn run(self, listener: Arc<TcpListener>) {
        let mut connection_count: u64 = 0;

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!(endpoint = %self.endpoint, "Accept loop shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            connection_count += 1;
                            self.dispatch(stream, peer, connection_count);
                        }
                        Err(e) => {
                            error!(endpoint = %self.endpoint, error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        info!(
            endpoint = %self.endpoint,
            connections = connection_count,
            "Listener closed"
        );
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr, connection: u64) {
        let terminal = self.terminals.resolve(None).map(str::to_string);
        let info = SessionInfo::new(self.endpoint.clone())
            .with_peer(peer)
            .with_terminal(terminal);
        let session = Session::new(stream, info)
            .with_idle_policy(self.settings.idle)
            .with_cancellation(self.cancel.child_token());

        let permit = match self.acquire_permit() {
            Ok(permit) => permit,
            Err(_exhausted) => {
                warn!(
                    endpoint = %self.endpoint,
                    peer = %peer,
                    limit = self.settings.max_connections,
                    "Connection refused: limit reached"
                );
                tokio::spawn(refuse(session, CONNECTIONS_EXHAUSTED));
                return;
            }
        };

        let shell = self.shells.lookup(&self.settings.login_shell);
        if shell.is_none() {
            warn!(
                endpoint = %self.endpoint,
                shell = %self.settings.login_shell,
                "Login shell not registered"
            );
        }

        debug!(endpoint = %self.endpoint, peer = %peer, connection, "Connection accepted");
        tokio::spawn(async move {
            let _permit = permit;
            serve(session, shell).await;
        });
    }

    /// Takes a connection permit; `Ok(None)` when there is no cap.
    fn acquire_permit(&self) -> Result<Option<OwnedSemaphorePermit>, TryAcquireError> {
        match &self.permits {
            Some(permits) => Arc::clone(permits).try_acquire_owned().map(Some),
            None => Ok(None),
        }
    }
}

/// Runs `shell` over `session`, then closes the connection.
pub(crate) async fn serve(mut session: Session, shell: Option<Box<dyn Shell>>) {
    let endpoint = session.info().endpoint.clone();
    let peer = session.info().peer;

    let Some(mut shell) = shell else {
        refuse(session, SHELL_UNAVAILABLE).await;
        return;
    };

    match shell.run(&mut session).await {
        Ok(()) => debug!(endpoint = %endpoint, peer = ?peer, "Session ended"),
        Err(SessionError::TimedOut) => {
            info!(endpoint = %endpoint, peer = ?peer, "Session timed out")
        }
        Err(e) => warn!(endpoint = %endpoint, peer = ?peer, error = %e, "Session failed"),
    }

    if let Err(e) = session.close().await {
        debug!(endpoint = %endpoint, error = %e, "Failed to close session");
    }
}

/// Writes a single explanatory line and closes the connection.
async fn refuse(mut session: Session, message: &'static str) {
    if let Err(e) = session.write_line(message).await {
        debug!(error = %e, "Failed to notify refused client");
    }
    if let Err(e) = session.close().await {
        debug!(error = %e, "Failed to close refused session");
    }
}
