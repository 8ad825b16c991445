//! Line-framed sessions handed to shells.
//!
//! A `Session` wraps any byte stream (a TCP connection in production, an
//! in-memory duplex in tests) with newline framing. Incoming lines have
//! their trailing `\r\n` / `\n` removed; outgoing lines are terminated with
//! `\r\n`, which is what line-mode terminal clients expect.
//!
//! Reads are bounded by an [`IdlePolicy`]: after `warning_after` of silence
//! the client receives a warning line, and after a further
//! `disconnect_after` the read fails with `SessionError::TimedOut`.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Codec errors are mapped to `SessionError`

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;

use crate::error::SessionResult;
use crate::SessionError;

/// Maximum accepted line length in bytes.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Line sent to a client that has been idle for `warning_after`.
const IDLE_WARNING: &str = "Idle too long; you will be disconnected shortly.";

/// Any duplex byte stream a session can run over.
pub trait SessionStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> SessionStream for T {}

// ============================================================================
// Session Metadata
// ============================================================================

/// Idle deadlines applied to every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdlePolicy {
    /// Silence before the client is warned
    pub warning_after: Duration,
    /// Further silence after the warning before disconnect
    pub disconnect_after: Duration,
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self {
            warning_after: Duration::from_secs(3600),
            disconnect_after: Duration::from_secs(60),
        }
    }
}

/// Where a session came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Name of the endpoint that accepted the connection
    pub endpoint: String,
    /// Remote address, when known
    pub peer: Option<SocketAddr>,
    /// Canonical terminal type resolved for this session
    pub terminal: Option<String>,
}

impl SessionInfo {
    /// Creates session info for `endpoint` with no peer or terminal.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            peer: None,
            terminal: None,
        }
    }

    /// Sets the remote address.
    #[must_use]
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Sets the terminal type.
    #[must_use]
    pub fn with_terminal(mut self, terminal: Option<String>) -> Self {
        self.terminal = terminal;
        self
    }
}

// ============================================================================
// Session
// ============================================================================

/// Outcome of a single bounded read.
enum Read {
    Line(String),
    Closed,
    Idle,
}

/// A line-oriented conversation with one client.
pub struct Session {
    lines: Framed<Box<dyn SessionStream>, LinesCodec>,
    info: SessionInfo,
    idle: IdlePolicy,
    cancel: CancellationToken,
}

impl Session {
    /// Wraps `stream` with line framing and the default idle policy.
    pub fn new<S>(stream: S, info: SessionInfo) -> Self
    where
        S: SessionStream + 'static,
    {
        let boxed: Box<dyn SessionStream> = Box::new(stream);
        Self {
            lines: Framed::new(boxed, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
            info,
            idle: IdlePolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the idle policy.
    #[must_use]
    pub fn with_idle_policy(mut self, idle: IdlePolicy) -> Self {
        self.idle = idle;
        self
    }

    /// Ends pending and future reads when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the session metadata.
    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// Returns the resolved terminal type, if any.
    pub fn terminal(&self) -> Option<&str> {
        self.info.terminal.as_deref()
    }

    /// Returns the idle policy in effect.
    pub fn idle_policy(&self) -> IdlePolicy {
        self.idle
    }

    /// Returns true once the owning endpoint has asked sessions to end.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Reads the next line.
    ///
    /// Returns `Ok(None)` when the client closes the connection or the
    /// endpoint is stopping.
    ///
    /// # Errors
    ///
    /// - `SessionError::TimedOut` after the idle warning and disconnect deadlines
    /// - `SessionError::LineTooLong` if a line exceeds [`MAX_LINE_LENGTH`]
    /// - `SessionError::Io` on stream failure
    pub async fn read_line(&mut self) -> SessionResult<Option<String>> {
        match self.read_within(self.idle.warning_after).await? {
            Read::Line(line) => return Ok(Some(line)),
            Read::Closed => return Ok(None),
            Read::Idle => {}
        }

        self.write_line(IDLE_WARNING).await?;

        match self.read_within(self.idle.disconnect_after).await? {
            Read::Line(line) => Ok(Some(line)),
            Read::Closed => Ok(None),
            Read::Idle => Err(SessionError::TimedOut),
        }
    }

    /// Writes `line` followed by `\r\n` and flushes.
    pub async fn write_line(&mut self, line: &str) -> SessionResult<()> {
        // LinesCodec appends the `\n`.
        self.lines
            .send(format!("{line}\r"))
            .await
            .map_err(codec_error)
    }

    /// Flushes and shuts down the write side of the stream.
    pub async fn close(&mut self) -> SessionResult<()> {
        SinkExt::<String>::close(&mut self.lines)
            .await
            .map_err(codec_error)
    }

    async fn read_within(&mut self, limit: Duration) -> SessionResult<Read> {
        let cancel = self.cancel.clone();
        tokio::select! {
            _ = cancel.cancelled() => Ok(Read::Closed),
            result = timeout(limit, self.lines.next()) => match result {
                Err(_elapsed) => Ok(Read::Idle),
                Ok(None) => Ok(Read::Closed),
                Ok(Some(Ok(line))) => Ok(Read::Line(line)),
                Ok(Some(Err(e))) => Err(codec_error(e)),
            },
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("info", &self.info)
            .field("idle", &self.idle)
            .finish_non_exhaustive()
    }
}

fn codec_error(error: LinesCodecError) -> SessionError {
    match error {
        LinesCodecError::MaxLineLengthExceeded => SessionError::LineTooLong {
            max: MAX_LINE_LENGTH,
        },
        LinesCodecError::Io(e) => SessionError::Io(e),
    }
}
