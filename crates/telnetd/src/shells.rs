//! Built-in shells.

use async_trait::async_trait;

use telnetd_core::{Session, SessionError, Shell, ShellRegistry, ShellRegistryBuilder};

/// Registry key of [`EchoShell`].
pub const ECHO_SHELL: &str = "echo";

/// Commands that end an echo session.
const EXIT_COMMANDS: [&str; 3] = ["exit", "quit", "logout"];

/// Echoes every line back until the client types `exit`.
#[derive(Debug, Default)]
pub struct EchoShell {
    echoed: usize,
}

impl EchoShell {
    /// Returns how many lines this shell has echoed.
    pub fn echoed(&self) -> usize {
        self.echoed
    }
}

#[async_trait]
impl Shell for EchoShell {
    async fn run(&mut self, session: &mut Session) -> Result<(), SessionError> {
        let greeting = format!(
            "Connected to {} (terminal: {}). Type 'exit' to leave.",
            session.info().endpoint,
            session.terminal().unwrap_or("unknown")
        );
        session.write_line(&greeting).await?;

        while let Some(line) = session.read_line().await? {
            if EXIT_COMMANDS.contains(&line.trim()) {
                session.write_line("Goodbye.").await?;
                break;
            }
            session.write_line(&line).await?;
            self.echoed += 1;
        }
        Ok(())
    }
}

/// Returns a registry builder pre-loaded with the built-in shells.
pub fn builtin_shells() -> ShellRegistryBuilder {
    ShellRegistry::builder().register_default::<EchoShell>(ECHO_SHELL)
}
