//! Terminal-type resolution.
//!
//! Maps a client-requested terminal type to one of the terminals declared
//! in configuration:
//!
//! ```toml
//! terminals = ["vt100", "ansi"]
//!
//! [term.vt100]
//! aliases = ["default", "vt100-am", "vt102"]
//!
//! [term.ansi]
//! aliases = ["color-xterm", "xterm"]
//! ```
//!
//! Names and aliases match case-insensitively. The terminal owning the
//! `default` alias is the fallback for unknown or absent requests; without
//! one, the first declared terminal is used.

use std::collections::HashMap;

use tracing::debug;

use crate::{ConfigSnapshot, TerminalError};

/// Terminal used when configuration declares none.
pub const DEFAULT_TERMINAL: &str = "vt100";

/// Alias marking the fallback terminal.
const DEFAULT_ALIAS: &str = "default";

/// Key holding the list of declared terminals.
const TERMINALS_KEY: &str = "terminals";

/// Shared, read-only terminal lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalResolver {
    /// Declared terminals in configuration order
    terminals: Vec<String>,
    /// Lowercased name or alias to canonical terminal name
    aliases: HashMap<String, String>,
    /// Terminal returned for unknown requests
    fallback: Option<String>,
}

impl Default for TerminalResolver {
    fn default() -> Self {
        Self {
            terminals: vec![DEFAULT_TERMINAL.to_string()],
            aliases: HashMap::from([(DEFAULT_TERMINAL.to_string(), DEFAULT_TERMINAL.to_string())]),
            fallback: Some(DEFAULT_TERMINAL.to_string()),
        }
    }
}

impl TerminalResolver {
    /// Builds a resolver from `(name, aliases)` pairs.
    ///
    /// An empty input yields a resolver that resolves nothing.
    ///
    /// # Errors
    ///
    /// - `TerminalError::DuplicateAlias` if two terminals share a name or alias
    pub fn new<I, A>(terminals: I) -> Result<Self, TerminalError>
    where
        I: IntoIterator<Item = (String, A)>,
        A: IntoIterator<Item = String>,
    {
        let mut names = Vec::new();
        let mut aliases: HashMap<String, String> = HashMap::new();
        let mut fallback = None;

        for (name, terminal_aliases) in terminals {
            let keys = std::iter::once(name.clone()).chain(terminal_aliases);
            for alias in keys {
                let key = alias.to_ascii_lowercase();
                if let Some(first) = aliases.get(&key) {
                    if first != &name {
                        return Err(TerminalError::DuplicateAlias {
                            alias,
                            first: first.clone(),
                            second: name,
                        });
                    }
                    continue;
                }
                if key == DEFAULT_ALIAS {
                    fallback = Some(name.clone());
                }
                aliases.insert(key, name.clone());
            }
            if !names.contains(&name) {
                names.push(name);
            }
        }

        let fallback = fallback.or_else(|| names.first().cloned());
        Ok(Self {
            terminals: names,
            aliases,
            fallback,
        })
    }

    /// Builds a resolver from `terminals` and `term.<name>.aliases`.
    ///
    /// Without a `terminals` key the default resolver is returned.
    pub fn from_config(config: &ConfigSnapshot) -> Result<Self, TerminalError> {
        let names = config.list(TERMINALS_KEY);
        if names.is_empty() {
            debug!("No terminals configured, using {DEFAULT_TERMINAL}");
            return Ok(Self::default());
        }

        let resolver = Self::new(names.into_iter().map(|name| {
            let aliases: Vec<String> = config
                .list(&format!("term.{name}.aliases"))
                .into_iter()
                .map(str::to_string)
                .collect();
            (name.to_string(), aliases)
        }))?;

        debug!(
            terminals = resolver.terminals.len(),
            fallback = ?resolver.fallback,
            "Terminal resolver configured"
        );
        Ok(resolver)
    }

    /// Resolves `requested` to a canonical terminal name.
    ///
    /// Unknown, empty or absent requests fall back to the default terminal.
    pub fn resolve(&self, requested: Option<&str>) -> Option<&str> {
        requested
            .filter(|name| !name.is_empty())
            .and_then(|name| self.aliases.get(&name.to_ascii_lowercase()))
            .or(self.fallback.as_ref())
            .map(String::as_str)
    }

    /// Returns the fallback terminal.
    pub fn default_terminal(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    /// Returns the declared terminals in configuration order.
    pub fn terminals(&self) -> impl Iterator<Item = &str> {
        self.terminals.iter().map(String::as_str)
    }
}
