//! Domain-specific error types following panic-free policy.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or reading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read configuration at {path}: {error}")]
    Read { path: PathBuf, error: String },

    /// The configuration text is not valid TOML
    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },

    /// A value shape that cannot be flattened into a key/value pair
    #[error("Unsupported value for {key}: {reason}")]
    Unsupported { key: String, reason: String },

    /// A required key is absent or empty
    #[error("Missing required setting: {key}")]
    Missing { key: String },

    /// A key is present but its value does not parse
    #[error("Invalid value for {key}: {value} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Errors raised while building the terminal resolver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TerminalError {
    /// Two terminals claim the same alias
    #[error("Terminal alias '{alias}' is claimed by both {first} and {second}")]
    DuplicateAlias {
        alias: String,
        first: String,
        second: String,
    },
}

/// Errors that end an interactive session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Underlying stream failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client sent a line longer than the session accepts
    #[error("Line exceeds maximum length of {max} bytes")]
    LineTooLong { max: usize },

    /// Client stayed idle past the warning and disconnect deadlines
    #[error("Session timed out after being idle")]
    TimedOut,
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            key: "std.port".to_string(),
            value: "abc".to_string(),
            reason: "invalid digit found in string".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("std.port"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn test_duplicate_alias_display() {
        let err = TerminalError::DuplicateAlias {
            alias: "default".to_string(),
            first: "vt100".to_string(),
            second: "ansi".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Terminal alias 'default' is claimed by both vt100 and ansi"
        );
    }
}
