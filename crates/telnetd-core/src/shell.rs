//! Interactive shells and the session-factory registry.
//!
//! Every accepted connection asks the `ShellRegistry` for a fresh shell by
//! key (the endpoint's configured login shell). The registry is assembled
//! once through `ShellRegistryBuilder` and is read-only afterwards, so it
//! can be shared across endpoints behind an `Arc` and looked up
//! concurrently without locking.
//!
//! An unknown key is a normal `None` result, not an error: the caller
//! decides whether a missing shell is fatal to one connection or to the
//! whole daemon.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use tracing::debug;

use crate::session::Session;
use crate::SessionError;

// ============================================================================
// Shell
// ============================================================================

/// One interactive unit of work, driven over a single session.
///
/// A new instance is constructed for every connection, so implementations
/// may keep per-connection state in `self`.
#[async_trait]
pub trait Shell: Send {
    /// Runs the shell until the client leaves or the session fails.
    async fn run(&mut self, session: &mut Session) -> Result<(), SessionError>;
}

/// Zero-argument constructor producing a new shell.
pub type ShellConstructor = Box<dyn Fn() -> Box<dyn Shell> + Send + Sync>;

// ============================================================================
// Registry
// ============================================================================

/// Immutable mapping from shell key to shell constructor.
pub struct ShellRegistry {
    factories: HashMap<String, ShellConstructor>,
}

impl ShellRegistry {
    /// Starts building a registry.
    pub fn builder() -> ShellRegistryBuilder {
        ShellRegistryBuilder::default()
    }

    /// Constructs a new shell for `key`.
    ///
    /// Returns `None` for an empty or unregistered key. Each hit constructs
    /// exactly one new instance; shells are never cached or shared.
    pub fn lookup(&self, key: &str) -> Option<Box<dyn Shell>> {
        if key.is_empty() {
            return None;
        }
        self.factories.get(key).map(|construct| construct())
    }

    /// Returns true if a constructor is registered for `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Returns the registered keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Returns the number of registered shells.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true if no shells are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ShellRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

/// Collects shell constructors before freezing them into a `ShellRegistry`.
#[derive(Default)]
pub struct ShellRegistryBuilder {
    factories: HashMap<String, ShellConstructor>,
}

impl ShellRegistryBuilder {
    /// Registers a constructor under `key`. A later registration for the
    /// same key replaces the earlier one.
    pub fn register<F>(mut self, key: impl Into<String>, construct: F) -> Self
    where
        F: Fn() -> Box<dyn Shell> + Send + Sync + 'static,
    {
        let key = key.into();
        if self.factories.insert(key.clone(), Box::new(construct)).is_some() {
            debug!(shell = %key, "Replaced previously registered shell");
        }
        self
    }

    /// Registers `S::default()` as the constructor for `key`.
    pub fn register_default<S>(self, key: impl Into<String>) -> Self
    where
        S: Shell + Default + 'static,
    {
        self.register(key, || Box::new(S::default()))
    }

    /// Freezes the registry.
    pub fn build(self) -> ShellRegistry {
        ShellRegistry {
            factories: self.factories,
        }
    }
}
