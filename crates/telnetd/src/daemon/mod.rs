//! Daemon coordinator.
//!
//! `TelnetDaemon` owns the named endpoints and drives their lifecycle:
//!
//! ```text
//!   Assembling ──start()──▶ Running ──stop()──▶ Stopped
//!       │                      ▲                   │
//!   prepare(name)              └─────start()───────┘
//!       │
//!       ▼
//!  EndpointFactory::create ──▶ endpoint appended (Prepared)
//! ```
//!
//! Endpoints are constructed eagerly by `prepare` (so configuration errors
//! surface before anything serves) and only accept connections once
//! `start` reaches them. Start and stop fan out in preparation order.
//!
//! The coordinator is a sequential orchestrator: it never blocks on I/O
//! and does not supervise the tasks an endpoint spawns.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - A failing endpoint start is logged and never aborts the fan-out

mod bootstrap;
mod error;

pub use bootstrap::endpoint_names;
pub use error::BootstrapError;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use telnetd_core::{ConfigSnapshot, ShellRegistry, TerminalResolver};

use crate::endpoint::{Endpoint, EndpointFactory, EndpointState};

// ============================================================================
// Coordinator State
// ============================================================================

/// Lifecycle state of the coordinator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonState {
    /// Endpoints may still be prepared
    Assembling,
    /// `start` has been called
    Running,
    /// `stop` has been called
    Stopped,
}

/// Serializable snapshot of the coordinator, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaemonStatus {
    pub state: DaemonState,
    pub endpoints: Vec<EndpointStatus>,
}

/// Name and state of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointStatus {
    pub name: String,
    pub state: EndpointState,
}

/// An endpoint together with the lifecycle state the coordinator tracks.
struct Registered<E> {
    endpoint: E,
    state: EndpointState,
}

// ============================================================================
// Coordinator
// ============================================================================

/// Owns the registered endpoints and the collaborators they share.
pub struct TelnetDaemon<F: EndpointFactory> {
    factory: F,
    shells: Arc<ShellRegistry>,
    terminals: Arc<TerminalResolver>,
    endpoints: Vec<Registered<F::Endpoint>>,
    state: DaemonState,
}

impl<F: EndpointFactory> TelnetDaemon<F> {
    /// Creates an empty coordinator in the `Assembling` state.
    pub fn new(
        factory: F,
        shells: impl Into<Arc<ShellRegistry>>,
        terminals: impl Into<Arc<TerminalResolver>>,
    ) -> Self {
        Self {
            factory,
            shells: shells.into(),
            terminals: terminals.into(),
            endpoints: Vec::new(),
            state: DaemonState::Assembling,
        }
    }

    /// Constructs endpoint `name` and registers it as `Prepared`.
    ///
    /// Endpoints prepared before a failure stay registered; abandoning the
    /// whole boot is the caller's decision.
    ///
    /// # Errors
    ///
    /// - `BootstrapError::NotAssembling` once `start` has been called
    /// - `BootstrapError::InvalidName` for an empty name
    /// - `BootstrapError::DuplicateEndpoint` if `name` is already registered
    /// - `BootstrapError::Endpoint` if the factory fails
    pub fn prepare(&mut self, name: &str, config: &ConfigSnapshot) -> Result<(), BootstrapError> {
        if self.state != DaemonState::Assembling {
            return Err(BootstrapError::NotAssembling {
                name: name.to_string(),
            });
        }
        if name.is_empty() {
            return Err(BootstrapError::InvalidName);
        }
        if self.position(name).is_some() {
            return Err(BootstrapError::DuplicateEndpoint {
                name: name.to_string(),
            });
        }

        let endpoint = self
            .factory
            .create(
                name,
                config,
                Arc::clone(&self.shells),
                Arc::clone(&self.terminals),
            )
            .map_err(|source| BootstrapError::Endpoint {
                name: name.to_string(),
                source,
            })?;

        self.endpoints.push(Registered {
            endpoint,
            state: EndpointState::Prepared,
        });
        debug!(endpoint = %name, "Endpoint prepared");
        Ok(())
    }

    /// Starts every endpoint that is not already started, in registration
    /// order.
    ///
    /// Best effort: a failing endpoint is logged, keeps its previous state,
    /// and does not prevent the remaining endpoints from starting.
    pub fn start(&mut self) {
        debug!(endpoints = self.endpoints.len(), "Starting endpoints");

        let mut started = 0usize;
        for entry in &mut self.endpoints {
            if entry.state == EndpointState::Started {
                warn!(endpoint = %entry.endpoint.name(), "Endpoint already started");
                continue;
            }
            match entry.endpoint.start() {
                Ok(()) => {
                    entry.state = EndpointState::Started;
                    started += 1;
                    info!(endpoint = %entry.endpoint.name(), "Endpoint started");
                }
                Err(e) => {
                    error!(
                        endpoint = %entry.endpoint.name(),
                        error = %e,
                        "Failed to start endpoint"
                    );
                }
            }
        }

        self.state = DaemonState::Running;
        info!(started, total = self.endpoints.len(), "Daemon running");
    }

    /// Stops every started endpoint, in registration order.
    ///
    /// Endpoints that were never started or are already stopped are left
    /// untouched.
    pub fn stop(&mut self) {
        for entry in &mut self.endpoints {
            if entry.state != EndpointState::Started {
                continue;
            }
            entry.endpoint.stop();
            entry.state = EndpointState::Stopped;
            info!(endpoint = %entry.endpoint.name(), "Endpoint stopped");
        }

        self.state = DaemonState::Stopped;
        info!("Daemon stopped");
    }

    /// Finds a registered endpoint by name.
    ///
    /// Returns `None` for an empty or unknown name.
    pub fn resolve(&self, name: &str) -> Option<&F::Endpoint> {
        self.position(name)
            .and_then(|index| self.endpoints.get(index))
            .map(|entry| &entry.endpoint)
    }

    /// Returns the lifecycle state of endpoint `name`.
    pub fn endpoint_state(&self, name: &str) -> Option<EndpointState> {
        self.position(name)
            .and_then(|index| self.endpoints.get(index))
            .map(|entry| entry.state)
    }

    /// Returns the endpoint names in registration order.
    pub fn endpoint_names(&self) -> Vec<&str> {
        self.endpoints
            .iter()
            .map(|entry| entry.endpoint.name())
            .collect()
    }

    /// Returns the coordinator state.
    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Returns a serializable snapshot of the coordinator.
    pub fn status(&self) -> DaemonStatus {
        DaemonStatus {
            state: self.state,
            endpoints: self
                .endpoints
                .iter()
                .map(|entry| EndpointStatus {
                    name: entry.endpoint.name().to_string(),
                    state: entry.state,
                })
                .collect(),
        }
    }

    /// Returns the number of registered endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns true if no endpoints are registered.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Returns the shared shell registry.
    pub fn shells(&self) -> &Arc<ShellRegistry> {
        &self.shells
    }

    /// Returns the shared terminal resolver.
    pub fn terminals(&self) -> &Arc<TerminalResolver> {
        &self.terminals
    }

    fn position(&self, name: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        self.endpoints
            .iter()
            .position(|entry| entry.endpoint.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use crate::endpoint::EndpointError;

    /// Shared log of lifecycle calls, e.g. `"start:a"`.
    type CallLog = Arc<Mutex<Vec<String>>>;

    struct FakeEndpoint {
        name: String,
        log: CallLog,
        fail_start: bool,
    }

    impl Endpoint for FakeEndpoint {
        fn name(&self) -> &str {
            &self.name
        }

        fn start(&mut self) -> Result<(), EndpointError> {
            self.log.lock().unwrap().push(format!("start:{}", self.name));
            if self.fail_start {
                return Err(EndpointError::Other("bind refused".to_string()));
            }
            Ok(())
        }

        fn stop(&mut self) {
            self.log.lock().unwrap().push(format!("stop:{}", self.name));
        }
    }

    #[derive(Default)]
    struct FakeFactory {
        log: CallLog,
        fail_create: HashSet<String>,
        fail_start: HashSet<String>,
    }

    impl EndpointFactory for FakeFactory {
        type Endpoint = FakeEndpoint;

        fn create(
            &self,
            name: &str,
            _config: &ConfigSnapshot,
            _shells: Arc<ShellRegistry>,
            _terminals: Arc<TerminalResolver>,
        ) -> Result<FakeEndpoint, EndpointError> {
            self.log.lock().unwrap().push(format!("create:{name}"));
            if self.fail_create.contains(name) {
                return Err(EndpointError::Other("no such interface".to_string()));
            }
            Ok(FakeEndpoint {
                name: name.to_string(),
                log: Arc::clone(&self.log),
                fail_start: self.fail_start.contains(name),
            })
        }
    }

    fn daemon(factory: FakeFactory) -> TelnetDaemon<FakeFactory> {
        TelnetDaemon::new(
            factory,
            ShellRegistry::builder().build(),
            TerminalResolver::default(),
        )
    }

    fn calls(log: &CallLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn test_prepare_registers_in_order() {
        let mut daemon = daemon(FakeFactory::default());
        let config = ConfigSnapshot::new();

        for name in ["a", "b", "c"] {
            daemon.prepare(name, &config).unwrap();
        }

        assert_eq!(daemon.endpoint_names(), vec!["a", "b", "c"]);
        assert_eq!(daemon.endpoint_state("b"), Some(EndpointState::Prepared));
        assert_eq!(daemon.state(), DaemonState::Assembling);
    }

    #[test]
    fn test_resolve_known_unknown_and_empty() {
        let mut daemon = daemon(FakeFactory::default());
        daemon.prepare("std", &ConfigSnapshot::new()).unwrap();

        assert_eq!(daemon.resolve("std").map(|e| e.name()), Some("std"));
        assert!(daemon.resolve("admin").is_none());
        assert!(daemon.resolve("").is_none());
        assert!(daemon.endpoint_state("").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected_before_factory() {
        let factory = FakeFactory::default();
        let log = Arc::clone(&factory.log);
        let mut daemon = daemon(factory);
        let config = ConfigSnapshot::new();

        daemon.prepare("std", &config).unwrap();
        let err = daemon.prepare("std", &config).unwrap_err();

        assert!(matches!(err, BootstrapError::DuplicateEndpoint { ref name } if name == "std"));
        assert_eq!(calls(&log), vec!["create:std"]);
        assert_eq!(daemon.len(), 1);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut daemon = daemon(FakeFactory::default());
        let err = daemon.prepare("", &ConfigSnapshot::new()).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidName));
    }

    #[test]
    fn test_factory_failure_wraps_name_and_keeps_earlier_endpoints() {
        let factory = FakeFactory {
            fail_create: HashSet::from(["x".to_string()]),
            ..FakeFactory::default()
        };
        let mut daemon = daemon(factory);
        let config = ConfigSnapshot::new();

        daemon.prepare("a", &config).unwrap();
        let err = daemon.prepare("x", &config).unwrap_err();

        assert_eq!(err.endpoint(), Some("x"));
        assert!(err.to_string().contains("no such interface"));
        assert_eq!(daemon.endpoint_names(), vec!["a"]);
    }

    #[test]
    fn test_start_then_stop_in_registration_order() {
        let factory = FakeFactory::default();
        let log = Arc::clone(&factory.log);
        let mut daemon = daemon(factory);
        let config = ConfigSnapshot::new();
        daemon.prepare("a", &config).unwrap();
        daemon.prepare("b", &config).unwrap();

        daemon.start();
        assert_eq!(daemon.state(), DaemonState::Running);
        assert_eq!(daemon.endpoint_state("a"), Some(EndpointState::Started));

        daemon.stop();
        assert_eq!(daemon.state(), DaemonState::Stopped);
        assert_eq!(daemon.endpoint_state("a"), Some(EndpointState::Stopped));
        assert_eq!(daemon.endpoint_state("b"), Some(EndpointState::Stopped));

        assert_eq!(
            calls(&log),
            vec!["create:a", "create:b", "start:a", "start:b", "stop:a", "stop:b"]
        );
    }

    #[test]
    fn test_start_and_stop_with_no_endpoints() {
        let mut daemon = daemon(FakeFactory::default());
        daemon.start();
        daemon.stop();
        assert!(daemon.is_empty());
        assert_eq!(daemon.state(), DaemonState::Stopped);
    }

    #[test]
    fn test_failing_start_does_not_block_others() {
        let factory = FakeFactory {
            fail_start: HashSet::from(["b".to_string()]),
            ..FakeFactory::default()
        };
        let log = Arc::clone(&factory.log);
        let mut daemon = daemon(factory);
        let config = ConfigSnapshot::new();
        for name in ["a", "b", "c"] {
            daemon.prepare(name, &config).unwrap();
        }

        daemon.start();

        assert_eq!(daemon.endpoint_state("a"), Some(EndpointState::Started));
        assert_eq!(daemon.endpoint_state("b"), Some(EndpointState::Prepared));
        assert_eq!(daemon.endpoint_state("c"), Some(EndpointState::Started));

        // The failed endpoint was never started, so stop skips it.
        daemon.stop();
        assert_eq!(daemon.endpoint_state("b"), Some(EndpointState::Prepared));
        assert!(!calls(&log).contains(&"stop:b".to_string()));
    }

    #[test]
    fn test_repeated_start_is_noop_for_started_endpoints() {
        let factory = FakeFactory::default();
        let log = Arc::clone(&factory.log);
        let mut daemon = daemon(factory);
        daemon.prepare("a", &ConfigSnapshot::new()).unwrap();

        daemon.start();
        daemon.start();

        let starts = calls(&log).iter().filter(|c| *c == "start:a").count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn test_restart_after_stop() {
        let factory = FakeFactory::default();
        let log = Arc::clone(&factory.log);
        let mut daemon = daemon(factory);
        daemon.prepare("a", &ConfigSnapshot::new()).unwrap();

        daemon.start();
        daemon.stop();
        daemon.start();

        assert_eq!(daemon.endpoint_state("a"), Some(EndpointState::Started));
        let starts = calls(&log).iter().filter(|c| *c == "start:a").count();
        assert_eq!(starts, 2);
    }

    #[test]
    fn test_prepare_after_start_rejected() {
        let mut daemon = daemon(FakeFactory::default());
        daemon.start();

        let err = daemon.prepare("late", &ConfigSnapshot::new()).unwrap_err();
        assert!(matches!(err, BootstrapError::NotAssembling { ref name } if name == "late"));
        assert!(daemon.is_empty());
    }

    #[test]
    fn test_stop_skips_never_started_endpoints() {
        let factory = FakeFactory::default();
        let log = Arc::clone(&factory.log);
        let mut daemon = daemon(factory);
        daemon.prepare("a", &ConfigSnapshot::new()).unwrap();

        daemon.stop();

        assert_eq!(daemon.endpoint_state("a"), Some(EndpointState::Prepared));
        assert_eq!(calls(&log), vec!["create:a"]);
    }

    #[test]
    fn test_status_snapshot() {
        let mut daemon = daemon(FakeFactory::default());
        daemon.prepare("std", &ConfigSnapshot::new()).unwrap();
        daemon.start();

        let status = daemon.status();
        assert_eq!(status.state, DaemonState::Running);
        assert_eq!(
            status.endpoints,
            vec![EndpointStatus {
                name: "std".to_string(),
                state: EndpointState::Started,
            }]
        );

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "running");
        assert_eq!(json["endpoints"][0]["state"], "started");
    }
}
