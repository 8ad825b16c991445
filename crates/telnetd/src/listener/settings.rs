//! Per-listener settings read from `<name>.<key>`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::sync::Semaphore;

use telnetd_core::{ConfigError, ConfigSection, ConfigSnapshot, IdlePolicy};

/// Default cap on concurrent connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 25;

/// Default listen backlog.
pub const DEFAULT_BACKLOG: u32 = 5;

/// Default idle time before the client is warned (1 hour).
pub const DEFAULT_WARNING_MS: u64 = 3_600_000;

/// Default idle time after the warning before disconnect (1 minute).
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Validated settings for one `PortListener`.
///
/// | key               | meaning                                   |
/// |-------------------|-------------------------------------------|
/// | `port`            | TCP port, required (0 picks a free port)  |
/// | `address`         | bind address, default `0.0.0.0`           |
/// | `loginshell`      | shell key looked up per connection        |
/// | `maxcon`          | concurrent connection cap, 0 = unlimited  |
/// | `floodprotection` | listen backlog                            |
/// | `time_to_warning` | idle ms before a warning line             |
/// | `time_to_timedout`| further idle ms before disconnect         |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSettings {
    pub address: IpAddr,
    pub port: u16,
    pub login_shell: String,
    pub max_connections: usize,
    pub backlog: u32,
    pub idle: IdlePolicy,
}

impl ListenerSettings {
    /// Reads the settings of listener `name` from `config`.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Missing` if `port` or `loginshell` is absent
    /// - `ConfigError::Invalid` if any value does not parse, or `maxcon`
    ///   exceeds the largest connection cap a listener can enforce
    pub fn from_config(name: &str, config: &ConfigSnapshot) -> Result<Self, ConfigError> {
        let section = config.section(name);

        let warning_ms = section.parse_or("time_to_warning", DEFAULT_WARNING_MS)?;
        let timeout_ms = section.parse_or("time_to_timedout", DEFAULT_TIMEOUT_MS)?;

        Ok(Self {
            address: section.parse_or("address", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: section.parse_required("port")?,
            login_shell: section.require("loginshell")?.to_string(),
            max_connections: max_connections(&section)?,
            backlog: section.parse_or("floodprotection", DEFAULT_BACKLOG)?,
            idle: IdlePolicy {
                warning_after: Duration::from_millis(warning_ms),
                disconnect_after: Duration::from_millis(timeout_ms),
            },
        })
    }

    /// Returns the socket address to bind.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// Returns the connection cap, or `None` when unlimited.
    pub fn connection_limit(&self) -> Option<usize> {
        (self.max_connections > 0).then_some(self.max_connections)
    }
}

/// Reads `maxcon`, bounded by the semaphore that enforces it.
fn max_connections(section: &ConfigSection<'_>) -> Result<usize, ConfigError> {
    let limit = section.parse_or("maxcon", DEFAULT_MAX_CONNECTIONS)?;
    if limit > Semaphore::MAX_PERMITS {
        return Err(ConfigError::Invalid {
            key: section.key("maxcon"),
            value: limit.to_string(),
            reason: format!("must not exceed {}", Semaphore::MAX_PERMITS),
        });
    }
    Ok(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_settings_use_defaults() {
        let config: ConfigSnapshot = [("std.port", "6023"), ("std.loginshell", "echo")]
            .into_iter()
            .collect();

        let settings = ListenerSettings::from_config("std", &config).unwrap();

        assert_eq!(settings.bind_addr(), "0.0.0.0:6023".parse().unwrap());
        assert_eq!(settings.login_shell, "echo");
        assert_eq!(settings.connection_limit(), Some(DEFAULT_MAX_CONNECTIONS));
        assert_eq!(settings.backlog, DEFAULT_BACKLOG);
        assert_eq!(settings.idle, IdlePolicy::default());
    }

    #[test]
    fn test_full_settings() {
        let config = ConfigSnapshot::from_toml_str(
            r#"
[admin]
port = 7023
address = "127.0.0.1"
loginshell = "echo"
maxcon = 0
floodprotection = 16
time_to_warning = 1000
time_to_timedout = 500
"#,
        )
        .unwrap();

        let settings = ListenerSettings::from_config("admin", &config).unwrap();

        assert_eq!(settings.bind_addr(), "127.0.0.1:7023".parse().unwrap());
        assert_eq!(settings.connection_limit(), None);
        assert_eq!(settings.backlog, 16);
        assert_eq!(settings.idle.warning_after, Duration::from_millis(1000));
        assert_eq!(settings.idle.disconnect_after, Duration::from_millis(500));
    }

    #[test]
    fn test_settings_are_scoped_by_name() {
        let config: ConfigSnapshot = [("std.port", "6023"), ("std.loginshell", "echo")]
            .into_iter()
            .collect();

        let err = ListenerSettings::from_config("admin", &config).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                key: "admin.port".to_string()
            }
        );
    }

    #[test]
    fn test_missing_login_shell() {
        let config: ConfigSnapshot = [("std.port", "6023")].into_iter().collect();
        let err = ListenerSettings::from_config("std", &config).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                key: "std.loginshell".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_port_and_address() {
        let config: ConfigSnapshot = [
            ("std.port", "70000"),
            ("std.loginshell", "echo"),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            ListenerSettings::from_config("std", &config),
            Err(ConfigError::Invalid { ref key, .. }) if key == "std.port"
        ));

        let config: ConfigSnapshot = [
            ("std.port", "23"),
            ("std.address", "localhost"),
            ("std.loginshell", "echo"),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            ListenerSettings::from_config("std", &config),
            Err(ConfigError::Invalid { ref key, .. }) if key == "std.address"
        ));
    }

    #[test]
    fn test_connection_cap_above_semaphore_limit_rejected() {
        let config: ConfigSnapshot = [
            ("big.port", "0"),
            ("big.loginshell", "echo"),
            ("big.maxcon", "18446744073709551615"),
        ]
        .into_iter()
        .collect();

        let err = ListenerSettings::from_config("big", &config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { ref key, ref value, .. }
                if key == "big.maxcon" && value == "18446744073709551615"
        ));
    }

    #[test]
    fn test_connection_cap_at_semaphore_limit_accepted() {
        let max = Semaphore::MAX_PERMITS.to_string();
        let config: ConfigSnapshot = [
            ("big.port", "0"),
            ("big.loginshell", "echo"),
            ("big.maxcon", max.as_str()),
        ]
        .into_iter()
        .collect();

        let settings = ListenerSettings::from_config("big", &config).unwrap();
        assert_eq!(settings.connection_limit(), Some(Semaphore::MAX_PERMITS));
    }
}
