//! Configuration snapshots.
//!
//! A `ConfigSnapshot` is an immutable, ordered bag of dotted keys
//! (`std.port`, `term.vt100.aliases`) mapped to string values. It is
//! usually loaded from a TOML file, whose tables are flattened into
//! dotted keys and whose arrays are joined with commas:
//!
//! ```toml
//! listeners = ["std", "admin"]
//!
//! [std]
//! port = 6023
//! loginshell = "echo"
//! ```
//!
//! becomes `listeners = "std,admin"`, `std.port = "6023"`,
//! `std.loginshell = "echo"`.
//!
//! The daemon itself only interprets [`LISTENERS_KEY`]; every other key is
//! passed through to the endpoint factory untouched.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::ConfigError;

/// Key holding the comma-separated list of endpoint names.
pub const LISTENERS_KEY: &str = "listeners";

/// Separator used for list-valued settings.
const LIST_SEPARATOR: char = ',';

// ============================================================================
// Snapshot
// ============================================================================

/// Immutable key/value configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConfigSnapshot {
    entries: BTreeMap<String, String>,
}

impl ConfigSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses TOML text into a flattened snapshot.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Parse` if the text is not valid TOML
    /// - `ConfigError::Unsupported` for arrays holding tables or nested arrays
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = text.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
            reason: e.to_string(),
        })?;

        let mut entries = BTreeMap::new();
        flatten_table(None, &table, &mut entries)?;
        Ok(Self { entries })
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Read` if the file cannot be read
    /// - any error from [`ConfigSnapshot::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Returns the raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Splits a comma-separated value into trimmed, non-empty items.
    ///
    /// A missing key yields an empty list.
    pub fn list(&self, key: &str) -> Vec<&str> {
        self.get(key)
            .map(|value| {
                value
                    .split(LIST_SEPARATOR)
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns a view over the keys below `prefix.`.
    pub fn section<'a>(&'a self, prefix: &str) -> ConfigSection<'a> {
        ConfigSection {
            snapshot: self,
            prefix: prefix.to_string(),
        }
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ConfigSnapshot
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn join_key(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}.{key}"),
        None => key.to_string(),
    }
}

fn flatten_table(
    prefix: Option<&str>,
    table: &toml::Table,
    out: &mut BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    for (key, value) in table {
        let full_key = join_key(prefix, key);
        match value {
            toml::Value::Table(inner) => flatten_table(Some(&full_key), inner, out)?,
            toml::Value::Array(items) => {
                let mut joined = Vec::with_capacity(items.len());
                for item in items {
                    joined.push(scalar_to_string(&full_key, item)?);
                }
                out.insert(full_key, joined.join(","));
            }
            scalar => {
                let text = scalar_to_string(&full_key, scalar)?;
                out.insert(full_key, text);
            }
        }
    }
    Ok(())
}

fn scalar_to_string(key: &str, value: &toml::Value) -> Result<String, ConfigError> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        toml::Value::Array(_) => Err(ConfigError::Unsupported {
            key: key.to_string(),
            reason: "nested arrays cannot be flattened".to_string(),
        }),
        toml::Value::Table(_) => Err(ConfigError::Unsupported {
            key: key.to_string(),
            reason: "arrays of tables cannot be flattened".to_string(),
        }),
    }
}

// ============================================================================
// Section View
// ============================================================================

/// Borrowed view over the settings of one named component.
///
/// `section("std").get("port")` reads `std.port`.
#[derive(Debug, Clone)]
pub struct ConfigSection<'a> {
    snapshot: &'a ConfigSnapshot,
    prefix: String,
}

impl<'a> ConfigSection<'a> {
    /// Returns the section prefix.
    pub fn name(&self) -> &str {
        &self.prefix
    }

    /// Returns the fully qualified key for `key`.
    pub fn key(&self, key: &str) -> String {
        join_key(Some(&self.prefix), key)
    }

    /// Returns the raw value, treating blank values as absent.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.snapshot
            .get(&self.key(key))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Returns the raw value or `ConfigError::Missing`.
    pub fn require(&self, key: &str) -> Result<&'a str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::Missing { key: self.key(key) })
    }

    /// Parses a required value.
    pub fn parse_required<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.require(key)?;
        self.parse_value(key, raw)
    }

    /// Parses an optional value, falling back to `default` when absent.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(raw) => self.parse_value(key, raw),
            None => Ok(default),
        }
    }

    fn parse_value<T>(&self, key: &str, raw: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: self.key(key),
            value: raw.to_string(),
            reason: e.to_string(),
        })
    }
}
