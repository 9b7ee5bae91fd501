//! Backend selection inputs: the designator string and the key/value mapping
//! handed to the chosen driver.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DbError;

/// Designators that select the embedded backend without a warning.
const EMBEDDED_ALIASES: &[&str] = &["", "sqlite", "sqlite3", "embedded"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// MySQL-compatible server reached over the network.
    Networked,
    /// Single-file SQLite database.
    Embedded,
}

impl BackendKind {
    /// `"sql"` in any case selects the networked backend. Everything else
    /// falls back to the embedded one.
    pub fn from_designator(designator: &str) -> Self {
        if designator.eq_ignore_ascii_case("sql") {
            return BackendKind::Networked;
        }

        let lowered = designator.to_ascii_lowercase();
        if !EMBEDDED_ALIASES.contains(&lowered.as_str()) {
            warn!(
                "Unrecognised database type {:?}, falling back to embedded SQLite",
                designator
            );
        }
        BackendKind::Embedded
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Networked => f.write_str("mysql"),
            BackendKind::Embedded => f.write_str("sqlite"),
        }
    }
}

/// Opaque connection settings, passed through to the driver.
///
/// Embedded: `database` (or `path`), optional `foreign_keys = on`.
/// Networked: `url`, or `host`, `port`, `user`, `password`, `database` (or `db`).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DbConfig(BTreeMap<String, String>);

impl DbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config for an embedded database file.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::new().with("database", path)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// First key present out of `keys`.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn require_any(&self, keys: &[&str]) -> Result<&str, DbError> {
        self.get_any(keys)
            .ok_or_else(|| DbError::Config(format!("missing `{}`", keys.join("` or `"))))
    }

    /// Boolean flag: `1`, `true`, `on` and `yes` are truthy.
    pub fn flag(&self, key: &str) -> bool {
        matches!(
            self.get(key).map(str::to_ascii_lowercase).as_deref(),
            Some("1" | "true" | "on" | "yes")
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DbConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// Keeps passwords out of logs.
impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.0 {
            if matches!(key.as_str(), "password" | "passwd" | "url") {
                map.entry(key, &"***");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_designator_is_case_insensitive() {
        for designator in ["sql", "SQL", "Sql", "sQl"] {
            assert_eq!(BackendKind::from_designator(designator), BackendKind::Networked);
        }
    }

    #[test]
    fn everything_else_is_embedded() {
        for designator in ["sqlite", "SQLite3", "", "postgres", "sql ", "mysql"] {
            assert_eq!(BackendKind::from_designator(designator), BackendKind::Embedded);
        }
    }

    #[test]
    fn lookups_and_flags() {
        let config: DbConfig = [("db", "archive"), ("foreign_keys", "ON")].into_iter().collect();
        assert_eq!(config.get_any(&["database", "db"]), Some("archive"));
        assert!(config.flag("foreign_keys"));
        assert!(!config.flag("missing"));
        assert!(matches!(config.require_any(&["host"]), Err(DbError::Config(_))));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = DbConfig::new().with("user", "bot").with("password", "hunter2");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("bot"));
        assert!(!rendered.contains("hunter2"));
    }
}
