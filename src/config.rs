//! Connection settings for the `sqlbind` command line tool.
//!
//! The connection is resolved from, highest priority first:
//! 1. `--driver` / `--dsn` / `--pool-size` / `--timeout-ms` flags
//! 2. `.sqlbind.json` in the current directory
//! 3. `SQLBIND_DRIVER` and `SQLBIND_DSN` environment variables

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::Path;

use crate::db::ConnectOptions;

pub const CONFIG_FILE_NAME: &str = ".sqlbind.json";
pub const DRIVER_ENV: &str = "SQLBIND_DRIVER";
pub const DSN_ENV: &str = "SQLBIND_DSN";

/// Top-level configuration file structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub connection: ConnectionConfig,
}

/// Everything needed to open one handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub driver: String,
    pub dsn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ConnectionConfig {
    pub fn options(&self) -> ConnectOptions {
        ConnectOptions {
            pool_size: self.pool_size,
            timeout_ms: self.timeout_ms,
        }
    }
}

/// Connection settings given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOverrides {
    pub driver: Option<String>,
    pub dsn: Option<String>,
    pub pool_size: Option<u32>,
    pub timeout_ms: Option<u64>,
}

impl ConfigFile {
    /// Load `.sqlbind.json` from the current directory, if present.
    pub fn load() -> Result<Option<Self>, Box<dyn Error>> {
        Self::load_from(Path::new("."))
    }

    /// Load `.sqlbind.json` from `dir`. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not
    /// valid JSON with a `connection` object.
    pub fn load_from(dir: &Path) -> Result<Option<Self>, Box<dyn Error>> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| format!("Failed to read {}: {}", config_path.display(), e))?;
        let config: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| format!("Invalid JSON in {}: {}", config_path.display(), e))?;
        Ok(Some(config))
    }
}

/// Read the connection from environment variables through `lookup`.
/// Both the driver and the DSN must be set.
pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Option<ConnectionConfig> {
    let driver = lookup(DRIVER_ENV)?;
    let dsn = lookup(DSN_ENV)?;
    Some(ConnectionConfig {
        driver,
        dsn,
        pool_size: None,
        timeout_ms: None,
    })
}

/// Merge command line flags over the config file or environment.
pub fn resolve(
    overrides: ConnectionOverrides,
    file: Option<ConfigFile>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ConnectionConfig, Box<dyn Error>> {
    let base = file.map(|f| f.connection).or_else(|| from_env(env));

    let driver = overrides.driver.or_else(|| base.as_ref().map(|b| b.driver.clone()));
    let dsn = overrides.dsn.or_else(|| base.as_ref().map(|b| b.dsn.clone()));

    let (Some(driver), Some(dsn)) = (driver, dsn) else {
        return Err(format!(
            "No database connection configured.\n\n\
             Use one of:\n  \
               --driver sqlite3 --dsn ./test.db\n  \
               a {} file: {{\"connection\": {{\"driver\": \"sqlite3\", \"dsn\": \"./test.db\"}}}}\n  \
               {}=sqlite3 {}=./test.db",
            CONFIG_FILE_NAME, DRIVER_ENV, DSN_ENV
        )
        .into());
    };

    Ok(ConnectionConfig {
        driver,
        dsn,
        pool_size: overrides.pool_size.or_else(|| base.as_ref().and_then(|b| b.pool_size)),
        timeout_ms: overrides.timeout_ms.or_else(|| base.as_ref().and_then(|b| b.timeout_ms)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn file(driver: &str, dsn: &str) -> ConfigFile {
        ConfigFile {
            connection: ConnectionConfig {
                driver: driver.to_string(),
                dsn: dsn.to_string(),
                pool_size: Some(4),
                timeout_ms: None,
            },
        }
    }

    #[rstest]
    fn test_deserialization() {
        let json = r#"
        {
            "connection": {
                "driver": "postgres",
                "dsn": "postgres://localhost/k6",
                "pool_size": 8,
                "timeout_ms": 500
            }
        }
        "#;
        let config: ConfigFile = serde_json::from_str(json).unwrap();
        assert_eq!(config.connection.driver, "postgres");
        assert_eq!(
            config.connection.options(),
            ConnectOptions {
                pool_size: Some(8),
                timeout_ms: Some(500)
            }
        );
    }

    #[rstest]
    fn test_optional_fields_default() {
        let json = r#"{"connection": {"driver": "sqlite3", "dsn": ":memory:"}}"#;
        let config: ConfigFile = serde_json::from_str(json).unwrap();
        assert_eq!(config.connection.options(), ConnectOptions::default());
    }

    #[rstest]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(ConfigFile::load_from(dir.path()).unwrap().is_none());
    }

    #[rstest]
    fn test_load_invalid_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();
        let err = ConfigFile::load_from(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[rstest]
    fn test_load_valid_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"connection": {"driver": "sqlite3", "dsn": "./test.db"}}"#,
        )
        .unwrap();
        let config = ConfigFile::load_from(dir.path()).unwrap().unwrap();
        assert_eq!(config.connection.dsn, "./test.db");
    }

    #[rstest]
    fn test_flags_override_file() {
        let overrides = ConnectionOverrides {
            dsn: Some(":memory:".to_string()),
            timeout_ms: Some(100),
            ..Default::default()
        };
        let resolved = resolve(overrides, Some(file("sqlite3", "./test.db")), no_env).unwrap();
        assert_eq!(resolved.driver, "sqlite3");
        assert_eq!(resolved.dsn, ":memory:");
        assert_eq!(resolved.pool_size, Some(4));
        assert_eq!(resolved.timeout_ms, Some(100));
    }

    #[rstest]
    fn test_file_wins_over_env() {
        let vars = env_of(&[(DRIVER_ENV, "postgres"), (DSN_ENV, "postgres://localhost/k6")]);
        let env = |key: &str| vars.get(key).cloned();
        let resolved = resolve(ConnectionOverrides::default(), Some(file("sqlite3", "./test.db")), env).unwrap();
        assert_eq!(resolved.driver, "sqlite3");
    }

    #[rstest]
    fn test_env_used_without_file() {
        let vars = env_of(&[(DRIVER_ENV, "sqlite3"), (DSN_ENV, ":memory:")]);
        let resolved = resolve(ConnectionOverrides::default(), None, |key: &str| vars.get(key).cloned()).unwrap();
        assert_eq!(resolved.dsn, ":memory:");
    }

    #[rstest]
    fn test_env_requires_both_variables() {
        let vars = env_of(&[(DRIVER_ENV, "sqlite3")]);
        assert!(from_env(|key: &str| vars.get(key).cloned()).is_none());
    }

    #[rstest]
    fn test_nothing_configured() {
        let err = resolve(ConnectionOverrides::default(), None, no_env).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(CONFIG_FILE_NAME));
        assert!(msg.contains(DRIVER_ENV));
    }
}
