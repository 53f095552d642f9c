//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result};

use crate::gather::{ColumnMode, Dialect};

/// Kernel configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL. Only needed for commands that touch storage.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// SQL dialect used when compiling filters offline (default: postgres).
    pub dialect: Dialect,

    /// Columns selected when a filter does not say (default: preview).
    pub column_mode: ColumnMode,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let database_max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let dialect = lookup("SHEAF_DIALECT")
            .unwrap_or_else(|| "postgres".to_string())
            .parse()
            .context("SHEAF_DIALECT must be 'postgres' or 'sqlite'")?;

        let column_mode = lookup("SHEAF_COLUMN_MODE")
            .unwrap_or_else(|| "preview".to_string())
            .parse()
            .context("SHEAF_COLUMN_MODE must be 'preview' or 'full'")?;

        Ok(Self {
            database_url,
            database_max_connections,
            dialect,
            column_mode,
        })
    }

    /// The database URL, or an error naming the missing variable.
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL environment variable is required")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.dialect, Dialect::Postgres);
        assert_eq!(config.column_mode, ColumnMode::Preview);
        assert!(config.require_database_url().is_err());
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/sheaf"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("SHEAF_DIALECT", "sqlite"),
            ("SHEAF_COLUMN_MODE", "full"),
        ])
        .unwrap();
        assert_eq!(
            config.require_database_url().unwrap(),
            "postgres://localhost/sheaf"
        );
        assert_eq!(config.database_max_connections, 4);
        assert_eq!(config.dialect, Dialect::Sqlite);
        assert_eq!(config.column_mode, ColumnMode::Full);
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(config(&[("DATABASE_MAX_CONNECTIONS", "many")]).is_err());
        assert!(config(&[("SHEAF_DIALECT", "oracle")]).is_err());
        assert!(config(&[("SHEAF_COLUMN_MODE", "everything")]).is_err());
    }

    #[test]
    fn blank_database_url_is_unset() {
        let config = config(&[("DATABASE_URL", "  ")]).unwrap();
        assert!(config.database_url.is_none());
    }
}
