//! # Engine Configuration
//!
//! Loads `agribill.toml`, applies environment overrides, and validates.
//!
//! ## Priority (highest wins)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Environment variables   AGRIBILL_DB_PATH, AGRIBILL_START_LEGACY ...│
//! │  2. Config file             agribill.toml                              │
//! │  3. Defaults                ./agribill.db, counters start at 0         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```toml
//! [database]
//! path = "/var/lib/agribill/agribill.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [numbering.start_values]
//! fertilizer = 0
//! pesticide = 0
//! general = 0
//! legacy = 1450
//! ```

use agribill_core::Category;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

// =============================================================================
// Sections
// =============================================================================

/// `[database]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    /// How long SQLite waits on a locked database before reporting busy.
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: PathBuf::from("./agribill.db"),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 30,
            busy_timeout_ms: 5000,
        }
    }
}

/// Value a counter row is created with the first time its category is used.
///
/// The first bill issued in a category gets `start + 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceStarts {
    pub fertilizer: i64,
    pub pesticide: i64,
    pub general: i64,
    pub legacy: i64,
}

impl SequenceStarts {
    pub fn get(&self, category: Category) -> i64 {
        match category {
            Category::Fertilizer => self.fertilizer,
            Category::Pesticide => self.pesticide,
            Category::General => self.general,
            Category::Legacy => self.legacy,
        }
    }

    pub fn set(&mut self, category: Category, value: i64) {
        match category {
            Category::Fertilizer => self.fertilizer = value,
            Category::Pesticide => self.pesticide = value,
            Category::General => self.general = value,
            Category::Legacy => self.legacy = value,
        }
    }
}

/// `[numbering]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberingSettings {
    pub start_values: SequenceStarts,
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database: DatabaseSettings,
    pub numbering: NumberingSettings,
}

impl EngineConfig {
    /// Loads configuration with the following priority:
    /// 1. Environment variables (highest)
    /// 2. Config file
    /// 3. Defaults (lowest)
    pub fn load(config_path: Option<&Path>) -> DbResult<Self> {
        let mut config = match config_path {
            Some(path) if path.exists() => {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(path)
                    .map_err(|e| DbError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
                Self::from_toml(&contents)?
            }
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml(contents: &str) -> DbResult<Self> {
        toml::from_str(contents).map_err(|e| DbError::InvalidConfig(e.to_string()))
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// `load`). Unparseable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("AGRIBILL_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(raw) = lookup("AGRIBILL_MAX_CONNECTIONS") {
            match raw.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %raw, "Ignoring invalid AGRIBILL_MAX_CONNECTIONS"),
            }
        }

        if let Some(raw) = lookup("AGRIBILL_BUSY_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(ms) => self.database.busy_timeout_ms = ms,
                Err(_) => warn!(value = %raw, "Ignoring invalid AGRIBILL_BUSY_TIMEOUT_MS"),
            }
        }

        for category in Category::ALL {
            let key = format!("AGRIBILL_START_{}", category.as_str().to_uppercase());
            if let Some(raw) = lookup(&key) {
                match raw.parse::<i64>() {
                    Ok(start) => {
                        debug!(%category, start, "Overriding sequence start from environment");
                        self.numbering.start_values.set(category, start);
                    }
                    Err(_) => warn!(key = %key, value = %raw, "Ignoring invalid sequence start"),
                }
            }
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::InvalidConfig("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(DbError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(DbError::InvalidConfig(
                "database.min_connections must not exceed max_connections".into(),
            ));
        }

        for category in Category::ALL {
            if self.numbering.start_values.get(category) < 0 {
                return Err(DbError::InvalidConfig(format!(
                    "numbering.start_values.{} must not be negative",
                    category
                )));
            }
        }

        Ok(())
    }

    /// Builds the pool configuration.
    pub fn to_db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
            .sequence_starts(self.numbering.start_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.database.path, PathBuf::from("./agribill.db"));
        assert_eq!(config.numbering.start_values, SequenceStarts::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [database]
            path = "/tmp/shop.db"

            [numbering.start_values]
            legacy = 1450
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/shop.db"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.numbering.start_values.legacy, 1450);
        assert_eq!(config.numbering.start_values.fertilizer, 0);
    }

    #[test]
    fn test_malformed_toml_is_invalid_config() {
        let err = EngineConfig::from_toml("[database\npath = 1").unwrap_err();
        assert!(matches!(err, DbError::InvalidConfig(_)));
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut config = EngineConfig::from_toml("[database]\nmax_connections = 2").unwrap();
        let env: HashMap<&str, &str> = [
            ("AGRIBILL_DB_PATH", "/data/agribill.db"),
            ("AGRIBILL_MAX_CONNECTIONS", "8"),
            ("AGRIBILL_START_PESTICIDE", "120"),
            ("AGRIBILL_BUSY_TIMEOUT_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/data/agribill.db"));
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert_eq!(config.numbering.start_values.pesticide, 120);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.numbering.start_values.general = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_db_config_carries_starts() {
        let mut config = EngineConfig::default();
        config.numbering.start_values.legacy = 99;
        let db = config.to_db_config();
        assert_eq!(db.sequence_starts.legacy, 99);
        assert_eq!(db.busy_timeout, Duration::from_millis(5000));
    }
}
