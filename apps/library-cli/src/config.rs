//! Centralized configuration for the library CLI.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than halfway through a command.

use std::env;
use std::fmt;
use std::path::PathBuf;

/// SQLite file used when neither `--db` nor `LIBRARY_DB_PATH` names one.
pub const DEFAULT_DB_PATH: &str = "library.db";

/// Storage backend provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost when the process exits)
    Memory,
    /// SQLite file-based storage
    Sqlite,
}

impl StorageProvider {
    /// Unknown names yield `None`; the caller reports them.
    fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("memory") {
            Some(Self::Memory)
        } else if s.eq_ignore_ascii_case("sqlite") {
            Some(Self::Sqlite)
        } else {
            None
        }
    }

    /// Whether this binary was built with support for the provider.
    pub fn is_compiled_in(self) -> bool {
        match self {
            Self::Memory => true,
            Self::Sqlite => cfg!(feature = "sqlite"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    pub(crate) fn sqlite_not_compiled() -> Self {
        Self {
            field: "LIBRARY_STORAGE",
            message: "sqlite storage requested but this build lacks the `sqlite` feature".into(),
        }
    }
}

/// CLI configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage provider
    pub storage_provider: StorageProvider,
    /// SQLite database path (when using sqlite storage)
    pub db_path: PathBuf,
    /// Log format
    pub log_format: LogFormat,
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(get: F) -> Result<Self, ConfigError> {
        // Storage provider
        let storage_provider = match get("LIBRARY_STORAGE") {
            None => StorageProvider::Memory,
            Some(raw) => StorageProvider::parse(raw.trim()).ok_or_else(|| ConfigError {
                field: "LIBRARY_STORAGE",
                message: format!("unknown storage provider '{}' (expected memory or sqlite)", raw),
            })?,
        };

        // DB path (for sqlite)
        let db_path = get("LIBRARY_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        // Log format
        let log_format = LogFormat::from_str(&get("LOG_FORMAT").unwrap_or_else(|| "pretty".into()));

        Ok(Self {
            storage_provider,
            db_path,
            log_format,
        })
    }

    /// An explicit `--db` flag always selects SQLite at that location.
    pub fn with_db_override(mut self, db: Option<PathBuf>) -> Self {
        if let Some(path) = db {
            self.storage_provider = StorageProvider::Sqlite;
            self.db_path = path;
        }
        self
    }

    /// Refuse to run with a backend this binary cannot provide.
    pub fn ensure_backend_available(&self) -> Result<(), ConfigError> {
        if self.storage_provider.is_compiled_in() {
            Ok(())
        } else {
            Err(ConfigError::sqlite_not_compiled())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn storage_provider_parsing() {
        assert_eq!(StorageProvider::parse("memory"), Some(StorageProvider::Memory));
        assert_eq!(StorageProvider::parse("sqlite"), Some(StorageProvider::Sqlite));
        assert_eq!(StorageProvider::parse("SQLITE"), Some(StorageProvider::Sqlite));
        assert_eq!(StorageProvider::parse("postgres"), None);
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::from_str("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_str("anything"), LogFormat::Pretty);
    }

    #[test]
    fn defaults_to_memory_and_default_path() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.storage_provider, StorageProvider::Memory);
        assert_eq!(cfg.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn unknown_storage_is_rejected() {
        let err = config_from(&[("LIBRARY_STORAGE", "mongo")]).unwrap_err();
        assert_eq!(err.field, "LIBRARY_STORAGE");
    }

    #[test]
    fn db_flag_selects_sqlite() {
        let cfg = config_from(&[("LIBRARY_DB_PATH", "env.db")])
            .unwrap()
            .with_db_override(Some(PathBuf::from("flag.db")));
        assert_eq!(cfg.storage_provider, StorageProvider::Sqlite);
        assert_eq!(cfg.db_path, PathBuf::from("flag.db"));

        let untouched = config_from(&[]).unwrap().with_db_override(None);
        assert_eq!(untouched.storage_provider, StorageProvider::Memory);
    }

    #[test]
    fn backend_availability_follows_features() {
        let cfg = config_from(&[("LIBRARY_STORAGE", "sqlite")]).unwrap();
        assert_eq!(
            cfg.ensure_backend_available().is_ok(),
            cfg!(feature = "sqlite")
        );
    }
}
