//! Server configuration.
//!
//! Values come from, in order of precedence:
//! 1. Environment overrides (`TUJALI_HOST`, `TUJALI_PORT`, `DATABASE_PATH`, `TUJALI_LOG_LEVEL`)
//! 2. The TOML file named by `TUJALI_CONFIG` (default `tujali.toml`), when it exists
//! 3. Built-in defaults

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use symptoms::{Categorizer, DEFAULT_CONFIDENCE_DIVISOR};
use symptoms_integrity::{CategoryKeywords, KeywordTable, OutbreakThresholds};
use tujali_shared::HealthResult;
use tujali_storage::DatabaseConfig;
use ussd::UssdSettings;

pub const CONFIG_ENV: &str = "TUJALI_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "tujali.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSection,
    pub ussd: UssdSettings,
    pub symptoms: SymptomsConfig,
    pub auth: AuthConfig,
    pub logging: LoggingSection,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds between expired-session sweeps
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: PathBuf,
    pub wal: bool,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/tujali.db"),
            wal: true,
        }
    }
}

impl DatabaseSection {
    pub fn to_database_config(&self) -> DatabaseConfig {
        if self.path == Path::new(":memory:") {
            return DatabaseConfig::in_memory();
        }
        DatabaseConfig {
            wal_mode: self.wal,
            ..DatabaseConfig::with_path(&self.path)
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SymptomsConfig {
    pub outbreak: OutbreakThresholds,
    /// Keyword matches that count as full confidence
    pub confidence_divisor: f64,
    /// Replaces the built-in keyword lists when present
    pub keywords: Option<Vec<CategoryKeywords>>,
}

impl Default for SymptomsConfig {
    fn default() -> Self {
        Self {
            outbreak: OutbreakThresholds::default(),
            confidence_divisor: DEFAULT_CONFIDENCE_DIVISOR,
            keywords: None,
        }
    }
}

impl SymptomsConfig {
    pub fn categorizer(&self) -> HealthResult<Categorizer> {
        let table = match &self.keywords {
            Some(entries) => KeywordTable::new(entries.clone())?,
            None => KeywordTable::default(),
        };
        Categorizer::new(table, self.confidence_divisor)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub session_lifetime_secs: i64,
    pub admin: Option<AdminSeed>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_lifetime_secs: 86_400,
            admin: None,
        }
    }
}

/// Administrator account created at startup if missing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    /// `pretty`, `compact` or `json`
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from the configured file, then apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = PathBuf::from(path);
        let mut config = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&contents)
            .map_err(|e| ConfigError::ParseError(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Apply overrides looked up through `var`
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("TUJALI_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("TUJALI_PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "TUJALI_PORT".to_string(),
                message: format!("'{}' is not a port number", port),
            })?;
        }
        if let Some(path) = var("DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(level) = var("TUJALI_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: "server.host".to_string(),
                message: format!("'{}' is not an IP address", self.server.host),
            })
    }
}
