use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::param::LedgerParams;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LedgerConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub params: LedgerParams,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_db_path() -> String {
    "./data/ledger".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig { db_path: default_db_path() },
            log: LogConfig::default(),
            params: LedgerParams::default(),
        }
    }
}

impl LedgerConfig {
    pub fn from_toml(s: &str) -> LedgerResult<Self> {
        let config: LedgerConfig = toml::from_str(s)?;
        config.params.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> LedgerResult<String> {
        toml::to_string_pretty(self).map_err(|e| LedgerError::Config(e.to_string()))
    }

    /// Strict load: `None` when the file is missing, an error when it exists
    /// but cannot be read or fails validation.
    pub fn load(path: &str) -> LedgerResult<Option<Self>> {
        if !std::path::Path::new(path).exists() {
            return Ok(None);
        }
        let s = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("cannot read '{}': {}", path, e)))?;
        Self::from_toml(&s).map(Some)
    }

    pub fn load_or_default(path: &str) -> Self {
        match Self::load(path) {
            Ok(Some(c)) => {
                info!("Config loaded from {}", path);
                c
            }
            Ok(None) => {
                info!("Config file not found at '{}'. Creating default.", path);
                let config = Self::default();
                if let Ok(s) = config.to_toml() {
                    if let Err(e) = std::fs::write(path, s) {
                        warn!("Could not write default config to '{}': {}", path, e);
                    }
                }
                config
            }
            Err(e) => {
                warn!("Error loading config: {}. Using defaults.", e);
                Self::default()
            }
        }
    }
}
