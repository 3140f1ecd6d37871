//! Runtime configuration.
//!
//! Settings come from a TOML file (`RiverConfig::load`) or from defaults
//! overridden by environment variables, with `.env` loaded first
//! (`RiverConfig::from_env`). Every section is optional.
//!
//! ```toml
//! [usgs]
//! dv_url = "https://waterservices.usgs.gov/nwis/dv/"
//! iv_url = "https://waterservices.usgs.gov/nwis/iv/"
//! timeout_secs = 30
//! proxy = "http://proxy.example:8080"
//!
//! [plot]
//! width = 1024
//! height = 768
//!
//! [log]
//! level = "info"
//! file = "river_energy.log"
//! timestamps = false
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::logging::{self, LogLevel};

pub const DEFAULT_DV_URL: &str = "https://waterservices.usgs.gov/nwis/dv/";
pub const DEFAULT_IV_URL: &str = "https://waterservices.usgs.gov/nwis/iv/";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UsgsConfig {
    /// Daily values service
    pub dv_url: String,
    /// Instantaneous values service
    pub iv_url: String,
    pub timeout_secs: u64,
    pub proxy: Option<String>,
}

impl Default for UsgsConfig {
    fn default() -> Self {
        Self {
            dv_url: DEFAULT_DV_URL.to_string(),
            iv_url: DEFAULT_IV_URL.to_string(),
            timeout_secs: 30,
            proxy: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self { width: 1024, height: 768 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
    /// Full timestamped entries on the console
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: LogLevel::Info, file: None, timestamps: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RiverConfig {
    pub usgs: UsgsConfig,
    pub plot: PlotConfig,
    pub log: LogConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    InvalidEnv { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Cannot read config: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error in config: {}", e),
            ConfigError::InvalidEnv { key, value } => {
                write!(f, "Invalid value for {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl RiverConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Defaults, overridden by `USGS_PROXY`, `USGS_TIMEOUT_SECS`,
    /// `RIVER_LOG_LEVEL` and `RIVER_LOG_FILE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(proxy) = lookup("USGS_PROXY").filter(|p| !p.trim().is_empty()) {
            self.usgs.proxy = Some(proxy);
        }
        if let Some(raw) = lookup("USGS_TIMEOUT_SECS") {
            self.usgs.timeout_secs = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: "USGS_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup("RIVER_LOG_LEVEL") {
            self.log.level = raw.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "RIVER_LOG_LEVEL",
                value: raw.clone(),
            })?;
        }
        if let Some(file) = lookup("RIVER_LOG_FILE").filter(|f| !f.trim().is_empty()) {
            self.log.file = Some(PathBuf::from(file));
        }
        Ok(())
    }

    /// Installs the process-wide logger described by `[log]`.
    pub fn init_logging(&self) {
        logging::init_logger(self.log.level, self.log.file.as_deref(), self.log.timestamps);
    }
}
