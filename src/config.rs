use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::provision::AttemptPolicy;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Durable (flash) store file
    pub durable: PathBuf,
    /// Retained (RTC RAM) image; deleting it simulates power loss
    pub retained: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProvisioningConfig {
    /// Attempts per field before giving up; 0 asks forever
    #[serde(default)]
    pub max_attempts: u32,
}

impl ProvisioningConfig {
    pub fn attempt_policy(&self) -> AttemptPolicy {
        match self.max_attempts {
            0 => AttemptPolicy::Forever,
            n => AttemptPolicy::Bounded(n),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RadioConfig {
    /// Whether the simulated network answers joins
    pub accept_joins: bool,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self { accept_joins: true }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {:?}: {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                durable: PathBuf::from("nvs.json"),
                retained: PathBuf::from("rtc.json"),
            },
            provisioning: ProvisioningConfig::default(),
            radio: RadioConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}
