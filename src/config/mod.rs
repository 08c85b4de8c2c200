//! Configuration module
//!
//! Handles loading and saving LLRPC configuration.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::network::LinkConfig as NetLinkConfig;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Link settings
    #[serde(default)]
    pub link: LinkSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            link: LinkSettings::default(),
        }
    }
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Human-readable name for this host
    pub name: String,
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
    /// Log file path (optional)
    pub log_file: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
            verbose: false,
            log_file: None,
        }
    }
}

/// Link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSettings {
    /// Local address to bind the endpoint to
    #[serde(default = "default_addr")]
    pub local_addr: Ipv4Addr,
    /// Remote address heartbeats are sent to
    #[serde(default = "default_addr")]
    pub remote_addr: Ipv4Addr,
    /// Heartbeat interval in ms
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
}

fn default_addr() -> Ipv4Addr {
    Ipv4Addr::LOCALHOST
}

fn default_heartbeat_interval() -> u64 {
    1000
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            local_addr: default_addr(),
            remote_addr: default_addr(),
            heartbeat_interval_ms: default_heartbeat_interval(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("llrpc/config.toml")),
            Some(PathBuf::from("./llrpc.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Build the network-layer link configuration.
    pub fn link_config(&self) -> NetLinkConfig {
        NetLinkConfig {
            local_addr: self.link.local_addr,
            remote_addr: self.link.remote_addr,
            heartbeat_interval_ms: self.link.heartbeat_interval_ms,
        }
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> String {
    let config = Config {
        general: GeneralConfig {
            name: "llrpc-router".to_string(),
            verbose: false,
            log_file: None,
        },
        link: LinkSettings {
            local_addr: Ipv4Addr::LOCALHOST,
            remote_addr: Ipv4Addr::new(192, 168, 1, 2),
            heartbeat_interval_ms: 1000,
        },
    };

    toml::to_string_pretty(&config).unwrap_or_default()
}
