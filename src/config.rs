//! User configuration at ~/.shadepath/config.json.
//!
//! Every field is optional in the file; a missing or unreadable file yields
//! the defaults. Command-line flags override whatever is loaded here.

use crate::ratio::ShadeThresholds;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 3000 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IANA zone applied to timestamps given without a UTC offset.
    pub timezone: Option<String>,
    pub server: ServerConfig,
    pub shade: ShadeThresholds,
}

impl Config {
    /// Load from the default location (~/.shadepath/config.json).
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    /// Load from a specific path, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        Self::read_file(path).unwrap_or_default()
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".shadepath")
            .join("config.json")
    }

    fn read_file(path: &Path) -> Option<Self> {
        let data = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&data) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("  Warning: ignoring {}: {}", path.display(), e);
                None
            }
        }
    }
}
