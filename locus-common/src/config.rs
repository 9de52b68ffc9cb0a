//! Configuration loading and root folder resolution
//!
//! Resolution priority (highest first):
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default HTTP port, matching the port beacon agents post to
pub const DEFAULT_PORT: u16 = 3000;

/// Default bind address
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "locus.db";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "LOCUS_ROOT_FOLDER";

/// Log-distance path-loss constants
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PathLossConfig {
    /// RSSI measured at one meter (dBm)
    pub tx_power_at_1m: f64,
    /// Environmental decay exponent (2.0 = free space)
    pub exponent: f64,
}

impl Default for PathLossConfig {
    fn default() -> Self {
        Self {
            tx_power_at_1m: -59.0,
            exponent: 2.0,
        }
    }
}

/// Stale device eviction policy
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct EvictionConfig {
    /// Seconds between eviction runs
    pub interval_secs: u64,
    /// Devices not seen for longer than this are dropped
    pub max_age_secs: i64,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5 * 60,
            max_age_secs: 30 * 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub path_loss: PathLossConfig,
    pub eviction: EvictionConfig,
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Read and parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Bind address, falling back to the compiled default
    pub fn bind_address(&self) -> &str {
        self.bind_address.as_deref().unwrap_or(DEFAULT_BIND_ADDRESS)
    }

    /// Port, falling back to the compiled default
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Load configuration
///
/// An explicit path must exist and parse. Without one, the platform config
/// locations are searched; if none exists, defaults are used (never fatal).
/// Returns the config together with the file it came from, if any.
///
/// Nothing is logged here: the caller loads config before the tracing
/// subscriber (whose filter depends on it) is installed.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<(TomlConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    match path {
        Some(path) => Ok((TomlConfig::from_file(&path)?, Some(path))),
        None => Ok((TomlConfig::default(), None)),
    }
}

/// Locate the platform config file, if one exists
///
/// Linux checks `~/.config/locus/config.toml` then `/etc/locus/config.toml`;
/// other platforms check the user config directory only.
pub fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("locus").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/locus/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolve the root folder holding the database
pub fn resolve_root_folder(cli_arg: Option<&Path>, env_var_name: &str, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    // ~/.local/share/locus, ~/Library/Application Support/locus, %LOCALAPPDATA%\locus
    dirs::data_local_dir()
        .map(|d| d.join("locus"))
        .unwrap_or_else(|| PathBuf::from("./locus_data"))
}

/// Create the root folder if missing
pub fn ensure_directory_exists(root_folder: &Path) -> Result<()> {
    if !root_folder.exists() {
        info!("Creating root folder {}", root_folder.display());
        std::fs::create_dir_all(root_folder)?;
    }
    Ok(())
}

/// Path of the database inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}
