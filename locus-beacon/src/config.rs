//! Beacon identity and placement

use std::path::Path;

use locus_common::telemetry::Location;
use locus_common::{Error, Result};
use serde::Deserialize;

/// Contents of the beacon config file
///
/// ```toml
/// beacon_id = "entrance-1"
/// zone = "entrance"
/// x = 0
/// y = 0
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BeaconConfig {
    pub beacon_id: String,
    pub zone: String,
    pub x: i64,
    pub y: i64,
}

impl BeaconConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid beacon config: {}", e)))?;
        if config.beacon_id.trim().is_empty() {
            return Err(Error::Config("beacon_id must not be empty".to_string()));
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn location(&self) -> Location {
        Location {
            zone: self.zone.clone(),
            x: self.x,
            y: self.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config = BeaconConfig::from_toml_str("beacon_id = \"b1\"\nzone = \"lobby\"\nx = 3\ny = -2\n").unwrap();
        assert_eq!(config.beacon_id, "b1");
        assert_eq!(
            config.location(),
            Location {
                zone: "lobby".to_string(),
                x: 3,
                y: -2
            }
        );
    }

    #[test]
    fn test_missing_field_is_config_error() {
        let result = BeaconConfig::from_toml_str("beacon_id = \"b1\"\nx = 0\ny = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_blank_beacon_id_rejected() {
        let result = BeaconConfig::from_toml_str("beacon_id = \" \"\nzone = \"z\"\nx = 0\ny = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.toml");
        std::fs::write(&path, "beacon_id = \"b2\"\nzone = \"hall\"\nx = 10\ny = 0\n").unwrap();

        assert_eq!(BeaconConfig::from_file(&path).unwrap().beacon_id, "b2");
        assert!(BeaconConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
