// src/config.rs
//! Configuration management

use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub gpsd_host: String,
    pub gpsd_port: u16,
    pub user_id: String,
    pub activity_type: String,
    pub activity_name: String,
    /// Directory where finished sessions are archived.
    pub output_dir: PathBuf,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            gpsd_host: "localhost".to_string(),
            gpsd_port: 2947,
            user_id: "default".to_string(),
            activity_type: "run".to_string(),
            activity_name: "Activity".to_string(),
            output_dir: PathBuf::from("sessions"),
        }
    }
}

impl TrackerConfig {
    /// Load configuration from the config file, falling back to defaults
    /// when it does not exist.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)
            .map_err(|e| TrackerError::Other(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TrackerError::Other(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TrackerError::Other(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| TrackerError::Other(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&config_path, contents)
            .map_err(|e| TrackerError::Other(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| TrackerError::Other("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home)
            .join(".config")
            .join("activity-tracker")
            .join("config.json"))
    }

    /// Update gpsd connection settings
    pub fn update_gpsd(&mut self, host: String, port: u16) {
        self.gpsd_host = host;
        self.gpsd_port = port;
    }

    /// Update the activity labelling for the next session
    pub fn update_activity(&mut self, activity_type: String, activity_name: String) {
        self.activity_type = activity_type;
        self.activity_name = activity_name;
    }
}
