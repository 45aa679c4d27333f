//! # Configuration Management Module
//!
//! Server configuration lives in a single TOML file, split into sections:
//!
//! - [`WorldConfig`] - Area directory, builder overlay, quest file, start room
//! - [`CombatConfig`] - Round pacing and the concurrent fight cap
//! - [`SessionConfig`] - Per-player output queue sizing
//! - [`StorageConfig`] - Player profile database location
//! - [`LoggingConfig`] - Log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lumenmud::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Areas: {}", config.world.areas_path);
//!
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [world]
//! areas_path = "data/areas"
//! builder_overlay = "data/builder/rooms.json"
//! quests_path = "data/quests.json"
//! start_room = "start"
//!
//! [combat]
//! round_ms = 4000
//! max_instances = 0      # 0 = unlimited
//!
//! [session]
//! outbound_buffer = 32
//!
//! [storage]
//! profiles_db = "data/profiles"
//!
//! [logging]
//! level = "info"
//! file = "lumenmud.log"
//! ```
//!
//! Every section except `[world]` may be omitted and falls back to its
//! defaults.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::world::{DEFAULT_OUTBOUND_BUFFER, DEFAULT_START_ROOM};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub world: WorldConfig,
    #[serde(default)]
    pub combat: CombatConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Directory of core area files (`*.json`), read in name order.
    pub areas_path: String,
    /// Builder overlay file. When unset, builder edits apply in memory only
    /// and are gone after a reboot or restart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder_overlay: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quests_path: Option<String>,
    #[serde(default = "default_start_room")]
    pub start_room: String,
}

fn default_start_room() -> String {
    DEFAULT_START_ROOM.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatConfig {
    /// Delay between combat rounds (ms).
    #[serde(default = "default_round_ms")]
    pub round_ms: u64,
    /// Maximum concurrently running fights. 0 means unlimited.
    #[serde(default)]
    pub max_instances: usize,
}

fn default_round_ms() -> u64 {
    4000
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            round_ms: default_round_ms(),
            max_instances: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Queued messages per player before new ones are dropped.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

fn default_outbound_buffer() -> usize {
    DEFAULT_OUTBOUND_BUFFER
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// sled database directory for player profiles.
    #[serde(default = "default_profiles_db")]
    pub profiles_db: String,
}

fn default_profiles_db() -> String {
    "data/profiles".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            profiles_db: default_profiles_db(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values the world cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.world.areas_path.trim().is_empty() {
            return Err(anyhow!("world.areas_path must not be empty"));
        }
        if self.world.start_room.trim().is_empty() {
            return Err(anyhow!("world.start_room must not be empty"));
        }
        if self.combat.round_ms == 0 {
            return Err(anyhow!("combat.round_ms must be greater than zero"));
        }
        if self.session.outbound_buffer == 0 {
            return Err(anyhow!("session.outbound_buffer must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            world: WorldConfig {
                areas_path: "data/areas".to_string(),
                builder_overlay: Some("data/builder/rooms.json".to_string()),
                quests_path: Some("data/quests.json".to_string()),
                start_room: default_start_room(),
            },
            combat: CombatConfig::default(),
            session: SessionConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("lumenmud.log".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: Config = toml::from_str("[world]\nareas_path = \"areas\"\n").expect("parse");
        assert_eq!(config.world.start_room, "start");
        assert_eq!(config.combat.round_ms, 4000);
        assert_eq!(config.combat.max_instances, 0);
        assert_eq!(config.session.outbound_buffer, DEFAULT_OUTBOUND_BUFFER);
        assert_eq!(config.storage.profiles_db, "data/profiles");
        assert!(config.world.builder_overlay.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_round_interval_is_rejected() {
        let mut config = Config::default();
        config.combat.round_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).expect("serialize");
        let parsed: Config = toml::from_str(&text).expect("parse");
        assert_eq!(parsed.world.areas_path, "data/areas");
        assert_eq!(parsed.logging.file.as_deref(), Some("lumenmud.log"));
    }

    #[tokio::test]
    async fn create_default_then_load() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        let path = path.to_str().expect("utf8 path");
        Config::create_default(path).await.expect("write");
        let config = Config::load(path).await.expect("load");
        assert_eq!(config.world.start_room, "start");
    }
}
