//! Configuration management with validation and defaults
//!
//! Every timing constant and payout rule of the game lives here so tests
//! and deployments can tune them from one TOML file.

use crate::errors::{ConfigurationError, HazardResult};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Complete server configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    pub server: ServerConfig,
    pub roulette: RouletteConfig,
    pub battles: BattleConfig,
    pub cases: CaseConfig,
    pub storage: StorageConfig,
    pub monitoring: MonitoringConfig,
}

/// HTTP listener settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

/// Roulette round cadence and payouts
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RouletteConfig {
    /// Countdown length of a betting window
    pub spin_interval_ms: u64,
    pub tick_ms: u64,
    pub spinning_ms: u64,
    pub settle_pause_ms: u64,
    pub history_len: usize,
    pub color_multiplier: i64,
    pub green_multiplier: i64,
}

impl Default for RouletteConfig {
    fn default() -> Self {
        Self {
            spin_interval_ms: 15_000,
            tick_ms: 1_000,
            spinning_ms: 5_000,
            settle_pause_ms: 1_000,
            history_len: 10,
            color_multiplier: 2,
            green_multiplier: 14,
        }
    }
}

impl RouletteConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn spinning(&self) -> Duration {
        Duration::from_millis(self.spinning_ms)
    }

    pub fn settle_pause(&self) -> Duration {
        Duration::from_millis(self.settle_pause_ms)
    }
}

/// Case battle timing and settlement rules
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    pub countdown_from: u32,
    pub countdown_tick_ms: u64,
    pub case_pause_ms: u64,
    pub creation_cooldown_ms: u64,
    pub max_cases: usize,
    /// Share of the battle cost handed to each loser, in percent
    pub consolation_percent: i64,
    pub max_allocated_items: usize,
    pub bot_names: Vec<String>,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            countdown_from: 3,
            countdown_tick_ms: 1_000,
            case_pause_ms: 3_000,
            creation_cooldown_ms: 5_000,
            max_cases: 100,
            consolation_percent: 1,
            max_allocated_items: 10,
            bot_names: ["Skibidi", "Sigma", "Bali", "Japko"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl BattleConfig {
    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    pub fn case_pause(&self) -> Duration {
        Duration::from_millis(self.case_pause_ms)
    }

    pub fn creation_cooldown(&self) -> Duration {
        Duration::from_millis(self.creation_cooldown_ms)
    }
}

/// Case pricing and inventory retention
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseConfig {
    pub house_edge: f64,
    pub history_cap: usize,
    /// Most cases one open request may buy
    pub max_open_count: usize,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            house_edge: 1.15,
            history_cap: 500,
            max_open_count: 10,
        }
    }
}

/// Storage backend selection
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Rocksdb,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_directory: String,
    pub clear_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Rocksdb,
            data_directory: "./DB/hazard_data".to_string(),
            clear_on_start: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_filter: String,
    pub enable_metrics: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_filter: "hazard=info,tower_http=info".to_string(),
            enable_metrics: true,
        }
    }
}

impl HazardConfig {
    /// Load from a TOML file; missing fields fall back to defaults
    pub fn load<P: AsRef<Path>>(path: P) -> HazardResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigurationError::LoadFailed(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> HazardResult<Self> {
        let config: HazardConfig =
            toml::from_str(raw).map_err(|e| ConfigurationError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration for tests: in-memory store, unchanged game rules
    pub fn testing() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                clear_on_start: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |field: &str, reason: &str| ConfigurationError::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        if self.roulette.tick_ms == 0 {
            return Err(invalid("roulette.tick_ms", "must be > 0"));
        }
        if self.roulette.spin_interval_ms < self.roulette.tick_ms {
            return Err(invalid("roulette.spin_interval_ms", "must be at least one tick"));
        }
        if self.roulette.history_len == 0 {
            return Err(invalid("roulette.history_len", "must be > 0"));
        }
        if self.roulette.color_multiplier <= 0 || self.roulette.green_multiplier <= 0 {
            return Err(invalid("roulette multipliers", "must be > 0"));
        }
        if self.battles.max_cases == 0 {
            return Err(invalid("battles.max_cases", "must be > 0"));
        }
        if !(0..=100).contains(&self.battles.consolation_percent) {
            return Err(invalid("battles.consolation_percent", "must be within 0..=100"));
        }
        if self.battles.max_allocated_items == 0 {
            return Err(invalid("battles.max_allocated_items", "must be > 0"));
        }
        if self.cases.house_edge < 1.0 {
            return Err(invalid("cases.house_edge", "must be >= 1.0"));
        }
        if self.cases.history_cap == 0 {
            return Err(invalid("cases.history_cap", "must be > 0"));
        }
        if self.cases.max_open_count == 0 {
            return Err(invalid("cases.max_open_count", "must be > 0"));
        }
        Ok(())
    }
}
