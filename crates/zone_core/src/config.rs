//! Economy, anti-cheat and discovery settings
//!
//! Every field has a default so a partial JSON file only overrides what it
//! names. `GameConfig::from_env` loads the file named by `ZONE_CONFIG_PATH`.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::{env, fs};

use crate::error::{CoreError, Result};

pub const CONFIG_PATH_ENV: &str = "ZONE_CONFIG_PATH";

const SPLIT_EPSILON: f64 = 1e-9;

/// Process-wide defaults, used when a caller has no config of its own
pub static DEFAULT_CONFIG: Lazy<GameConfig> = Lazy::new(GameConfig::default);

/// Currency rates and the runner/pool reward split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Currency per km inside an unboosted zone
    pub base_rate: f64,
    /// Currency per km inside a zone whose boost has not expired
    pub boosted_rate: f64,
    /// Currency per km for runs that touch no zone
    pub unzoned_rate: f64,
    pub reward_split_user: f64,
    pub reward_split_pool: f64,
    /// Charged once per confirmed zone discovery
    pub zone_mint_cost: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            base_rate: 1.0,
            boosted_rate: 2.0,
            unzoned_rate: 0.5,
            reward_split_user: 0.7,
            reward_split_pool: 0.3,
            zone_mint_cost: 100.0,
        }
    }
}

impl EconomyConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("base_rate", self.base_rate),
            ("boosted_rate", self.boosted_rate),
            ("unzoned_rate", self.unzoned_rate),
            ("reward_split_user", self.reward_split_user),
            ("reward_split_pool", self.reward_split_pool),
            ("zone_mint_cost", self.zone_mint_cost),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::Config(format!("{} must be a non-negative number", name)));
            }
        }

        let split = self.reward_split_user + self.reward_split_pool;
        if (split - 1.0).abs() > SPLIT_EPSILON {
            return Err(CoreError::Config(format!(
                "reward splits must sum to 1 (user {} + pool {} = {})",
                self.reward_split_user, self.reward_split_pool, split
            )));
        }
        Ok(())
    }
}

/// Physical plausibility thresholds for uploaded tracks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiCheatConfig {
    pub min_distance_km: f64,
    pub max_avg_speed_kmh: f64,
    pub max_speed_kmh: f64,
    /// Instantaneous speed above which a segment counts as a GPS spike
    pub spike_speed_kmh: f64,
    /// Segments shorter than this are never treated as spikes
    pub spike_min_segment_km: f64,
    /// Larger per-sample climbs are altimeter noise
    pub max_elevation_step_m: f64,
}

impl Default for AntiCheatConfig {
    fn default() -> Self {
        Self {
            min_distance_km: 0.1,
            max_avg_speed_kmh: 25.0,
            max_speed_kmh: 60.0,
            spike_speed_kmh: 150.0,
            spike_min_segment_km: 0.05,
            max_elevation_step_m: 50.0,
        }
    }
}

impl AntiCheatConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_distance_km < 0.0 || self.max_avg_speed_kmh <= 0.0 || self.max_speed_kmh <= 0.0 {
            return Err(CoreError::Config("anti-cheat thresholds must be positive".to_string()));
        }
        if self.spike_speed_kmh < self.max_speed_kmh {
            return Err(CoreError::Config(format!(
                "spike_speed_kmh ({}) must not be below max_speed_kmh ({})",
                self.spike_speed_kmh, self.max_speed_kmh
            )));
        }
        Ok(())
    }
}

/// Radii and spacing used by zone discovery, placement and reward credit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// A run endpoint farther than this from every zone needs a new zone
    pub discovery_radius_km: f64,
    /// Start and end closer than this make a loop (at most one new zone)
    pub loop_radius_km: f64,
    /// Max distance from an endpoint to a zone origin for reward credit
    pub involvement_radius_km: f64,
    /// Hex steps from an anchor sharing the group key
    pub same_group_buffer: i32,
    /// Hex steps from an anchor in another group
    pub foreign_group_buffer: i32,
    /// Upper bound on a displacement chain before it is reported as corruption
    pub max_chain_depth: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            discovery_radius_km: 0.8,
            loop_radius_km: 0.25,
            involvement_radius_km: 1.0,
            same_group_buffer: 1,
            foreign_group_buffer: 4,
            max_chain_depth: 4096,
        }
    }
}

impl DiscoveryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.discovery_radius_km <= 0.0 || self.involvement_radius_km <= 0.0 {
            return Err(CoreError::Config("discovery radii must be positive".to_string()));
        }
        if self.same_group_buffer < 1 || self.foreign_group_buffer < 1 {
            return Err(CoreError::Config("placement buffers must be at least 1".to_string()));
        }
        if self.max_chain_depth == 0 {
            return Err(CoreError::Config("max_chain_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GameConfig {
    pub economy: EconomyConfig,
    pub anti_cheat: AntiCheatConfig,
    pub discovery: DiscoveryConfig,
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.economy.validate()?;
        self.anti_cheat.validate()?;
        self.discovery.validate()
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config = Self::from_json(&content).map_err(|e| {
            CoreError::Config(format!("Failed to parse config JSON '{}': {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, overridden by the file named in `ZONE_CONFIG_PATH` if set.
    pub fn from_env() -> Result<Self> {
        let Ok(path) = env::var(CONFIG_PATH_ENV) else {
            return Ok(Self::default());
        };

        let path = path.trim();
        if path.is_empty() {
            return Ok(Self::default());
        }

        Self::load_from_path(Path::new(path)).map_err(|e| {
            CoreError::Config(format!("Invalid config from {}='{}': {}", CONFIG_PATH_ENV, path, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        assert!(GameConfig::default().validate().is_ok());
        assert_eq!(DEFAULT_CONFIG.economy.reward_split_user, 0.7);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            GameConfig::from_json(r#"{"economy": {"base_rate": 3.5}, "discovery": {}}"#).unwrap();
        assert_eq!(config.economy.base_rate, 3.5);
        assert_eq!(config.economy.boosted_rate, 2.0);
        assert_eq!(config.discovery.discovery_radius_km, 0.8);
        assert_eq!(config.anti_cheat.max_speed_kmh, 60.0);
    }

    #[test]
    fn test_split_must_sum_to_one() {
        let mut economy = EconomyConfig::default();
        economy.reward_split_pool = 0.4;
        assert!(matches!(economy.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_negative_rate_rejected() {
        let mut economy = EconomyConfig::default();
        economy.base_rate = -1.0;
        assert!(economy.validate().is_err());
    }

    #[test]
    fn test_invalid_buffers_rejected() {
        let mut discovery = DiscoveryConfig::default();
        discovery.foreign_group_buffer = 0;
        assert!(discovery.validate().is_err());
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"anti_cheat": {{"max_avg_speed_kmh": 30.0}}}}"#).unwrap();

        let config = GameConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.anti_cheat.max_avg_speed_kmh, 30.0);
    }

    #[test]
    fn test_load_from_path_rejects_invalid_split() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"economy": {{"reward_split_user": 0.9}}}}"#).unwrap();

        let err = GameConfig::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("sum to 1"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = GameConfig::load_from_path(Path::new("/nonexistent/zone.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/zone.json"));
    }
}
