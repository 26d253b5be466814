//! Typed simulation tunables.
//!
//! Every section has defaults, so an empty JSON object is a valid
//! configuration. Load with [`SimConfig::load`] or
//! [`SimConfig::from_json_str`]; both validate before returning.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub needs: NeedsConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub gathering: GatheringConfig,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub economy: EconomyConfig,
    #[serde(default)]
    pub spawning: SpawningConfig,
    #[serde(default)]
    pub ages: AgesConfig,
    #[serde(default)]
    pub world: WorldConfig,
}

impl SimConfig {
    /// Load configuration from a JSON file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Json`] if it is not valid JSON, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Parse and validate configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &str, value: f32) -> Result<(), ConfigError> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")))
            }
        }

        if self.inventory.capacity == 0 {
            return Err(ConfigError::Invalid("inventory.capacity must be positive".into()));
        }
        if self.storage.max_types == 0 || self.storage.max_per_type == 0 {
            return Err(ConfigError::Invalid("storage limits must be positive".into()));
        }
        if self.storage.workshop_max_types == 0 || self.storage.workshop_max_per_type == 0 {
            return Err(ConfigError::Invalid("workshop storage limits must be positive".into()));
        }
        positive("needs.regen_rate", self.needs.regen_rate)?;
        positive("needs.interrupt_threshold", self.needs.interrupt_threshold)?;
        positive("gathering.duration", self.gathering.duration)?;
        positive("gathering.arrival_radius", self.gathering.arrival_radius)?;
        positive("movement.speed", self.movement.speed)?;
        positive("movement.target_expiry", self.movement.target_expiry)?;
        positive("jobs.hire_interval", self.jobs.hire_interval)?;
        positive("spawning.respawn_delay", self.spawning.respawn_delay)?;
        if !(0.0..=1.0).contains(&self.economy.refund_ratio) {
            return Err(ConfigError::Invalid(format!(
                "economy.refund_ratio must be within 0..=1, got {}",
                self.economy.refund_ratio
            )));
        }
        self.ages.validate()
    }
}

/// Need decay and regeneration, all rates per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedsConfig {
    pub hunger_decay: f32,
    pub thirst_decay: f32,
    pub fatigue_decay: f32,
    /// Health lost while any other need is under the threshold
    pub health_decay: f32,
    pub health_recovery: f32,
    /// Below this a need overrides whatever the villager is doing
    pub interrupt_threshold: f32,
    /// Gain per second inside a regeneration building
    pub regen_rate: f32,
}

impl Default for NeedsConfig {
    fn default() -> Self {
        Self {
            hunger_decay: 0.4,
            thirst_decay: 0.5,
            fatigue_decay: 0.25,
            health_decay: 1.5,
            health_recovery: 0.5,
            interrupt_threshold: 20.0,
            regen_rate: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub capacity: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self { capacity: 5 }
    }
}

/// Stockpile limits for shared warehouses and workshop input buffers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub max_types: usize,
    pub max_per_type: u32,
    pub workshop_max_types: usize,
    pub workshop_max_per_type: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_types: 4,
            max_per_type: 20,
            workshop_max_types: 1,
            workshop_max_per_type: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatheringConfig {
    /// Seconds spent at a node before the unit is collected
    pub duration: f32,
    /// Distance at which a walker counts as arrived
    pub arrival_radius: f32,
}

impl Default for GatheringConfig {
    fn default() -> Self {
        Self {
            duration: 5.0,
            arrival_radius: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Walking speed in units per second
    pub speed: f32,
    /// Look-ahead distance for obstacle detection
    pub probe_length: f32,
    /// Seconds an avoidance offset takes to fade out
    pub avoidance_window: f32,
    /// Seconds before an unreached target is dropped
    pub target_expiry: f32,
    /// Seconds without progress before taking a random detour
    pub stuck_timeout: f32,
    /// Radius of idle wander targets around the current position
    pub wander_radius: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            speed: 3.0,
            probe_length: 2.0,
            avoidance_window: 1.0,
            target_expiry: 60.0,
            stuck_timeout: 3.0,
            wander_radius: 6.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Minimum seconds between two hires
    pub hire_interval: f32,
    /// Seconds a blocked occupant waits for input before leaving
    pub blocked_patience: f32,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            hire_interval: 0.5,
            blocked_patience: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Share of the build cost returned on demolition, floored per resource
    pub refund_ratio: f32,
    pub starting_research: u32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            refund_ratio: 0.5,
            starting_research: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawningConfig {
    /// Seconds between spawns at one house
    pub respawn_delay: f32,
}

impl Default for SpawningConfig {
    fn default() -> Self {
        Self {
            respawn_delay: 30.0,
        }
    }
}

/// Per-age production speed table and advancement costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgesConfig {
    /// Duration multiplier per age tier, strictly decreasing
    pub speed_multipliers: Vec<f32>,
    /// Research points to leave each age, in order
    pub advance_costs: Vec<u32>,
}

impl Default for AgesConfig {
    fn default() -> Self {
        Self {
            speed_multipliers: vec![1.0, 0.8, 0.65, 0.5],
            advance_costs: vec![20, 40, 80],
        }
    }
}

impl AgesConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.speed_multipliers.len() != 4 {
            return Err(ConfigError::Invalid(format!(
                "ages.speed_multipliers needs one entry per age, got {}",
                self.speed_multipliers.len()
            )));
        }
        if self.speed_multipliers.iter().any(|m| *m <= 0.0) {
            return Err(ConfigError::Invalid("ages.speed_multipliers must be positive".into()));
        }
        if self.speed_multipliers.windows(2).any(|pair| pair[1] >= pair[0]) {
            return Err(ConfigError::Invalid(
                "ages.speed_multipliers must be strictly decreasing".into(),
            ));
        }
        if self.advance_costs.len() != 3 {
            return Err(ConfigError::Invalid(format!(
                "ages.advance_costs needs one entry per transition, got {}",
                self.advance_costs.len()
            )));
        }
        Ok(())
    }

    /// Research points needed to leave age tier `index`
    pub fn advance_cost(&self, index: usize) -> Option<u32> {
        self.advance_costs.get(index).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
    /// Seeds the engine's random number generator
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 80.0,
            height: 60.0,
            seed: 42,
        }
    }
}

impl WorldConfig {
    /// Clamp a point to the map bounds
    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (x.clamp(0.0, self.width), y.clamp(0.0, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = SimConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SimConfig::default());
        assert_eq!(config.inventory.capacity, 5);
        assert_eq!(config.storage.max_types, 4);
        assert_eq!(config.storage.max_per_type, 20);
        assert_eq!(config.needs.interrupt_threshold, 20.0);
        assert_eq!(config.gathering.duration, 5.0);
    }

    #[test]
    fn test_partial_section_override() {
        let config = SimConfig::from_json_str(r#"{ "needs": { "hunger_decay": 2.0 } }"#).unwrap();
        assert_eq!(config.needs.hunger_decay, 2.0);
        assert_eq!(config.needs.thirst_decay, NeedsConfig::default().thirst_decay);
    }

    #[test]
    fn test_rejects_non_decreasing_age_table() {
        let json = r#"{ "ages": { "speed_multipliers": [1.0, 0.8, 0.8, 0.5] } }"#;
        assert!(matches!(
            SimConfig::from_json_str(json),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_bad_refund_ratio() {
        let json = r#"{ "economy": { "refund_ratio": 1.5 } }"#;
        assert!(SimConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            SimConfig::from_json_str("{ needs: }"),
            Err(ConfigError::Json { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = SimConfig::load(Path::new("/nonexistent/hamlet.json"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
