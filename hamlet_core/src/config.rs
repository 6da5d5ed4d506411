// Data-driven engine configuration.
//
// Every tunable the engine reads lives in `EngineConfig`, loaded from JSON
// by the host. Sections carry `#[serde(default)]` so a config file only
// has to name what it changes. `validate()` is the single place that
// rejects nonsensical values; constructors that take a config call it so
// a bad file fails fast instead of producing a planner with a zero node
// cap or a queue that never advances.
//
// See also: `pathfinding.rs` (reads `PathConfig` and `TerrainCostConfig`),
// `pipeline.rs` and `placement.rs` (read `PlacementConfig`).
//
// **Critical constraint: determinism.** Costs feed A* ordering. Two hosts
// with different configs will plan different roads from the same seed.

use crate::block::Material;
use crate::error::{HamletError, Result};
use serde::{Deserialize, Serialize};

/// Cosmetic block used where a road climbs or drops one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RampStyle {
    Stairs,
    Slab,
}

/// Per-step costs for the path planner. All values must be positive and
/// finite; penalties are added on top of the base step cost.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainCostConfig {
    /// Cost of a flat cardinal step.
    pub base_step_cost: f32,
    /// Multiplier on the base cost for a diagonal step.
    pub diagonal_multiplier: f32,
    /// Added per block of elevation change.
    pub elevation_change_penalty: f32,
    /// Added when the destination column's ground is under liquid.
    pub water_penalty: f32,
    /// Added when the destination stands on sand or gravel.
    pub rough_terrain_penalty: f32,
}

impl Default for TerrainCostConfig {
    fn default() -> Self {
        Self {
            base_step_cost: 1.0,
            diagonal_multiplier: std::f32::consts::SQRT_2,
            elevation_change_penalty: 2.0,
            water_penalty: 8.0,
            rough_terrain_penalty: 3.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Node expansions before a search gives up and reports no path.
    pub max_nodes_explored: usize,
    /// Clearance kept around every structure mask.
    pub clearance_buffer: i32,
    /// Maximum |y - G(x, z)| for a walkable node, and maximum climb or
    /// drop between neighboring nodes.
    pub step_tolerance: i32,
    pub cost: TerrainCostConfig,
    pub ramp_style: RampStyle,
    /// Surface laid along flat stretches of a paved road.
    pub road_material: Material,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            max_nodes_explored: 5000,
            clearance_buffer: 2,
            step_tolerance: 1,
            cost: TerrainCostConfig::default(),
            ramp_style: RampStyle::Stairs,
            road_material: Material::DirtPath,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Entries committed per active queue per tick.
    pub batch_size: usize,
    /// Minimum gap kept between a new footprint and existing masks.
    pub spacing_buffer: i32,
    /// Deepest fill or cut accepted when leveling a footprint.
    pub max_level_delta: i32,
    /// Columns around a committed footprint whose cached surface height
    /// is dropped when its mask is published.
    pub surface_invalidation_margin: i32,
    /// Finished (complete or cancelled) queues a pipeline keeps for status
    /// and cancel-reason lookups. The oldest are forgotten first.
    pub finished_history: usize,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            spacing_buffer: 8,
            max_level_delta: 4,
            surface_invalidation_margin: 1,
            finished_history: 256,
        }
    }
}

/// Top-level engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Width of a mask-index chunk column in blocks.
    pub chunk_size: i32,
    pub path: PathConfig,
    pub placement: PlacementConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            path: PathConfig::default(),
            placement: PlacementConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size <= 0 {
            return Err(invalid(format!("chunk_size must be positive, got {}", self.chunk_size)));
        }
        self.path.validate()?;
        self.placement.validate()
    }
}

impl PathConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_nodes_explored == 0 {
            return Err(invalid("max_nodes_explored must be positive".into()));
        }
        if self.clearance_buffer < 0 {
            return Err(invalid(format!(
                "clearance_buffer must be non-negative, got {}",
                self.clearance_buffer
            )));
        }
        if self.step_tolerance < 0 {
            return Err(invalid(format!(
                "step_tolerance must be non-negative, got {}",
                self.step_tolerance
            )));
        }
        self.cost.validate()
    }
}

impl TerrainCostConfig {
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("base_step_cost", self.base_step_cost),
            ("diagonal_multiplier", self.diagonal_multiplier),
            ("elevation_change_penalty", self.elevation_change_penalty),
            ("water_penalty", self.water_penalty),
            ("rough_terrain_penalty", self.rough_terrain_penalty),
        ];
        for (name, value) in named {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(format!("{name} must be positive and finite, got {value}")));
            }
        }
        // Below one a diagonal is cheaper than the octile estimate assumes.
        if self.diagonal_multiplier < 1.0 {
            return Err(invalid(format!(
                "diagonal_multiplier must be at least 1, got {}",
                self.diagonal_multiplier
            )));
        }
        Ok(())
    }
}

impl PlacementConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(invalid("batch_size must be positive".into()));
        }
        if self.spacing_buffer < 0 || self.max_level_delta < 0 || self.surface_invalidation_margin < 0 {
            return Err(invalid(format!(
                "placement buffers must be non-negative: spacing {}, level delta {}, invalidation margin {}",
                self.spacing_buffer, self.max_level_delta, self.surface_invalidation_margin
            )));
        }
        Ok(())
    }
}

fn invalid(message: String) -> HamletError {
    HamletError::InvalidArgument(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.chunk_size, 16);
        assert_eq!(config.path.max_nodes_explored, 5000);
        assert_eq!(config.path.clearance_buffer, 2);
        assert_eq!(config.placement.batch_size, 50);
        assert_eq!(config.placement.spacing_buffer, 8);
    }

    #[test]
    fn json_roundtrip() {
        let config = EngineConfig::default();
        let json = config.to_json().unwrap();
        let restored = EngineConfig::from_json(&json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            EngineConfig::from_json(r#"{ "placement": { "batch_size": 10 }, "path": { "ramp_style": "Slab" } }"#)
                .unwrap();
        assert_eq!(config.placement.batch_size, 10);
        assert_eq!(config.placement.spacing_buffer, 8);
        assert_eq!(config.path.ramp_style, RampStyle::Slab);
        assert_eq!(config.path.max_nodes_explored, 5000);
    }

    #[test]
    fn non_positive_cost_is_rejected() {
        let mut config = EngineConfig::default();
        config.path.cost.water_penalty = 0.0;
        assert!(matches!(config.validate(), Err(HamletError::InvalidArgument(_))));
        config.path.cost.water_penalty = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn diagonal_cheaper_than_a_cardinal_is_rejected() {
        let mut config = EngineConfig::default();
        config.path.cost.diagonal_multiplier = 0.5;
        assert!(matches!(config.validate(), Err(HamletError::InvalidArgument(_))));
        config.path.cost.diagonal_multiplier = 1.0;
        config.validate().unwrap();
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut config = EngineConfig::default();
        config.placement.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_node_cap_is_rejected() {
        let mut config = EngineConfig::default();
        config.path.max_nodes_explored = 0;
        assert!(config.validate().is_err());
    }
}
