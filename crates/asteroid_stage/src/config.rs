//! Stage configuration

use serde::{Deserialize, Serialize};
use tick_engine::config::{Config, WorldConfig};

/// Stage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Playfield settings handed to the world
    pub world: WorldConfig,

    /// Gameplay settings
    pub gameplay: GameplayConfig,

    /// Headless run settings
    pub run: RunConfig,
}

impl Config for StageConfig {}

/// Gameplay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplayConfig {
    /// Ticks between two waves of the stage script
    pub wave_period: u64,

    /// Ticks from wave start to the straight-falling asteroid
    pub asteroid_delay: u64,

    /// Ticks from wave start to the scripted enemy
    pub behavior_enemy_delay: u64,

    /// Life points of a fresh asteroid
    pub asteroid_life: i32,

    /// Asteroid fall speed per tick
    pub asteroid_speed: f64,

    /// Scripted enemy fall speed per tick
    pub behavior_enemy_speed: f64,

    /// Enemies below this y go back to the pool
    pub recycle_below: f64,

    /// Player displacement per frame while an arrow key is held
    pub player_speed: f64,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            wave_period: 700,
            asteroid_delay: 200,
            behavior_enemy_delay: 500,
            asteroid_life: 10,
            asteroid_speed: 2.0,
            behavior_enemy_speed: 1.0,
            recycle_below: 500.0,
            player_speed: 5.0,
        }
    }
}

/// Headless run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Frames to simulate
    pub frames: u64,

    /// Seed for enemy placement
    pub seed: u64,

    /// Frames between progress log lines
    pub report_every: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            frames: 3000,
            seed: 42,
            report_every: 500,
        }
    }
}
