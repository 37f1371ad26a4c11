use crate::order::StopLocation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cost of one straight tile in pathfinder units.
pub const YAPF_TILE_LENGTH: i32 = 100;
/// Cost of one corner piece.
pub const YAPF_TILE_CORNER_LENGTH: i32 = 71;
/// Ticks per in-game day; several waiting thresholds are counted in days.
pub const DAY_TICKS: u32 = 74;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShipPathfinder {
    #[default]
    Yapf,
    /// The legacy bounded-depth follower.
    Opf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccelerationModel {
    /// Turns and gradients cost a fixed share of the current speed.
    #[default]
    Original,
    Realistic,
}

/// Pathfinder penalties and limits. All costs are in pathfinder units where
/// one straight tile costs [`YAPF_TILE_LENGTH`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfinderSettings {
    pub max_search_nodes: usize,
    pub forbid_90_deg: bool,
    pub ship_pathfinder: ShipPathfinder,

    pub rail_curve45_penalty: i32,
    pub rail_curve90_penalty: i32,
    pub rail_slope_penalty: i32,
    pub rail_station_penalty: i32,
    pub rail_depot_reverse_penalty: i32,
    pub rail_firstred_penalty: i32,
    pub rail_firstred_exit_penalty: i32,
    pub rail_lastred_penalty: i32,
    pub rail_look_ahead_max_signals: u32,
    pub rail_look_ahead_signal_p0: i32,
    pub rail_look_ahead_signal_p1: i32,
    pub rail_look_ahead_signal_p2: i32,
    pub rail_pbs_cross_penalty: i32,
    pub rail_pbs_station_penalty: i32,
    pub rail_pbs_signal_back_penalty: i32,
    pub rail_longer_platform_penalty: i32,
    pub rail_longer_platform_per_tile_penalty: i32,
    pub rail_shorter_platform_penalty: i32,
    pub rail_shorter_platform_per_tile_penalty: i32,

    pub ship_curve45_penalty: i32,
    pub ship_curve90_penalty: i32,
}

impl Default for PathfinderSettings {
    fn default() -> Self {
        Self {
            max_search_nodes: 10_000,
            forbid_90_deg: false,
            ship_pathfinder: ShipPathfinder::Yapf,

            rail_curve45_penalty: YAPF_TILE_LENGTH,
            rail_curve90_penalty: 6 * YAPF_TILE_LENGTH,
            rail_slope_penalty: 2 * YAPF_TILE_LENGTH,
            rail_station_penalty: 10 * YAPF_TILE_LENGTH,
            rail_depot_reverse_penalty: 50 * YAPF_TILE_LENGTH,
            rail_firstred_penalty: 10 * YAPF_TILE_LENGTH,
            rail_firstred_exit_penalty: 100 * YAPF_TILE_LENGTH,
            rail_lastred_penalty: 10 * YAPF_TILE_LENGTH,
            rail_look_ahead_max_signals: 10,
            rail_look_ahead_signal_p0: 500,
            rail_look_ahead_signal_p1: -100,
            rail_look_ahead_signal_p2: 5,
            rail_pbs_cross_penalty: 3 * YAPF_TILE_LENGTH,
            rail_pbs_station_penalty: 8 * YAPF_TILE_LENGTH,
            rail_pbs_signal_back_penalty: 15 * YAPF_TILE_LENGTH,
            rail_longer_platform_penalty: 8 * YAPF_TILE_LENGTH,
            rail_longer_platform_per_tile_penalty: 0,
            rail_shorter_platform_penalty: 40 * YAPF_TILE_LENGTH,
            rail_shorter_platform_per_tile_penalty: 0,

            ship_curve45_penalty: YAPF_TILE_LENGTH,
            ship_curve90_penalty: 6 * YAPF_TILE_LENGTH,
        }
    }
}

/// Driver behaviour. Waiting thresholds are game-balance constants and are
/// applied exactly as configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainSettings {
    /// Reverse at a red signal after waiting instead of waiting forever.
    pub reverse_at_signals: bool,
    /// Wait at a one-way red signal, in units of 20 ticks.
    pub wait_oneway_signal: u32,
    /// Wait at a two-way red signal, in units of 73 ticks.
    pub wait_twoway_signal: u32,
    /// Days a train waits for a free path before the stuck advisory, halved.
    pub wait_for_pbs_path: u32,
    /// Upper bound of the stuck-train retry interval, in ticks.
    pub stuck_retry_max_interval: u32,
    /// Ticks a stopped train has to wait before force-proceed is honoured.
    pub force_proceed_min_wait: u32,
    /// Ticks spent standing at a station.
    pub station_dwell_ticks: u32,
    pub acceleration_model: AccelerationModel,
    pub default_stop_location: StopLocation,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            reverse_at_signals: false,
            wait_oneway_signal: 15,
            wait_twoway_signal: 41,
            wait_for_pbs_path: 14,
            stuck_retry_max_interval: 64,
            force_proceed_min_wait: 0,
            station_dwell_ticks: 60,
            acceleration_model: AccelerationModel::Original,
            default_stop_location: StopLocation::FarEnd,
        }
    }
}

impl TrainSettings {
    pub fn oneway_signal_wait_ticks(&self) -> u32 {
        self.wait_oneway_signal * 20
    }

    pub fn twoway_signal_wait_ticks(&self) -> u32 {
        self.wait_twoway_signal * 73
    }

    /// Ticks a stuck train waits before the player is told about it.
    pub fn stuck_advisory_ticks(&self) -> u32 {
        2 * self.wait_for_pbs_path * DAY_TICKS
    }
}

/// Settings carried in the world state, identical on every participant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub pathfinder: PathfinderSettings,
    pub train: TrainSettings,
}

/// Simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Compute checksum every N ticks (0 = disabled).
    pub checksum_frequency: u32,
    /// Seed of the shared random source.
    pub seed: u32,
    pub game: GameSettings,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            // One in-game day
            checksum_frequency: DAY_TICKS,
            seed: 0,
            game: GameSettings::default(),
        }
    }
}

impl SimConfig {
    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game.pathfinder.max_search_nodes == 0 {
            return Err(ConfigError::NotPositive {
                field: "max_search_nodes",
            });
        }
        if self.game.train.stuck_retry_max_interval == 0 {
            return Err(ConfigError::NotPositive {
                field: "stuck_retry_max_interval",
            });
        }
        Ok(())
    }
}
