//! Sandbox settings.
//!
//! Every field has a default, so a settings file only needs the values it
//! overrides. Gravity and speed can also be changed at runtime through the
//! sandbox.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Gravity scale applied to earth gravity; pieces are tens of units wide.
pub const GRAVITY_SCALE: f32 = 20.0;

/// Errors raised while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Tunable parameters of the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SandboxConfig {
    /// World gravity.
    pub gravity: Vec3,
    /// Nominal marble speed used to derive flight time.
    pub speed: f32,
    /// Lower bound on the flight time of a jump (seconds).
    pub min_flight_time: f32,
    /// Fixed integration step (seconds).
    pub fixed_dt: f32,
    /// Frame deltas above this are clamped (seconds).
    pub max_frame_delta: f32,
    /// Sub-step cap per frame.
    pub max_substeps: u32,
    /// Pair cooldown window (seconds).
    pub collision_cooldown: f32,
    /// Delay between a terminal event and the marble reset (seconds).
    pub grace_delay: f32,
    /// How long a struck piece stays lit (seconds).
    pub highlight_duration: f32,
    /// Height difference under which two pieces count as level.
    pub tie_epsilon: f32,
    /// Maximum shadow steps per prediction.
    pub prediction_steps: u32,
    /// Prediction stops once the marble drops below this height.
    pub prediction_floor: f32,
    /// Factor applied to upward velocity when a marble reaches the last piece.
    pub end_upward_damping: f32,
    pub audio_enabled: bool,
    pub highlight_enabled: bool,
    /// Seed of the highlight palette RNG.
    pub highlight_seed: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81 * GRAVITY_SCALE, 0.0),
            speed: 40.0,
            min_flight_time: 0.25,
            fixed_dt: 1.0 / 60.0,
            max_frame_delta: 0.1,
            max_substeps: 15,
            collision_cooldown: 0.15,
            grace_delay: 1.0,
            highlight_duration: 0.3,
            tie_epsilon: 0.01,
            prediction_steps: 200,
            prediction_floor: -200.0,
            end_upward_damping: 0.5,
            audio_enabled: true,
            highlight_enabled: true,
            highlight_seed: 12345,
        }
    }
}

impl SandboxConfig {
    /// Parses and validates settings from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("speed", self.speed)?;
        positive("minFlightTime", self.min_flight_time)?;
        positive("fixedDt", self.fixed_dt)?;
        positive("maxFrameDelta", self.max_frame_delta)?;
        non_negative("collisionCooldown", self.collision_cooldown)?;
        non_negative("graceDelay", self.grace_delay)?;
        non_negative("highlightDuration", self.highlight_duration)?;
        non_negative("tieEpsilon", self.tie_epsilon)?;
        if self.max_substeps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maxSubsteps",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.gravity.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "gravity",
                reason: "must be finite".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.end_upward_damping) {
            return Err(ConfigError::InvalidValue {
                field: "endUpwardDamping",
                reason: format!("{} is outside 0..=1", self.end_upward_damping),
            });
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("{value} must be positive"),
        })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("{value} must not be negative"),
        })
    }
}
