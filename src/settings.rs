//! Game settings
//!
//! Read once at game start and never mutated for the lifetime of that game.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;

/// Per-game constants supplied by the configuration layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Game structure ===
    /// Rounds per game
    pub total_rounds: u32,
    /// Turns per round
    pub turns_per_round: u32,

    // === Bots ===
    /// Starting health
    pub initial_health: u32,
    /// Health removed by one unblocked hit
    pub bullet_damage: u32,
    /// Half-angle of the frontal shield cone (degrees)
    pub shield_arc_degrees: f64,
    /// Whether bots spawn with the shield raised
    pub shield_initial_state: bool,
    /// Distance covered by one `M` command
    pub step_length: f64,
    /// Hitbox diameter
    pub diameter: f64,

    // === Bullets ===
    /// Distance covered per bullet step
    pub bullet_step_length: f64,

    // === Inference ===
    /// Seconds to wait for each bot's reply
    pub inference_timeout_secs: u64,
    /// Both bots see each other's prompts and plays
    pub shared_context: bool,
    /// Include board state snapshots in each request
    pub prompt_augmentation: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            total_rounds: TOTAL_ROUNDS,
            turns_per_round: TURNS_PER_ROUND,

            initial_health: INITIAL_HEALTH,
            bullet_damage: BULLET_DAMAGE,
            shield_arc_degrees: SHIELD_ARC_DEGREES,
            shield_initial_state: false,
            step_length: STEP_LENGTH,
            diameter: DIAMETER,

            bullet_step_length: BULLET_STEP_LENGTH,

            inference_timeout_secs: INFERENCE_TIMEOUT_SECS,
            shared_context: true,
            prompt_augmentation: false,
        }
    }
}

impl Settings {
    /// Parse settings from TOML; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and parse a TOML settings file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_toml_str(&text)?;
        log::info!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.total_rounds == 0 {
            return Err(invalid("total_rounds", "must be at least 1"));
        }
        if self.turns_per_round == 0 {
            return Err(invalid("turns_per_round", "must be at least 1"));
        }
        if self.initial_health == 0 {
            return Err(invalid("initial_health", "must be at least 1"));
        }
        if !(self.shield_arc_degrees.is_finite() && (0.0..=180.0).contains(&self.shield_arc_degrees))
        {
            return Err(invalid("shield_arc_degrees", "must be within [0, 180]"));
        }
        for (field, value) in [
            ("step_length", self.step_length),
            ("bullet_step_length", self.bullet_step_length),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, "must be a positive number"));
            }
        }
        if self.bullet_step_length < MIN_BULLET_STEP_LENGTH {
            return Err(invalid(
                "bullet_step_length",
                format!("must be at least {}", MIN_BULLET_STEP_LENGTH),
            ));
        }
        if !(self.diameter.is_finite() && self.diameter > 0.0 && self.diameter < 1.0) {
            return Err(invalid("diameter", "must be within (0, 1)"));
        }
        if self.inference_timeout_secs == 0 {
            return Err(invalid("inference_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }

    /// Reply deadline for one inference request
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }
}
