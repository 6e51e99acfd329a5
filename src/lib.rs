//! BatLLM Arena - a turn-based two-bot battle engine
//!
//! Core modules:
//! - `sim`: Deterministic simulation (commands, bots, bullets, shield collisions)
//! - `orchestrator`: Turn / round / game state machine
//! - `inference`: Boundary to the language-model service that produces commands
//! - `prompt`: Per-request context handed to that service
//! - `ledger`: Append-only game history
//! - `persistence`: Serialization of recorded history
//! - `settings`: Immutable per-game configuration

pub mod error;
pub mod inference;
pub mod ledger;
pub mod orchestrator;
pub mod persistence;
pub mod prompt;
pub mod settings;
pub mod sim;

pub use error::{ConfigError, EngineError, InferenceError, LedgerError};
pub use inference::{Inference, InferenceRequest, Reply, ScriptedInference};
pub use ledger::HistoryLedger;
pub use orchestrator::{GameResult, Orchestrator, Phase, RoundOutcome, TurnReport};
pub use settings::Settings;

use glam::DVec2;

/// Bot identifier, stable for a bot's lifetime (1 and 2 in a game)
pub type AgentId = u32;

/// Configuration defaults
pub mod consts {
    /// Rounds per game
    pub const TOTAL_ROUNDS: u32 = 3;
    /// Turns per round
    pub const TURNS_PER_ROUND: u32 = 5;
    /// Starting health of each bot
    pub const INITIAL_HEALTH: u32 = 20;
    /// Health lost per unblocked bullet hit
    pub const BULLET_DAMAGE: u32 = 3;
    /// Half-angle of the frontal shield cone (degrees)
    pub const SHIELD_ARC_DEGREES: f64 = 20.0;

    /// Bot movement per `M` command (arena units, arena is the unit square)
    pub const STEP_LENGTH: f64 = 0.02;
    /// Bot hitbox diameter
    pub const DIAMETER: f64 = 0.1;
    /// Bullet advance per step
    pub const BULLET_STEP_LENGTH: f64 = 0.01;
    /// Smallest accepted bullet step, bounds the steps a single shot can take
    pub const MIN_BULLET_STEP_LENGTH: f64 = 1e-4;

    /// Seconds to wait for a reply from the inference service
    pub const INFERENCE_TIMEOUT_SECS: u64 = 55;

    /// Bots per game
    pub const AGENT_COUNT: usize = 2;
}

/// Normalize an angle in degrees to [0, 360)
#[inline]
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round tiny negatives up to exactly 360
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Signed difference `a - b` in degrees, normalized to (-180, 180]
#[inline]
pub fn signed_angle_diff(a: f64, b: f64) -> f64 {
    let d = normalize_degrees(a - b);
    if d > 180.0 { d - 360.0 } else { d }
}

/// Unit direction vector for a heading given in degrees
#[inline]
pub fn heading(rotation_degrees: f64) -> DVec2 {
    let rad = rotation_degrees.to_radians();
    DVec2::new(rad.cos(), rad.sin())
}

/// Angle (degrees, [0, 360)) of the vector from `from` to `to`
#[inline]
pub fn bearing(from: DVec2, to: DVec2) -> f64 {
    let d = to - from;
    normalize_degrees(d.y.atan2(d.x).to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_degrees_wraps() {
        assert_eq!(normalize_degrees(0.0), 0.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(725.0), 5.0);
        assert_eq!(normalize_degrees(-1e-20), 0.0);
    }

    #[test]
    fn test_signed_angle_diff_range() {
        assert_eq!(signed_angle_diff(10.0, 350.0), 20.0);
        assert_eq!(signed_angle_diff(350.0, 10.0), -20.0);
        // Exactly opposite resolves to +180, never -180
        assert_eq!(signed_angle_diff(0.0, 180.0), 180.0);
        assert_eq!(signed_angle_diff(180.0, 0.0), 180.0);
    }

    #[test]
    fn test_heading_and_bearing() {
        let h = heading(90.0);
        assert!(h.x.abs() < 1e-12);
        assert!((h.y - 1.0).abs() < 1e-12);

        let b = bearing(DVec2::new(0.5, 0.5), DVec2::new(0.2, 0.5));
        assert!((b - 180.0).abs() < 1e-9);
    }
}
