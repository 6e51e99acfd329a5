//! Shield arc geometry
//!
//! A raised shield covers a symmetric cone around the bot's facing direction:
//! - facing: center of the cone (degrees)
//! - half_angle: angular half-width (degrees), boundary included

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::{bearing, normalize_degrees, signed_angle_diff};

/// Frontal shield cone of a bot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShieldArc {
    /// Facing direction (degrees, normalized to [0, 360))
    pub facing: f64,
    /// Half-width of the cone (degrees)
    pub half_angle: f64,
}

impl ShieldArc {
    pub fn new(facing: f64, half_angle: f64) -> Self {
        Self {
            facing: normalize_degrees(facing),
            half_angle,
        }
    }

    /// Start edge (degrees, [0, 360))
    pub fn start(&self) -> f64 {
        normalize_degrees(self.facing - self.half_angle)
    }

    /// End edge (degrees, [0, 360))
    pub fn end(&self) -> f64 {
        normalize_degrees(self.facing + self.half_angle)
    }

    /// Total angular width, capped at a full turn
    pub fn angular_span(&self) -> f64 {
        (2.0 * self.half_angle).min(360.0)
    }

    /// Check if a direction falls inside the cone (handles wraparound)
    pub fn contains_angle(&self, theta: f64) -> bool {
        signed_angle_diff(theta, self.facing).abs() <= self.half_angle
    }

    /// Check if a point, seen from the bot center, lies in the covered direction
    pub fn covers_point(&self, center: DVec2, point: DVec2) -> bool {
        self.contains_angle(bearing(center, point))
    }
}
