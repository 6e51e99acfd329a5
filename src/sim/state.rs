//! Bots, bullets and snapshots
//!
//! Positions live in the unit square, rotations are degrees in [0, 360).

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::settings::Settings;
use crate::{AgentId, heading, normalize_degrees};

/// Per-bot constants, copied out of `Settings` at game start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentParams {
    pub step_length: f64,
    pub diameter: f64,
    pub shield_arc_degrees: f64,
    pub bullet_step_length: f64,
}

impl AgentParams {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            step_length: settings.step_length,
            diameter: settings.diameter,
            shield_arc_degrees: settings.shield_arc_degrees,
            bullet_step_length: settings.bullet_step_length,
        }
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }
}

/// A combatant bot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub pos: DVec2,
    /// Facing direction (degrees, [0, 360))
    rotation: f64,
    health: u32,
    pub shield_up: bool,
    pub params: AgentParams,
    /// Player instruction for the current/next round
    #[serde(default)]
    pub current_prompt: Option<String>,
    /// Prompt submitted and waiting for the round to start
    #[serde(default)]
    pub ready_for_next_round: bool,
}

impl Agent {
    pub fn new(id: AgentId, pos: DVec2, rotation: f64, health: u32, params: AgentParams) -> Self {
        Self {
            id,
            pos,
            rotation: normalize_degrees(rotation),
            health,
            shield_up: false,
            params,
            current_prompt: None,
            ready_for_next_round: false,
        }
    }

    /// Spawn with a random pose inside the arena
    pub fn spawn(id: AgentId, settings: &Settings, rng: &mut Pcg32) -> Self {
        let params = AgentParams::from_settings(settings);
        let r = params.radius();
        let pos = DVec2::new(rng.random_range(r..=1.0 - r), rng.random_range(r..=1.0 - r));
        let rotation = rng.random_range(0.0..360.0);
        let mut agent = Self::new(id, pos, rotation, settings.initial_health, params);
        agent.shield_up = settings.shield_initial_state;
        agent
    }

    #[inline]
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    #[inline]
    pub fn health(&self) -> u32 {
        self.health
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.health == 0
    }

    /// One step forward along the facing direction (no bounds check)
    pub fn move_forward(&mut self) {
        self.pos += heading(self.rotation) * self.params.step_length;
    }

    /// Rotate by a signed delta in degrees, result kept in [0, 360)
    pub fn rotate_by(&mut self, delta_degrees: f64) {
        self.rotation = normalize_degrees(self.rotation + delta_degrees);
    }

    /// Point in an absolute direction
    pub fn set_rotation(&mut self, degrees: f64) {
        self.rotation = normalize_degrees(degrees);
    }

    pub fn set_shield(&mut self, up: bool) {
        self.shield_up = up;
    }

    pub fn toggle_shield(&mut self) {
        self.shield_up = !self.shield_up;
    }

    /// Lose health, flooring at zero
    pub fn take_damage(&mut self, amount: u32) {
        self.health = self.health.saturating_sub(amount);
    }

    /// Fire a bullet from the current pose; a raised shield blocks firing
    pub fn try_shoot(&self) -> Option<Projectile> {
        if self.shield_up {
            return None;
        }
        Some(Projectile {
            owner_id: self.id,
            pos: self.pos,
            rotation: self.rotation,
            step_length: self.params.bullet_step_length,
        })
    }

    /// Keep the whole hitbox inside the arena
    pub fn clamp_to_arena(&mut self) {
        let r = self.params.radius();
        self.pos = self.pos.clamp(DVec2::splat(r), DVec2::splat(1.0 - r));
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            x: self.pos.x,
            y: self.pos.y,
            rotation: self.rotation,
            health: self.health,
            shield_up: self.shield_up,
        }
    }
}

/// A bullet in flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub owner_id: AgentId,
    pub pos: DVec2,
    /// Direction of travel (degrees), inherited from the shooter
    pub rotation: f64,
    pub step_length: f64,
}

impl Projectile {
    /// Position after one more step
    #[inline]
    pub fn next_pos(&self) -> DVec2 {
        self.pos + heading(self.rotation) * self.step_length
    }

    #[inline]
    pub fn in_arena(&self) -> bool {
        (0.0..=1.0).contains(&self.pos.x) && (0.0..=1.0).contains(&self.pos.y)
    }
}

/// Immutable view of one bot at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub health: u32,
    pub shield_up: bool,
}

/// Immutable view of both bots, ordered by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub agents: Vec<AgentSnapshot>,
}

impl BoardSnapshot {
    pub fn agent(&self, id: AgentId) -> Option<&AgentSnapshot> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn any_dead(&self) -> bool {
        self.agents.iter().any(|a| a.health == 0)
    }

    /// Bot with strictly the most health, `None` on a tie
    pub fn leader(&self) -> Option<AgentId> {
        let best = self.agents.iter().map(|a| a.health).max()?;
        let mut leaders = self.agents.iter().filter(|a| a.health == best);
        match (leaders.next(), leaders.next()) {
            (Some(only), None) => Some(only.id),
            _ => None,
        }
    }
}

/// RNG state wrapper for serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn to_rng(&self) -> Pcg32 {
        Pcg32::seed_from_u64(self.seed)
    }
}
