//! Bullet collision detection
//!
//! Bullets are points moving in discrete steps. Each step sweeps a segment
//! from the current position to the next one; that segment is tested against
//! every bot's circular hitbox except the shooter's, then against the target's
//! shield cone if the shield is raised.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::arc::ShieldArc;
use super::state::{Agent, Projectile};
use crate::AgentId;

/// First contact of a segment with a circle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// Fraction along the segment, in [0, 1]
    pub t: f64,
    /// Contact point
    pub point: DVec2,
}

/// Outcome of one bullet step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepResult {
    /// Bullet moved, still in flight
    Continue,
    /// Bullet struck an unshielded part of this bot
    Hit(AgentId),
    /// Bullet struck this bot's raised shield and was destroyed
    Blocked(AgentId),
    /// Bullet left the arena
    OutOfBounds,
}

impl StepResult {
    /// Whether the bullet is gone after this step
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepResult::Continue)
    }
}

/// Intersect segment `start -> end` with a circle
///
/// Solves `a·t² + b·t + c = 0` with `d = end - start`, `f = start - center`:
/// `a = d·d`, `b = 2 f·d`, `c = f·f - r²`, and returns the smallest root in [0, 1].
pub fn segment_circle_intersection(
    start: DVec2,
    end: DVec2,
    center: DVec2,
    radius: f64,
) -> Option<Intersection> {
    let d = end - start;
    let f = start - center;

    let a = d.dot(d);
    if a <= f64::EPSILON * f64::EPSILON {
        return None; // Degenerate segment
    }
    let b = 2.0 * f.dot(d);
    let c = f.dot(f) - radius * radius;

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_disc = discriminant.sqrt();
    let t1 = (-b - sqrt_disc) / (2.0 * a);
    let t2 = (-b + sqrt_disc) / (2.0 * a);

    // t1 <= t2, so the first root in range is the earlier contact
    let t = [t1, t2].into_iter().find(|t| (0.0..=1.0).contains(t))?;
    Some(Intersection {
        t,
        point: start + d * t,
    })
}

/// Whether a contact point on `target` is covered by its raised shield
pub fn shield_blocks(target: &Agent, point: DVec2) -> bool {
    target.shield_up
        && ShieldArc::new(target.rotation(), target.params.shield_arc_degrees)
            .covers_point(target.pos, point)
}

/// Advance a bullet by one step
///
/// Out-of-bounds is checked on the current position before moving. The
/// position is only committed when nothing was struck.
pub fn advance(projectile: &mut Projectile, agents: &[Agent]) -> StepResult {
    if !projectile.in_arena() {
        return StepResult::OutOfBounds;
    }

    let start = projectile.pos;
    let end = projectile.next_pos();

    let nearest = agents
        .iter()
        .filter(|agent| agent.id != projectile.owner_id)
        .filter_map(|agent| {
            segment_circle_intersection(start, end, agent.pos, agent.params.radius())
                .map(|hit| (agent, hit))
        })
        .min_by(|(_, a), (_, b)| a.t.total_cmp(&b.t));

    match nearest {
        Some((target, hit)) if shield_blocks(target, hit.point) => StepResult::Blocked(target.id),
        Some((target, _)) => StepResult::Hit(target.id),
        None => {
            projectile.pos = end;
            StepResult::Continue
        }
    }
}
