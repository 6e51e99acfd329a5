//! Deterministic simulation module
//!
//! All battle rules live here. This module must be pure and deterministic:
//! - Discrete turns and discrete bullet steps only
//! - Seeded RNG only
//! - Stable iteration order (by bot ID)
//! - No rendering, network or timing dependencies

pub mod arc;
pub mod board;
pub mod collision;
pub mod command;
pub mod state;

pub use arc::ShieldArc;
pub use board::{Board, GameEvent, ShotOutcome, ShotRecord};
pub use collision::{Intersection, StepResult, advance, segment_circle_intersection};
pub use command::{Action, Spin, parse};
pub use state::{Agent, AgentParams, AgentSnapshot, BoardSnapshot, Projectile, RngState};
