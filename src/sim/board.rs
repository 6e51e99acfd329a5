//! The arena
//!
//! Applies parsed commands to bots and runs every shot to completion before
//! returning, so no two mutations ever interleave.

use glam::DVec2;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::collision::{StepResult, advance};
use super::command::Action;
use super::state::{Agent, BoardSnapshot, Projectile};
use crate::consts::AGENT_COUNT;
use crate::error::EngineError;
use crate::settings::Settings;
use crate::AgentId;

/// How a shot ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShotOutcome {
    /// Unblocked hit, `damage` subtracted from the target
    Hit { target: AgentId, damage: u32 },
    /// Stopped by the target's shield, no damage
    Blocked { target: AgentId },
    /// Left the arena
    OutOfBounds,
    /// Shooter's shield was up, nothing fired
    NotFired,
}

/// Result of one `B` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotRecord {
    pub outcome: ShotOutcome,
    /// Bullet steps taken before resolving
    pub steps: u32,
}

/// Presentation events, appended after every mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    GameStarted { game_id: u32 },
    RoundStarted { round: u32, turn_order: Vec<AgentId> },
    TurnStarted { round: u32, turn: u32 },
    Moved { agent: AgentId, x: f64, y: f64 },
    Rotated { agent: AgentId, rotation: f64 },
    ShieldChanged { agent: AgentId, up: bool },
    ProjectileFired { owner: AgentId, x: f64, y: f64, rotation: f64 },
    ProjectileMoved { owner: AgentId, x: f64, y: f64 },
    ShotBlocked { owner: AgentId, target: AgentId },
    Damaged { agent: AgentId, amount: u32, health: u32 },
    ProjectileExpired { owner: AgentId },
    TurnEnded { round: u32, turn: u32 },
    RoundEnded { round: u32 },
    GameOver { winner: Option<AgentId> },
}

/// Both bots plus the per-game constants the board needs
#[derive(Debug, Clone)]
pub struct Board {
    agents: Vec<Agent>,
    bullet_damage: u32,
    events: Vec<GameEvent>,
    /// Positions of the most recent bullet, for drawing its trail
    last_trace: Vec<DVec2>,
}

impl Board {
    /// Spawn bots 1 and 2 at random poses
    pub fn new(settings: &Settings, rng: &mut Pcg32) -> Self {
        let agents = (1..=AGENT_COUNT as AgentId)
            .map(|id| Agent::spawn(id, settings, rng))
            .collect();
        Self::from_agents(agents, settings.bullet_damage)
    }

    /// Build a board from explicit bots, sorted by id
    pub fn from_agents(mut agents: Vec<Agent>, bullet_damage: u32) -> Self {
        debug_assert_eq!(agents.len(), AGENT_COUNT, "a game has exactly two bots");
        agents.sort_by_key(|a| a.id);
        let mut board = Self {
            agents,
            bullet_damage,
            events: Vec::new(),
            last_trace: Vec::new(),
        };
        board.clamp_agents();
        board
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Bots in id order; positions are not re-clamped
    pub fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.id == id)
    }

    fn agent_index(&self, id: AgentId) -> Result<usize, EngineError> {
        self.agents
            .iter()
            .position(|a| a.id == id)
            .ok_or(EngineError::UnknownAgent(id))
    }

    /// Put a bot at an exact pose (scenario setup and replays)
    pub fn place_agent(&mut self, id: AgentId, x: f64, y: f64, rotation: f64) -> Result<(), EngineError> {
        let idx = self.agent_index(id)?;
        let agent = &mut self.agents[idx];
        agent.pos = DVec2::new(x, y);
        agent.set_rotation(rotation);
        agent.clamp_to_arena();
        Ok(())
    }

    /// Apply one parsed command; returns the shot record for `B`
    pub fn apply(&mut self, id: AgentId, action: &Action) -> Result<Option<ShotRecord>, EngineError> {
        let idx = self.agent_index(id)?;
        let agent = &mut self.agents[idx];

        match *action {
            Action::Move => {
                agent.move_forward();
                agent.clamp_to_arena();
                self.events.push(GameEvent::Moved {
                    agent: id,
                    x: agent.pos.x,
                    y: agent.pos.y,
                });
            }
            Action::RotateBy { .. } => {
                let delta = action.rotation_delta().unwrap_or_default();
                agent.rotate_by(delta);
                self.events.push(GameEvent::Rotated {
                    agent: id,
                    rotation: agent.rotation(),
                });
            }
            Action::ShieldSet(up) => {
                agent.set_shield(up);
                self.events.push(GameEvent::ShieldChanged { agent: id, up });
            }
            Action::ShieldToggle => {
                agent.toggle_shield();
                self.events.push(GameEvent::ShieldChanged {
                    agent: id,
                    up: agent.shield_up,
                });
            }
            Action::Shoot => return self.shoot(id).map(Some),
            Action::Invalid => {}
        }
        Ok(None)
    }

    /// Fire from `id` and advance the bullet until it resolves
    pub fn shoot(&mut self, id: AgentId) -> Result<ShotRecord, EngineError> {
        let idx = self.agent_index(id)?;
        let Some(mut bullet) = self.agents[idx].try_shoot() else {
            log::debug!("Bot {} tried to shoot with its shield up", id);
            return Ok(ShotRecord {
                outcome: ShotOutcome::NotFired,
                steps: 0,
            });
        };

        self.last_trace.clear();
        self.events.push(GameEvent::ProjectileFired {
            owner: id,
            x: bullet.pos.x,
            y: bullet.pos.y,
            rotation: bullet.rotation,
        });

        let (result, steps) = self.run_projectile(&mut bullet);
        let outcome = match result {
            StepResult::Hit(target) => {
                let damage = self.bullet_damage;
                let target_idx = self.agent_index(target)?;
                let victim = &mut self.agents[target_idx];
                victim.take_damage(damage);
                self.events.push(GameEvent::Damaged {
                    agent: target,
                    amount: damage,
                    health: victim.health(),
                });
                ShotOutcome::Hit { target, damage }
            }
            StepResult::Blocked(target) => {
                self.events.push(GameEvent::ShotBlocked { owner: id, target });
                ShotOutcome::Blocked { target }
            }
            StepResult::OutOfBounds | StepResult::Continue => ShotOutcome::OutOfBounds,
        };
        self.events.push(GameEvent::ProjectileExpired { owner: id });

        log::debug!("Bot {} shot: {:?} after {} steps", id, outcome, steps);
        Ok(ShotRecord { outcome, steps })
    }

    /// Tight loop over bullet steps; the board is otherwise frozen meanwhile
    fn run_projectile(&mut self, bullet: &mut Projectile) -> (StepResult, u32) {
        // A straight line crosses the unit square in at most ~sqrt(2)/step steps
        let max_steps = (2.0 / bullet.step_length).ceil() as u32 + 2;
        let mut steps = 0;

        loop {
            let result = advance(bullet, &self.agents);
            if result.is_terminal() {
                return (result, steps);
            }
            steps += 1;
            self.last_trace.push(bullet.pos);
            self.events.push(GameEvent::ProjectileMoved {
                owner: bullet.owner_id,
                x: bullet.pos.x,
                y: bullet.pos.y,
            });
            if steps >= max_steps {
                debug_assert!(false, "bullet failed to leave the arena");
                log::warn!("Bullet from bot {} exceeded {} steps", bullet.owner_id, max_steps);
                return (StepResult::OutOfBounds, steps);
            }
        }
    }

    fn clamp_agents(&mut self) {
        for agent in &mut self.agents {
            agent.clamp_to_arena();
        }
    }

    pub fn any_dead(&self) -> bool {
        self.agents.iter().any(Agent::is_dead)
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            agents: self.agents.iter().map(Agent::snapshot).collect(),
        }
    }

    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Hand pending events to the presentation layer
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn last_trace(&self) -> &[DVec2] {
        &self.last_trace
    }
}
