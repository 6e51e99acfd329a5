//! Ledger record types
//!
//! Plain nested data: Game > Round > Turn > Play. Everything here serializes
//! with serde so the persistence layer can write it out unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AgentId;
use crate::inference::Reply;
use crate::sim::{Action, BoardSnapshot, ShotRecord};

/// A player's instruction for one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRecord {
    pub agent_id: AgentId,
    pub prompt: String,
}

/// One bot's reply within a turn and what came of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Play {
    pub agent_id: AgentId,
    /// Raw reply text, or why none arrived
    pub reply: Reply,
    /// Parsed command (`ERR` when invalid or missing)
    pub command: Action,
    /// Present for `B` commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shot: Option<ShotRecord>,
    /// Recorded but not applied: a bot died earlier in the same turn
    #[serde(default)]
    pub skipped: bool,
}

impl Play {
    pub fn new(agent_id: AgentId, reply: Reply, command: Action) -> Self {
        Self {
            agent_id,
            reply,
            command,
            shot: None,
            skipped: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn_number: u32,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub pre_state: BoardSnapshot,
    pub plays: Vec<Play>,
    /// Set when the turn closes
    #[serde(default)]
    pub post_state: Option<BoardSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round_number: u32,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub initial_state: BoardSnapshot,
    pub prompts: Vec<PromptRecord>,
    /// Acting order used for every turn of the round
    pub turn_order: Vec<AgentId>,
    pub turns: Vec<TurnRecord>,
}

impl RoundRecord {
    pub fn prompt_for(&self, agent_id: AgentId) -> Option<&str> {
        self.prompts
            .iter()
            .find(|p| p.agent_id == agent_id)
            .map(|p| p.prompt.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: u32,
    /// RNG seed the game was played with
    pub seed: u64,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub initial_state: BoardSnapshot,
    #[serde(default)]
    pub final_state: Option<BoardSnapshot>,
    /// Bot with the most health at the end, `None` for a draw
    #[serde(default)]
    pub winner: Option<AgentId>,
    /// Closed early because a new game replaced it
    #[serde(default)]
    pub abandoned: bool,
    pub rounds: Vec<RoundRecord>,
}

impl GameRecord {
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// All plays in order, with their round and turn numbers
    pub fn plays(&self) -> impl Iterator<Item = (u32, u32, &Play)> {
        self.rounds.iter().flat_map(|round| {
            round.turns.iter().flat_map(move |turn| {
                turn.plays
                    .iter()
                    .map(move |play| (round.round_number, turn.turn_number, play))
            })
        })
    }
}
