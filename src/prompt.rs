//! Per-request context for the inference service
//!
//! Built from the ledger's open round so a bot sees where it is in the game,
//! who acts first, and what has happened so far. In independent mode a bot
//! only sees its own prompt and its own plays; augmented mode adds board
//! snapshots.

use serde::{Deserialize, Serialize};

use crate::AgentId;
use crate::inference::Reply;
use crate::ledger::RoundRecord;
use crate::settings::Settings;
use crate::sim::{Action, BoardSnapshot};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMode {
    pub shared_context: bool,
    pub augmented: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundInfo {
    pub current_round: u32,
    pub total_rounds: u32,
}

/// Whether this bot acts before its opponent every turn of the round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActingOrder {
    #[default]
    SelfFirst,
    OppFirst,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnInfo {
    pub current_turn: u32,
    pub turns_per_round: u32,
    pub acting_order: ActingOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundPrompt {
    #[serde(rename = "self")]
    pub own: String,
    /// Only in shared-context mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateContext {
    pub initial_state: BoardSnapshot,
    pub pre_state: BoardSnapshot,
}

/// One completed play of the current round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub turn: u32,
    pub agent_id: AgentId,
    pub reply: Reply,
    pub command: Action,
    /// Only in augmented mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_state: Option<BoardSnapshot>,
}

/// Everything sent alongside a bot's prompt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptContext {
    pub mode: ContextMode,
    pub round_info: RoundInfo,
    pub turn_info: TurnInfo,
    pub round_prompt: RoundPrompt,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateContext>,
    pub history: Vec<HistoryEntry>,
}

impl PromptContext {
    /// Context for `agent_id` in the open `round`, about to play `current_turn`
    pub fn for_agent(
        agent_id: AgentId,
        round: &RoundRecord,
        current_turn: u32,
        pre_state: &BoardSnapshot,
        settings: &Settings,
    ) -> Self {
        let mode = ContextMode {
            shared_context: settings.shared_context,
            augmented: settings.prompt_augmentation,
        };

        let acting_order = match round.turn_order.first() {
            Some(&first) if first != agent_id => ActingOrder::OppFirst,
            _ => ActingOrder::SelfFirst,
        };

        let round_prompt = RoundPrompt {
            own: round.prompt_for(agent_id).unwrap_or_default().to_string(),
            opp: round
                .prompts
                .iter()
                .find(|p| mode.shared_context && p.agent_id != agent_id)
                .map(|p| p.prompt.clone()),
        };

        let state = mode.augmented.then(|| StateContext {
            initial_state: round.initial_state.clone(),
            pre_state: pre_state.clone(),
        });

        let history = round
            .turns
            .iter()
            .filter(|turn| turn.post_state.is_some())
            .flat_map(|turn| {
                turn.plays
                    .iter()
                    .filter(move |play| mode.shared_context || play.agent_id == agent_id)
                    .map(move |play| HistoryEntry {
                        turn: turn.turn_number,
                        agent_id: play.agent_id,
                        reply: play.reply.clone(),
                        command: play.command,
                        post_state: turn.post_state.clone().filter(|_| mode.augmented),
                    })
            })
            .collect();

        Self {
            mode,
            round_info: RoundInfo {
                current_round: round.round_number,
                total_rounds: settings.total_rounds,
            },
            turn_info: TurnInfo {
                current_turn,
                turns_per_round: settings.turns_per_round,
                acting_order,
            },
            round_prompt,
            state,
            history,
        }
    }

    /// Compact JSON body for the transport layer
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
