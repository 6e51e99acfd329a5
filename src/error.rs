//! Error types for the arena engine.
//!
//! Malformed command text is not an error here: the interpreter maps it to
//! `Action::Invalid`. Everything below is either a collaborator failure or a
//! state-machine transition called out of order.

use std::time::Duration;

use crate::AgentId;
use crate::orchestrator::Phase;

/// Out-of-order use of the history ledger
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("no active game, call start_game first")]
    NoActiveGame,

    #[error("a game is already in progress")]
    GameAlreadyActive,

    #[error("no active round, call start_round first")]
    NoActiveRound,

    #[error("a round is already in progress")]
    RoundAlreadyActive,

    #[error("no active turn, call start_turn first")]
    NoActiveTurn,

    #[error("a turn is already in progress")]
    TurnAlreadyActive,

    #[error("cannot end a round mid-turn, call end_turn first")]
    TurnStillOpen,

    #[error("cannot end a game mid-round, call end_round first")]
    RoundStillOpen,

    #[error("no game with id {0}")]
    UnknownGame(u32),

    #[error("the game has rounds, its initial state is fixed")]
    InitialStateFixed,
}

/// Out-of-order use of the round orchestrator
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("operation requires phase {expected:?}, current phase is {actual:?}")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error("no bot with id {0}")]
    UnknownAgent(AgentId),

    #[error("bot {0} submitted an empty prompt")]
    EmptyPrompt(AgentId),

    #[error("board setup is only allowed before the first round of a game")]
    SetupClosed,

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Failure to obtain a reply from the inference service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InferenceError {
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("request task aborted: {0}")]
    Aborted(String),
}

/// Invalid or unreadable configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
