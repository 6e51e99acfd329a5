//! Round orchestrator
//!
//! Owns the board, the ledger and all round/turn counters. Phases:
//!
//! ```text
//! AwaitingPrompts -> RoundActive (turns 1..N) -> RoundEnding -> GameOver
//!        ^                                            |
//!        +--------------------------------------------+
//! ```
//!
//! Every mutation goes through this type, one command at a time.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::AgentId;
use crate::error::{ConfigError, EngineError, LedgerError};
use crate::inference::{Inference, InferenceRequest, PendingReply, dispatch};
use crate::ledger::{HistoryLedger, Play, PromptRecord};
use crate::prompt::PromptContext;
use crate::settings::Settings;
use crate::sim::{Board, BoardSnapshot, GameEvent, RngState};

/// State machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Waiting for both players to submit a prompt
    AwaitingPrompts,
    /// Turns are being played
    RoundActive,
    /// Round finished, waiting for `end_round`
    RoundEnding,
    /// Terminal for this game
    GameOver,
}

/// Result of one `play_turn`
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub round: u32,
    pub turn: u32,
    /// Plays in acting order
    pub plays: Vec<Play>,
    pub post_state: BoardSnapshot,
    /// The termination check fired after this turn
    pub round_over: bool,
}

/// Result of one `end_round`
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    pub round: u32,
    pub turns_played: u32,
    pub final_state: BoardSnapshot,
    pub game_over: bool,
    /// Set only when `game_over`
    pub winner: Option<AgentId>,
}

/// Final result of a finished game
#[derive(Debug, Clone, PartialEq)]
pub struct GameResult {
    pub game_id: u32,
    /// `None` for a draw
    pub winner: Option<AgentId>,
    pub final_state: BoardSnapshot,
}

pub struct Orchestrator {
    settings: Settings,
    inference: Arc<dyn Inference>,
    /// Seed of game 1; later games use consecutive seeds
    base_seed: u64,
    rng: Pcg32,
    board: Board,
    ledger: HistoryLedger,
    phase: Phase,
    game_id: u32,
    round_number: u32,
    turn_number: u32,
    turn_order: Vec<AgentId>,
    game_result: Option<GameResult>,
}

impl Orchestrator {
    /// Validate settings and start game 1
    pub fn new(settings: Settings, inference: Arc<dyn Inference>, seed: u64) -> Result<Self, ConfigError> {
        settings.validate()?;

        let mut rng = RngState::new(seed).to_rng();
        let board = Board::new(&settings, &mut rng);
        let mut orchestrator = Self {
            settings,
            inference,
            base_seed: seed,
            rng,
            board,
            ledger: HistoryLedger::new(),
            phase: Phase::AwaitingPrompts,
            game_id: 0,
            round_number: 0,
            turn_number: 0,
            turn_order: Vec::new(),
            game_result: None,
        };
        orchestrator.open_game(seed);
        Ok(orchestrator)
    }

    fn open_game(&mut self, seed: u64) {
        // The ledger is always closed here: fresh, finished or abandoned
        match self.ledger.start_game(seed, self.board.snapshot()) {
            Ok(game_id) => self.game_id = game_id,
            Err(err) => {
                debug_assert!(false, "game opened twice: {err}");
                log::error!("Cannot open game: {}", err);
            }
        }
        self.phase = Phase::AwaitingPrompts;
        self.round_number = 0;
        self.turn_number = 0;
        self.turn_order.clear();
        self.game_result = None;
        self.board.push_event(GameEvent::GameStarted { game_id: self.game_id });
        log::info!("Game {} started (seed {})", self.game_id, seed);
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), EngineError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(EngineError::WrongPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    /// Store a player's prompt for the next round
    ///
    /// Returns `true` when this submission made both bots ready and the
    /// round started.
    pub fn submit_prompt(&mut self, agent_id: AgentId, prompt: impl Into<String>) -> Result<bool, EngineError> {
        self.expect_phase(Phase::AwaitingPrompts)?;
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(EngineError::EmptyPrompt(agent_id));
        }
        let agent = self
            .board
            .agent_mut(agent_id)
            .ok_or(EngineError::UnknownAgent(agent_id))?;
        agent.current_prompt = Some(prompt);
        agent.ready_for_next_round = true;
        log::debug!("Bot {} submitted its prompt", agent_id);

        if self.board.agents().iter().all(|a| a.ready_for_next_round) {
            self.start_round()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn start_round(&mut self) -> Result<(), EngineError> {
        let mut order: Vec<AgentId> = self.board.agents().iter().map(|a| a.id).collect();
        order.shuffle(&mut self.rng);

        let prompts = self
            .board
            .agents()
            .iter()
            .map(|a| PromptRecord {
                agent_id: a.id,
                prompt: a.current_prompt.clone().unwrap_or_default(),
            })
            .collect();
        let round = self
            .ledger
            .start_round(self.board.snapshot(), prompts, order.clone())?;

        for agent in self.board.agents_mut() {
            agent.ready_for_next_round = false;
        }

        self.round_number = round;
        self.turn_number = 0;
        self.turn_order = order;
        self.phase = Phase::RoundActive;
        self.board.push_event(GameEvent::RoundStarted {
            round,
            turn_order: self.turn_order.clone(),
        });
        log::info!("Round {} started, turn order {:?}", round, self.turn_order);
        Ok(())
    }

    /// Play one full turn: every bot acts once, in the round's order
    pub async fn play_turn(&mut self) -> Result<TurnReport, EngineError> {
        self.expect_phase(Phase::RoundActive)?;

        let pre_state = self.board.snapshot();
        let turn = self.ledger.start_turn(pre_state.clone())?;
        self.turn_number = turn;
        self.board.push_event(GameEvent::TurnStarted {
            round: self.round_number,
            turn,
        });

        // Fire every request before waiting on any of them
        let pending = self.dispatch_requests(turn, &pre_state)?;

        let mut plays = Vec::with_capacity(pending.len());
        for request in pending {
            let agent_id = request.agent_id;
            let reply = request.resolve().await;
            let command = reply.command();
            let mut play = Play::new(agent_id, reply, command);

            if self.board.any_dead() {
                play.skipped = true;
                log::debug!("Bot {} skipped: a bot died earlier this turn", agent_id);
            } else {
                play.shot = self.board.apply(agent_id, &play.command)?;
                log::debug!("Bot {} played {} ({:?})", agent_id, play.command, play.reply);
            }

            self.ledger.record_play(play.clone())?;
            plays.push(play);
        }

        let post_state = self.board.snapshot();
        self.ledger.end_turn(post_state.clone())?;
        self.board.push_event(GameEvent::TurnEnded {
            round: self.round_number,
            turn,
        });

        let round_over = turn >= self.settings.turns_per_round || self.board.any_dead();
        if round_over {
            self.phase = Phase::RoundEnding;
            log::info!("Round {} over after turn {}", self.round_number, turn);
        }

        Ok(TurnReport {
            round: self.round_number,
            turn,
            plays,
            post_state,
            round_over,
        })
    }

    fn dispatch_requests(&self, turn: u32, pre_state: &BoardSnapshot) -> Result<Vec<PendingReply>, EngineError> {
        let round = self.ledger.current_round().ok_or(LedgerError::NoActiveRound)?;
        let timeout = self.settings.inference_timeout();

        self.turn_order
            .iter()
            .map(|&agent_id| {
                let agent = self
                    .board
                    .agent(agent_id)
                    .ok_or(EngineError::UnknownAgent(agent_id))?;
                let request = InferenceRequest {
                    agent_id,
                    prompt: agent.current_prompt.clone().unwrap_or_default(),
                    context: PromptContext::for_agent(agent_id, round, turn, pre_state, &self.settings),
                };
                Ok(dispatch(&self.inference, request, timeout))
            })
            .collect()
    }

    /// Close the finished round; ends the game or waits for new prompts
    pub fn end_round(&mut self) -> Result<RoundOutcome, EngineError> {
        self.expect_phase(Phase::RoundEnding)?;

        self.ledger.end_round()?;
        self.board.push_event(GameEvent::RoundEnded {
            round: self.round_number,
        });
        for agent in self.board.agents_mut() {
            agent.current_prompt = None;
        }

        let final_state = self.board.snapshot();
        let game_over = final_state.any_dead() || self.round_number >= self.settings.total_rounds;
        let winner = if game_over {
            self.finish_game(final_state.clone())?
        } else {
            self.phase = Phase::AwaitingPrompts;
            None
        };

        Ok(RoundOutcome {
            round: self.round_number,
            turns_played: self.turn_number,
            final_state,
            game_over,
            winner,
        })
    }

    fn finish_game(&mut self, final_state: BoardSnapshot) -> Result<Option<AgentId>, EngineError> {
        let winner = self.ledger.end_game(final_state.clone())?;
        self.phase = Phase::GameOver;
        self.board.push_event(GameEvent::GameOver { winner });
        match winner {
            Some(id) => log::info!("Game {} over, bot {} wins", self.game_id, id),
            None => log::info!("Game {} over, draw", self.game_id),
        }
        self.game_result = Some(GameResult {
            game_id: self.game_id,
            winner,
            final_state,
        });
        Ok(winner)
    }

    /// Play turns until the round ends, then close it
    pub async fn play_round(&mut self) -> Result<RoundOutcome, EngineError> {
        self.expect_phase(Phase::RoundActive)?;
        while self.phase == Phase::RoundActive {
            self.play_turn().await?;
        }
        self.end_round()
    }

    /// Replace both bots and open a new game; an unfinished game is abandoned
    pub fn start_new_game(&mut self) -> Result<u32, EngineError> {
        if self.phase != Phase::GameOver {
            log::warn!("Abandoning game {} in phase {:?}", self.game_id, self.phase);
            self.ledger.abandon_game(self.board.snapshot())?;
        }

        let seed = self.base_seed.wrapping_add(self.ledger.games().len() as u64);
        self.rng = RngState::new(seed).to_rng();
        // Undrained events of the old game are dropped
        self.board = Board::new(&self.settings, &mut self.rng);
        self.open_game(seed);
        Ok(self.game_id)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn game_id(&self) -> u32 {
        self.game_id
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn turn_number(&self) -> u32 {
        self.turn_number
    }

    /// Acting order of the current round
    pub fn turn_order(&self) -> &[AgentId] {
        &self.turn_order
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Put a bot at an exact pose before round 1 of the current game
    ///
    /// The game's recorded initial state is taken again afterwards so the
    /// ledger matches the board the first round starts from.
    pub fn place_agent(&mut self, agent_id: AgentId, x: f64, y: f64, rotation: f64) -> Result<(), EngineError> {
        if self.phase != Phase::AwaitingPrompts || self.round_number != 0 {
            return Err(EngineError::SetupClosed);
        }
        self.board.place_agent(agent_id, x, y, rotation)?;
        self.ledger.restate_initial(self.board.snapshot())?;

        let (pos, rotation) = self
            .board
            .agent(agent_id)
            .map(|a| (a.pos, a.rotation()))
            .ok_or(EngineError::UnknownAgent(agent_id))?;
        self.board.push_event(GameEvent::Moved {
            agent: agent_id,
            x: pos.x,
            y: pos.y,
        });
        self.board.push_event(GameEvent::Rotated { agent: agent_id, rotation });
        log::debug!("Bot {} placed at ({:.3}, {:.3}) facing {:.1}", agent_id, pos.x, pos.y, rotation);
        Ok(())
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn game_result(&self) -> Option<&GameResult> {
        self.game_result.as_ref()
    }

    /// Presentation events since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.board.drain_events()
    }
}
