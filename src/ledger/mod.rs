//! Append-only game history
//!
//! Events, in order:
//! - `start_game` / `end_game` (or `abandon_game`)
//! - `start_round` / `end_round`
//! - `start_turn` / `record_play`* / `end_turn`
//!
//! Each call checks that its parent context is open and reports a
//! `LedgerError` otherwise; missing records are never fabricated. Once a
//! turn, round or game is closed its record is never touched again.

pub mod records;

pub use records::{GameRecord, Play, PromptRecord, RoundRecord, TurnRecord};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::AgentId;
use crate::error::LedgerError;
use crate::inference::Reply;
use crate::sim::{Action, BoardSnapshot};

/// One entry of a flattened reply history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub agent_id: AgentId,
    pub reply: Reply,
    pub command: Action,
}

/// History of every game played in a session
#[derive(Debug, Clone, Default)]
pub struct HistoryLedger {
    games: Vec<GameRecord>,
    game_open: bool,
    round_open: bool,
    turn_open: bool,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new game; returns its id
    pub fn start_game(&mut self, seed: u64, initial_state: BoardSnapshot) -> Result<u32, LedgerError> {
        if self.game_open {
            return Err(LedgerError::GameAlreadyActive);
        }
        let game_id = self.games.len() as u32 + 1;
        self.games.push(GameRecord {
            game_id,
            seed,
            start_time: Utc::now(),
            end_time: None,
            initial_state,
            final_state: None,
            winner: None,
            abandoned: false,
            rounds: Vec::new(),
        });
        self.game_open = true;
        Ok(game_id)
    }

    /// Open a round in the active game; returns its number
    pub fn start_round(
        &mut self,
        initial_state: BoardSnapshot,
        prompts: Vec<PromptRecord>,
        turn_order: Vec<AgentId>,
    ) -> Result<u32, LedgerError> {
        if self.round_open {
            return Err(LedgerError::RoundAlreadyActive);
        }
        let game = self.open_game_mut()?;
        let round_number = game.rounds.len() as u32 + 1;
        game.rounds.push(RoundRecord {
            round_number,
            start_time: Utc::now(),
            end_time: None,
            initial_state,
            prompts,
            turn_order,
            turns: Vec::new(),
        });
        self.round_open = true;
        Ok(round_number)
    }

    /// Open a turn in the active round; returns its number
    pub fn start_turn(&mut self, pre_state: BoardSnapshot) -> Result<u32, LedgerError> {
        if self.turn_open {
            return Err(LedgerError::TurnAlreadyActive);
        }
        let round = self.open_round_mut()?;
        let turn_number = round.turns.len() as u32 + 1;
        round.turns.push(TurnRecord {
            turn_number,
            start_time: Utc::now(),
            end_time: None,
            pre_state,
            plays: Vec::new(),
            post_state: None,
        });
        self.turn_open = true;
        Ok(turn_number)
    }

    /// Append a play to the active turn
    pub fn record_play(&mut self, play: Play) -> Result<(), LedgerError> {
        let turn = self.open_turn_mut()?;
        turn.plays.push(play);
        Ok(())
    }

    /// Close the active turn with its post-state
    pub fn end_turn(&mut self, post_state: BoardSnapshot) -> Result<(), LedgerError> {
        let turn = self.open_turn_mut()?;
        turn.post_state = Some(post_state);
        turn.end_time = Some(Utc::now());
        self.turn_open = false;
        Ok(())
    }

    /// Close the active round; its last turn must already be closed
    pub fn end_round(&mut self) -> Result<(), LedgerError> {
        if self.turn_open {
            return Err(LedgerError::TurnStillOpen);
        }
        let round = self.open_round_mut()?;
        round.end_time = Some(Utc::now());
        self.round_open = false;
        Ok(())
    }

    /// Close the active game; the winner is the bot with the most health
    pub fn end_game(&mut self, final_state: BoardSnapshot) -> Result<Option<AgentId>, LedgerError> {
        if self.round_open {
            return Err(LedgerError::RoundStillOpen);
        }
        let game = self.open_game_mut()?;
        let winner = final_state.leader();
        game.winner = winner;
        game.final_state = Some(final_state);
        game.end_time = Some(Utc::now());
        self.game_open = false;
        Ok(winner)
    }

    /// Close whatever is open in the active game without declaring a winner
    pub fn abandon_game(&mut self, final_state: BoardSnapshot) -> Result<(), LedgerError> {
        if !self.game_open {
            return Err(LedgerError::NoActiveGame);
        }
        let now = Utc::now();
        let (turn_open, round_open) = (self.turn_open, self.round_open);
        let game = self.open_game_mut()?;
        if let Some(round) = game.rounds.last_mut().filter(|_| round_open) {
            if let Some(turn) = round.turns.last_mut().filter(|_| turn_open) {
                turn.post_state = Some(final_state.clone());
                turn.end_time = Some(now);
            }
            round.end_time = Some(now);
        }
        game.final_state = Some(final_state);
        game.end_time = Some(now);
        game.abandoned = true;

        self.turn_open = false;
        self.round_open = false;
        self.game_open = false;
        Ok(())
    }

    /// Replace the active game's initial state while it has no rounds yet
    pub fn restate_initial(&mut self, initial_state: BoardSnapshot) -> Result<(), LedgerError> {
        let game = self.open_game_mut()?;
        if !game.rounds.is_empty() {
            return Err(LedgerError::InitialStateFixed);
        }
        game.initial_state = initial_state;
        Ok(())
    }

    /// Every prompt `agent_id` submitted, oldest first, across all games
    pub fn prompt_history(&self, agent_id: AgentId) -> Vec<&str> {
        self.games
            .iter()
            .flat_map(|game| &game.rounds)
            .filter_map(|round| round.prompt_for(agent_id))
            .collect()
    }

    /// Full nested history of one game
    pub fn reconstruct_game_history(&self, game_id: u32) -> Result<GameRecord, LedgerError> {
        self.games
            .iter()
            .find(|g| g.game_id == game_id)
            .cloned()
            .ok_or(LedgerError::UnknownGame(game_id))
    }

    pub fn games(&self) -> &[GameRecord] {
        &self.games
    }

    pub fn current_game(&self) -> Option<&GameRecord> {
        self.games.last().filter(|_| self.game_open)
    }

    pub fn current_round(&self) -> Option<&RoundRecord> {
        self.current_game()?.rounds.last().filter(|_| self.round_open)
    }

    pub fn current_turn(&self) -> Option<&TurnRecord> {
        self.current_round()?.turns.last().filter(|_| self.turn_open)
    }

    /// Replies of the active game in order; `shared = false` keeps only `agent_id`'s
    pub fn chat_history(&self, agent_id: AgentId, shared: bool) -> Vec<ChatEntry> {
        let Some(game) = self.current_game() else {
            return Vec::new();
        };
        game.plays()
            .filter(|(_, _, play)| shared || play.agent_id == agent_id)
            .map(|(_, _, play)| ChatEntry {
                agent_id: play.agent_id,
                reply: play.reply.clone(),
                command: play.command,
            })
            .collect()
    }

    fn open_game_mut(&mut self) -> Result<&mut GameRecord, LedgerError> {
        if !self.game_open {
            return Err(LedgerError::NoActiveGame);
        }
        self.games.last_mut().ok_or(LedgerError::NoActiveGame)
    }

    fn open_round_mut(&mut self) -> Result<&mut RoundRecord, LedgerError> {
        if !self.round_open {
            return Err(if self.game_open {
                LedgerError::NoActiveRound
            } else {
                LedgerError::NoActiveGame
            });
        }
        self.open_game_mut()?
            .rounds
            .last_mut()
            .ok_or(LedgerError::NoActiveRound)
    }

    fn open_turn_mut(&mut self) -> Result<&mut TurnRecord, LedgerError> {
        if !self.turn_open {
            return Err(LedgerError::NoActiveTurn);
        }
        self.open_round_mut()?
            .turns
            .last_mut()
            .ok_or(LedgerError::NoActiveTurn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{AgentSnapshot, parse};

    fn snapshot(health_1: u32, health_2: u32) -> BoardSnapshot {
        let agent = |id, health| AgentSnapshot {
            id,
            x: 0.5,
            y: 0.5,
            rotation: 0.0,
            health,
            shield_up: false,
        };
        BoardSnapshot {
            agents: vec![agent(1, health_1), agent(2, health_2)],
        }
    }

    fn prompts() -> Vec<PromptRecord> {
        vec![
            PromptRecord { agent_id: 1, prompt: "shoot".into() },
            PromptRecord { agent_id: 2, prompt: "hide".into() },
        ]
    }

    #[test]
    fn test_full_game_nesting() {
        let mut ledger = HistoryLedger::new();
        let game_id = ledger.start_game(7, snapshot(20, 20)).unwrap();
        assert_eq!(ledger.start_round(snapshot(20, 20), prompts(), vec![2, 1]).unwrap(), 1);
        assert_eq!(ledger.start_turn(snapshot(20, 20)).unwrap(), 1);
        ledger
            .record_play(Play::new(2, Reply::Text("S1".into()), parse("S1")))
            .unwrap();
        ledger
            .record_play(Play::new(1, Reply::Text("B".into()), parse("B")))
            .unwrap();
        ledger.end_turn(snapshot(20, 17)).unwrap();
        ledger.end_round().unwrap();
        assert_eq!(ledger.end_game(snapshot(20, 17)).unwrap(), Some(1));

        let game = ledger.reconstruct_game_history(game_id).unwrap();
        assert_eq!(game.seed, 7);
        assert_eq!(game.winner, Some(1));
        assert_eq!(game.rounds.len(), 1);
        assert_eq!(game.rounds[0].turn_order, vec![2, 1]);
        assert_eq!(game.rounds[0].prompt_for(2), Some("hide"));
        let turn = &game.rounds[0].turns[0];
        assert_eq!(turn.plays.len(), 2);
        assert_eq!(turn.post_state, Some(snapshot(20, 17)));
        assert!(game.is_finished());
        assert!(ledger.current_game().is_none());
    }

    #[test]
    fn test_usage_errors_are_reported() {
        let mut ledger = HistoryLedger::new();
        assert_eq!(ledger.end_turn(snapshot(1, 1)), Err(LedgerError::NoActiveTurn));
        assert_eq!(ledger.end_round(), Err(LedgerError::NoActiveGame));
        assert_eq!(ledger.end_game(snapshot(1, 1)), Err(LedgerError::NoActiveGame));
        assert_eq!(
            ledger.start_round(snapshot(1, 1), prompts(), vec![1, 2]),
            Err(LedgerError::NoActiveGame)
        );
        assert_eq!(ledger.start_turn(snapshot(1, 1)), Err(LedgerError::NoActiveGame));

        ledger.start_game(1, snapshot(1, 1)).unwrap();
        assert_eq!(ledger.start_game(1, snapshot(1, 1)), Err(LedgerError::GameAlreadyActive));
        assert_eq!(ledger.start_turn(snapshot(1, 1)), Err(LedgerError::NoActiveRound));
        assert_eq!(ledger.end_round(), Err(LedgerError::NoActiveRound));
        assert_eq!(
            ledger.record_play(Play::new(1, Reply::Text("M".into()), parse("M"))),
            Err(LedgerError::NoActiveTurn)
        );

        ledger.start_round(snapshot(1, 1), prompts(), vec![1, 2]).unwrap();
        assert_eq!(
            ledger.start_round(snapshot(1, 1), prompts(), vec![1, 2]),
            Err(LedgerError::RoundAlreadyActive)
        );
        assert_eq!(ledger.end_game(snapshot(1, 1)), Err(LedgerError::RoundStillOpen));

        ledger.start_turn(snapshot(1, 1)).unwrap();
        assert_eq!(ledger.start_turn(snapshot(1, 1)), Err(LedgerError::TurnAlreadyActive));
        assert_eq!(ledger.end_round(), Err(LedgerError::TurnStillOpen));
        ledger.end_turn(snapshot(1, 1)).unwrap();
        assert_eq!(ledger.end_turn(snapshot(1, 1)), Err(LedgerError::NoActiveTurn));
    }

    #[test]
    fn test_tie_has_no_winner() {
        let mut ledger = HistoryLedger::new();
        ledger.start_game(1, snapshot(20, 20)).unwrap();
        assert_eq!(ledger.end_game(snapshot(11, 11)).unwrap(), None);
        ledger.start_game(2, snapshot(20, 20)).unwrap();
        assert_eq!(ledger.end_game(snapshot(0, 0)).unwrap(), None);
    }

    #[test]
    fn test_restate_initial_only_before_rounds() {
        let mut ledger = HistoryLedger::new();
        assert_eq!(ledger.restate_initial(snapshot(1, 1)), Err(LedgerError::NoActiveGame));

        ledger.start_game(1, snapshot(20, 20)).unwrap();
        ledger.restate_initial(snapshot(20, 19)).unwrap();
        assert_eq!(ledger.current_game().unwrap().initial_state, snapshot(20, 19));

        ledger.start_round(snapshot(20, 19), prompts(), vec![1, 2]).unwrap();
        assert_eq!(ledger.restate_initial(snapshot(5, 5)), Err(LedgerError::InitialStateFixed));
        assert_eq!(ledger.current_game().unwrap().initial_state, snapshot(20, 19));
    }

    #[test]
    fn test_prompt_history_spans_games() {
        let mut ledger = HistoryLedger::new();
        ledger.start_game(1, snapshot(20, 20)).unwrap();
        ledger.start_round(snapshot(20, 20), prompts(), vec![1, 2]).unwrap();
        ledger.end_round().unwrap();
        let second = vec![
            PromptRecord { agent_id: 1, prompt: "circle left".into() },
            PromptRecord { agent_id: 2, prompt: "hide".into() },
        ];
        ledger.start_round(snapshot(20, 20), second, vec![2, 1]).unwrap();
        ledger.end_round().unwrap();
        ledger.end_game(snapshot(20, 20)).unwrap();

        ledger.start_game(2, snapshot(20, 20)).unwrap();
        ledger.start_round(snapshot(20, 20), prompts(), vec![1, 2]).unwrap();

        assert_eq!(ledger.prompt_history(1), vec!["shoot", "circle left", "shoot"]);
        assert_eq!(ledger.prompt_history(2), vec!["hide", "hide", "hide"]);
        assert!(ledger.prompt_history(9).is_empty());
    }

    #[test]
    fn test_unknown_game() {
        let ledger = HistoryLedger::new();
        assert_eq!(ledger.reconstruct_game_history(3), Err(LedgerError::UnknownGame(3)));
    }

    #[test]
    fn test_abandon_closes_open_records() {
        let mut ledger = HistoryLedger::new();
        ledger.start_game(1, snapshot(20, 20)).unwrap();
        ledger.start_round(snapshot(20, 20), prompts(), vec![1, 2]).unwrap();
        ledger.start_turn(snapshot(20, 20)).unwrap();
        ledger.abandon_game(snapshot(20, 14)).unwrap();

        let game = &ledger.games()[0];
        assert!(game.abandoned);
        assert_eq!(game.winner, None);
        assert!(game.rounds[0].end_time.is_some());
        assert_eq!(game.rounds[0].turns[0].post_state, Some(snapshot(20, 14)));
        assert_eq!(ledger.abandon_game(snapshot(1, 1)), Err(LedgerError::NoActiveGame));

        // A fresh game can follow
        assert_eq!(ledger.start_game(2, snapshot(20, 20)).unwrap(), 2);
    }

    #[test]
    fn test_chat_history_filtering() {
        let mut ledger = HistoryLedger::new();
        ledger.start_game(1, snapshot(20, 20)).unwrap();
        ledger.start_round(snapshot(20, 20), prompts(), vec![1, 2]).unwrap();
        ledger.start_turn(snapshot(20, 20)).unwrap();
        ledger
            .record_play(Play::new(1, Reply::Text("M".into()), parse("M")))
            .unwrap();
        ledger
            .record_play(Play::new(2, Reply::unavailable("timed out"), Action::Invalid))
            .unwrap();

        assert_eq!(ledger.chat_history(1, true).len(), 2);
        let own = ledger.chat_history(2, false);
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].command, Action::Invalid);
        assert!(own[0].reply.is_unavailable());
        assert_eq!(ledger.current_turn().unwrap().plays.len(), 2);
    }
}
