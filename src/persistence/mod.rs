//! Serialization of recorded history
//!
//! Produces strings only; writing them somewhere is the caller's business.
//! - Pretty JSON of whole games (loads back with `from_json`)
//! - Compact one-line-per-play text for display

use crate::AgentId;
use crate::inference::Reply;
use crate::ledger::{GameRecord, Play, RoundRecord};
use crate::sim::{BoardSnapshot, ShotOutcome};

/// Pretty JSON of the given games
pub fn to_json(games: &[GameRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(games)
}

/// Load games written by `to_json`
pub fn from_json(text: &str) -> Result<Vec<GameRecord>, serde_json::Error> {
    serde_json::from_str(text)
}

/// Compact summary of every play
pub fn to_compact_text(games: &[GameRecord]) -> String {
    compact(games, None)
}

/// Compact summary restricted to one bot's plays
pub fn to_compact_text_for_agent(games: &[GameRecord], agent_id: AgentId) -> String {
    compact(games, Some(agent_id))
}

fn compact(games: &[GameRecord], only: Option<AgentId>) -> String {
    let mut lines = Vec::new();
    for game in games {
        let g = game.game_id;
        lines.push(format!("G{} seed {}", g, game.seed));
        for round in &game.rounds {
            let r = round.round_number;
            lines.push(format!("G{} R{} order {}", g, r, format_order(&round.turn_order)));
            for turn in &round.turns {
                for play in turn.plays.iter().filter(|p| only.is_none_or(|id| p.agent_id == id)) {
                    lines.push(format!("G{} R{} T{} {}", g, r, turn.turn_number, format_play(play)));
                }
            }
            if let Some(state) = round_end_state(round) {
                lines.push(format!("G{} R{} health {}", g, r, format_health(state)));
            }
        }
        lines.push(format!("G{} {}", g, format_result(game)));
    }
    lines.join("\n")
}

fn format_order(order: &[AgentId]) -> String {
    order
        .iter()
        .map(|id| format!("bot{}", id))
        .collect::<Vec<_>>()
        .join(" > ")
}

fn format_play(play: &Play) -> String {
    let raw = match &play.reply {
        Reply::Text(text) => format!("raw {:?}", text),
        Reply::Unavailable { reason } => format!("no reply: {}", reason),
    };
    let mut line = format!("bot{}: {} ({})", play.agent_id, play.command, raw);
    if play.skipped {
        line.push_str(" skipped");
    }
    if let Some(shot) = &play.shot {
        let result = match shot.outcome {
            ShotOutcome::Hit { target, damage } => format!("hit bot{} -{}", target, damage),
            ShotOutcome::Blocked { target } => format!("blocked by bot{}", target),
            ShotOutcome::OutOfBounds => "missed".to_string(),
            ShotOutcome::NotFired => "shield up, not fired".to_string(),
        };
        line.push_str(&format!(" -> {}", result));
    }
    line
}

fn round_end_state(round: &RoundRecord) -> Option<&BoardSnapshot> {
    round.turns.last()?.post_state.as_ref()
}

fn format_health(state: &BoardSnapshot) -> String {
    state
        .agents
        .iter()
        .map(|a| format!("bot{} {}", a.id, a.health))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_result(game: &GameRecord) -> String {
    if game.abandoned {
        "abandoned".to_string()
    } else if !game.is_finished() {
        "in progress".to_string()
    } else {
        match game.winner {
            Some(id) => format!("winner bot{}", id),
            None => "draw".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{HistoryLedger, PromptRecord};
    use crate::sim::{AgentSnapshot, ShotRecord, parse};

    fn snapshot(health_2: u32) -> BoardSnapshot {
        let agent = |id, health| AgentSnapshot {
            id,
            x: 0.5,
            y: 0.5,
            rotation: 90.0,
            health,
            shield_up: false,
        };
        BoardSnapshot {
            agents: vec![agent(1, 20), agent(2, health_2)],
        }
    }

    fn recorded_game() -> Vec<GameRecord> {
        let mut ledger = HistoryLedger::new();
        ledger.start_game(5, snapshot(20)).unwrap();
        let prompts = vec![
            PromptRecord { agent_id: 1, prompt: "shoot".into() },
            PromptRecord { agent_id: 2, prompt: "spin".into() },
        ];
        ledger.start_round(snapshot(20), prompts, vec![1, 2]).unwrap();
        ledger.start_turn(snapshot(20)).unwrap();

        let mut shot = Play::new(1, Reply::Text("B".into()), parse("B"));
        shot.shot = Some(ShotRecord {
            outcome: ShotOutcome::Hit { target: 2, damage: 3 },
            steps: 55,
        });
        ledger.record_play(shot).unwrap();
        ledger
            .record_play(Play::new(2, Reply::unavailable("no reply within 55s"), parse("")))
            .unwrap();
        ledger.end_turn(snapshot(17)).unwrap();
        ledger.end_round().unwrap();
        ledger.end_game(snapshot(17)).unwrap();
        ledger.games().to_vec()
    }

    #[test]
    fn test_json_reloads() {
        let games = recorded_game();
        let text = to_json(&games).unwrap();
        assert_eq!(from_json(&text).unwrap(), games);
    }

    #[test]
    fn test_json_keeps_floats_exact() {
        let mut games = recorded_game();
        let agent = &mut games[0].initial_state.agents[0];
        agent.rotation = 9.796169971045705;
        agent.x = 0.1 + 0.2;
        agent.y = 0.737_373_737_373_737_3;
        let reloaded = from_json(&to_json(&games).unwrap()).unwrap();
        let back = &reloaded[0].initial_state.agents[0];
        assert_eq!(back.rotation.to_bits(), 9.796169971045705f64.to_bits());
        assert_eq!(back.x.to_bits(), (0.1f64 + 0.2).to_bits());
        assert_eq!(reloaded, games);
    }

    #[test]
    fn test_json_uses_command_labels() {
        let text = to_json(&recorded_game()).unwrap();
        assert!(text.contains("\"command\": \"B\""));
        assert!(text.contains("\"command\": \"ERR\""));
        assert!(text.contains("\"kind\": \"hit\""));
    }

    #[test]
    fn test_compact_text() {
        let text = to_compact_text(&recorded_game());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "G1 seed 5",
                "G1 R1 order bot1 > bot2",
                "G1 R1 T1 bot1: B (raw \"B\") -> hit bot2 -3",
                "G1 R1 T1 bot2: ERR (no reply: no reply within 55s)",
                "G1 R1 health bot1 20, bot2 17",
                "G1 winner bot1",
            ]
        );
    }

    #[test]
    fn test_compact_text_for_agent() {
        let text = to_compact_text_for_agent(&recorded_game(), 2);
        assert!(text.contains("bot2: ERR"));
        assert!(!text.contains("bot1: B"));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(from_json("{ not json").is_err());
    }
}
