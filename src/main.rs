//! BatLLM Arena headless runner
//!
//! Plays one seeded game between two bots whose "language model" picks
//! random commands, then prints the recorded history.
//!
//! Usage: `batllm-arena [settings.toml] [seed]`

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use rand_pcg::Pcg32;

use batllm_arena::sim::RngState;
use batllm_arena::{Inference, InferenceError, InferenceRequest, Orchestrator, Phase, Settings, persistence};

/// Stand-in inference service: seeded random commands, some of them malformed
///
/// Each reply depends only on the seed and the request's place in the game,
/// so concurrent requests cannot change the outcome.
struct RandomCommander {
    seed: u64,
}

impl RandomCommander {
    fn rng_for(&self, request: &InferenceRequest) -> Pcg32 {
        let ctx = &request.context;
        let salt = (u64::from(ctx.round_info.current_round) << 32)
            | (u64::from(ctx.turn_info.current_turn) << 8)
            | u64::from(request.agent_id);
        RngState::new(self.seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15)).to_rng()
    }
}

#[async_trait]
impl Inference for RandomCommander {
    async fn submit(&self, request: InferenceRequest) -> Result<String, InferenceError> {
        let mut rng = self.rng_for(&request);
        let reply = match rng.random_range(0..10) {
            0 | 1 => "M".to_string(),
            2 => format!("C{}", rng.random_range(5..=90)),
            3 => format!("A{}", rng.random_range(5..=90)),
            4..=6 => "B".to_string(),
            7 => "S".to_string(),
            8 => (if rng.random_bool(0.5) { "S1" } else { "S0" }).to_string(),
            _ => "I think I should shoot now".to_string(),
        };
        Ok(reply)
    }
}

fn parse_args() -> Result<(Settings, u64), Box<dyn std::error::Error>> {
    let mut settings = None;
    let mut seed = None;
    for arg in std::env::args().skip(1) {
        match arg.parse::<u64>() {
            Ok(value) => seed = Some(value),
            Err(_) => settings = Some(Settings::load(&arg)?),
        }
    }
    let seed = seed.unwrap_or_else(|| chrono::Utc::now().timestamp_millis() as u64);
    Ok((settings.unwrap_or_default(), seed))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (settings, seed) = parse_args()?;
    log::info!(
        "{} rounds x {} turns, seed {}",
        settings.total_rounds,
        settings.turns_per_round,
        seed
    );

    let commander = Arc::new(RandomCommander { seed });
    let mut orchestrator = Orchestrator::new(settings, commander, seed)?;

    while orchestrator.phase() != Phase::GameOver {
        orchestrator.submit_prompt(1, "Hunt the other bot down and shoot it.")?;
        orchestrator.submit_prompt(2, "Keep your shield towards the enemy, shoot when it drops.")?;
        let outcome = orchestrator.play_round().await?;
        log::info!(
            "Round {} done after {} turns: {:?}",
            outcome.round,
            outcome.turns_played,
            outcome
                .final_state
                .agents
                .iter()
                .map(|a| (a.id, a.health))
                .collect::<Vec<_>>()
        );
        for event in orchestrator.drain_events() {
            log::trace!("{:?}", event);
        }
    }

    let games = orchestrator.ledger().games();
    println!("{}", persistence::to_json(games)?);
    println!();
    println!("{}", persistence::to_compact_text(games));
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();
    log::info!("BatLLM Arena (headless) starting...");

    if let Err(err) = run().await {
        log::error!("{}", err);
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
