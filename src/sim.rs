//! Simulation mode - synthetic players hammering a shared board.
//!
//! Each player runs on its own thread and plays rounds of two random flips
//! with random think-time in between. Restricted-access and removed-card
//! failures are normal outcomes under contention and are only logged.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::core::Board;
use crate::types::GameError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    pub board_path: String,
    pub players: usize,
    pub tries: usize,
    pub max_delay_ms: u64,
    pub seed: u64,
    /// Overall wall-clock limit; players still parked in a flip when it
    /// expires are cancelled so the run always terminates.
    pub timeout_secs: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            board_path: "board.txt".to_string(),
            players: 4,
            tries: 10,
            max_delay_ms: 100,
            seed: 0,
            timeout_secs: 120,
        }
    }
}

pub fn parse_sim_args(args: &[String]) -> Result<Option<SimConfig>> {
    if args.is_empty() || args[0] != "sim" {
        return Ok(None);
    }

    let mut config = SimConfig::default();
    let mut i = 1usize;
    while i < args.len() {
        let flag = args[i].as_str();
        i += 1;
        let value = args
            .get(i)
            .ok_or_else(|| anyhow!("sim: missing value for {}", flag))?;
        match flag {
            "--board" => config.board_path = value.clone(),
            "--players" => {
                config.players = value
                    .parse()
                    .map_err(|_| anyhow!("sim: invalid --players value: {}", value))?;
            }
            "--tries" => {
                config.tries = value
                    .parse()
                    .map_err(|_| anyhow!("sim: invalid --tries value: {}", value))?;
            }
            "--max-delay-ms" => {
                config.max_delay_ms = value
                    .parse()
                    .map_err(|_| anyhow!("sim: invalid --max-delay-ms value: {}", value))?;
            }
            "--seed" => {
                config.seed = value
                    .parse()
                    .map_err(|_| anyhow!("sim: invalid --seed value: {}", value))?;
            }
            "--timeout-secs" => {
                config.timeout_secs = value
                    .parse()
                    .map_err(|_| anyhow!("sim: invalid --timeout-secs value: {}", value))?;
            }
            other => return Err(anyhow!("sim: unknown argument: {}", other)),
        }
        i += 1;
    }
    Ok(Some(config))
}

/// Run the simulation to completion, joining every player thread.
pub fn run_simulation(board: Arc<Board>, config: &SimConfig) {
    println!(
        "[sim] starting: {} players, {} tries each, board {}x{}",
        config.players,
        config.tries,
        board.rows(),
        board.columns()
    );

    let (done_tx, done_rx) = mpsc::channel::<()>();
    let mut handles = Vec::with_capacity(config.players);
    for i in 0..config.players {
        let board = Arc::clone(&board);
        let player = format!("P{}", i);
        let tries = config.tries;
        let max_delay_ms = config.max_delay_ms;
        let rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(i as u64));
        let done = done_tx.clone();
        handles.push(thread::spawn(move || {
            simulate_player(&board, &player, tries, max_delay_ms, rng);
            let _ = done.send(());
        }));
    }
    drop(done_tx);

    // A player that ends its rounds while controlling a card can leave
    // another player parked in a first flip forever; bound the whole run
    // and cancel stragglers past the deadline.
    let deadline = Instant::now() + Duration::from_secs(config.timeout_secs);
    let mut finished = 0usize;
    while finished < config.players {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        match done_rx.recv_timeout(deadline - now) {
            Ok(()) => finished += 1,
            Err(_) => break,
        }
    }
    if finished < config.players {
        println!(
            "[sim] timed out with {} of {} players finished, cancelling waiters",
            finished, config.players
        );
        board.shutdown();
    }

    for handle in handles {
        let _ = handle.join();
    }
    println!("[sim] finished");
}

fn simulate_player(
    board: &Board,
    player: &str,
    tries: usize,
    max_delay_ms: u64,
    mut rng: ChaCha8Rng,
) {
    println!("[sim] {} joined the game", player);
    let deck = board.rows() * board.columns();

    for _ in 0..tries {
        // One round: a first and a second flip at random positions.
        for _ in 0..2 {
            random_delay(&mut rng, max_delay_ms);
            let index = rng.gen_range(0..deck);
            println!("[sim] {} flips card {}", player, index);
            match board.flip(player, index) {
                Ok(()) => {}
                Err(GameError::RestrictedAccess) => {
                    println!("[sim] {} was denied card {}", player, index);
                }
                Err(GameError::CardRemoved) => {
                    println!("[sim] {} found card {} already gone", player, index);
                }
                Err(e) => {
                    eprintln!("[sim] {} stopped: {}", player, e);
                    return;
                }
            }
        }
    }

    println!("[sim] {} finished playing", player);
}

fn random_delay(rng: &mut ChaCha8Rng, max_delay_ms: u64) {
    if max_delay_ms == 0 {
        return;
    }
    let micros = rng.gen_range(100..=max_delay_ms.saturating_mul(1000));
    thread::sleep(Duration::from_micros(micros));
}
