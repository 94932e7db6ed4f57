//! Memory Scramble server binary.
//!
//! Modes:
//! - `serve` (default): load a board file and run the TCP game server
//! - `observe`: connect to a running server and print each board change
//! - `sim`: drive a local board with synthetic players

use std::sync::Arc;

use anyhow::Result;

use memory_scramble::core::Board;
use memory_scramble::net::{parse_serve_args, run_server, ServerConfig};
use memory_scramble::observe::{parse_observe_args, run_observe};
use memory_scramble::sim::{parse_sim_args, run_simulation};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if let Some(config) = parse_observe_args(&args)? {
        return run_observe(&config);
    }
    if let Some(config) = parse_sim_args(&args)? {
        let board = Arc::new(Board::load(&config.board_path)?);
        run_simulation(board, &config);
        return Ok(());
    }

    run_serve(parse_serve_args(&args)?)
}

fn run_serve(config: ServerConfig) -> Result<()> {
    let board = Arc::new(Board::load(&config.board_path)?);
    println!(
        "[server] loaded board {}x{} from {}",
        board.rows(),
        board.columns(),
        config.board_path
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        tokio::select! {
            result = run_server(config, Arc::clone(&board), None) => result,
            _ = tokio::signal::ctrl_c() => {
                println!("[server] shutting down");
                board.shutdown();
                Ok(())
            }
        }
    })
}
