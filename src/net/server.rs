//! TCP server for the game surface
//!
//! Handles incoming connections and dispatches requests to the board engine.
//! Uses tokio for the listener and per-client tasks; every engine call runs
//! on the blocking pool because `flip` and `watch` can park their thread, so
//! a waiting player never stalls the runtime. Requests on one connection are
//! serviced in order: a blocked `watch` blocks only its own connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use crate::core::Board;
use crate::net::protocol::{parse_request, Request, Response};
use crate::types::GameError;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub board_path: String,
    /// Seconds between automatic board resets; 0 disables.
    pub reset_interval_secs: u64,
    /// Seconds between self-addressed keep-alive pings; 0 disables.
    pub keep_alive_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            board_path: "board.txt".to_string(),
            reset_interval_secs: 300,
            keep_alive_interval_secs: 600,
        }
    }
}

impl ServerConfig {
    /// Create from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        use std::env;

        let defaults = Self::default();
        Self {
            host: env::var("MEMORY_HOST").unwrap_or(defaults.host),
            port: env::var("MEMORY_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            board_path: env::var("MEMORY_BOARD").unwrap_or(defaults.board_path),
            reset_interval_secs: env::var("MEMORY_RESET_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.reset_interval_secs),
            keep_alive_interval_secs: env::var("MEMORY_KEEPALIVE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.keep_alive_interval_secs),
        }
    }
}

/// Parse `serve` mode flags on top of the environment config.
pub fn parse_serve_args(args: &[String]) -> anyhow::Result<ServerConfig> {
    let mut config = ServerConfig::from_env();

    let mut i = 0usize;
    if args.first().map(String::as_str) == Some("serve") {
        i = 1;
    }
    while i < args.len() {
        let flag = args[i].as_str();
        i += 1;
        let value = args
            .get(i)
            .ok_or_else(|| anyhow!("serve: missing value for {}", flag))?;
        match flag {
            "--host" => config.host = value.clone(),
            "--port" => {
                config.port = value
                    .parse()
                    .map_err(|_| anyhow!("serve: invalid --port value: {}", value))?;
            }
            "--board" => config.board_path = value.clone(),
            "--reset-secs" => {
                config.reset_interval_secs = value
                    .parse()
                    .map_err(|_| anyhow!("serve: invalid --reset-secs value: {}", value))?;
            }
            "--keep-alive-secs" => {
                config.keep_alive_interval_secs = value
                    .parse()
                    .map_err(|_| anyhow!("serve: invalid --keep-alive-secs value: {}", value))?;
            }
            other => return Err(anyhow!("serve: unknown argument: {}", other)),
        }
        i += 1;
    }
    Ok(config)
}

/// Run the listener until it fails. `ready` receives the bound address once
/// the socket is up (tests bind port 0 and need the real port back).
pub async fn run_server(
    config: ServerConfig,
    board: Arc<Board>,
    ready: Option<oneshot::Sender<SocketAddr>>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;
    println!("[server] listening on {}", addr);
    if let Some(tx) = ready {
        let _ = tx.send(addr);
    }

    if config.reset_interval_secs > 0 {
        spawn_reset_loop(Arc::clone(&board), config.reset_interval_secs);
    }
    if config.keep_alive_interval_secs > 0 {
        spawn_keep_alive_loop(addr, config.keep_alive_interval_secs);
    }

    let mut client_id: u64 = 0;
    loop {
        let (socket, peer) = listener.accept().await?;
        client_id += 1;
        let id = client_id;
        println!("[server] client {} connected from {}", id, peer);

        let board = Arc::clone(&board);
        tokio::spawn(async move {
            if let Err(e) = handle_client(socket, board).await {
                eprintln!("[server] client {} error: {}", id, e);
            }
            println!("[server] client {} disconnected", id);
        });
    }
}

fn spawn_reset_loop(board: Arc<Board>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        // The first tick completes immediately; skip it so a fresh board is
        // not reset at startup.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let board = Arc::clone(&board);
            let _ = tokio::task::spawn_blocking(move || board.reset()).await;
            println!("[reset] board returned to initial face-down state");
        }
    });
}

fn spawn_keep_alive_loop(addr: SocketAddr, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match ping_once(addr).await {
                Ok(()) => println!("[alive] keep-alive ping ok"),
                Err(e) => eprintln!("[alive] keep-alive ping failed: {}", e),
            }
        }
    });
}

async fn ping_once(addr: SocketAddr) -> anyhow::Result<()> {
    let stream = TcpStream::connect(addr).await?;
    let (reader, mut writer) = tokio::io::split(stream);

    let mut line = serde_json::to_string(&Request::Ping)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;

    let mut reader = BufReader::new(reader);
    let mut reply = String::new();
    reader.read_line(&mut reply).await?;
    match serde_json::from_str::<Response>(reply.trim())? {
        Response::Pong => Ok(()),
        other => Err(anyhow!("unexpected ping reply: {:?}", other)),
    }
}

async fn handle_client(socket: TcpStream, board: Arc<Board>) -> anyhow::Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match parse_request(trimmed) {
            Ok(request) => dispatch(&board, request).await,
            Err(e) => Response::error("invalid_request", format!("invalid request: {}", e)),
        };

        let mut json = serde_json::to_string(&response)?;
        json.push('\n');
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

async fn dispatch(board: &Arc<Board>, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Look { player } => {
            if let Some(rejected) = reject_blank_player(&player) {
                return rejected;
            }
            let board = Arc::clone(board);
            run_engine(move || Ok(board.look(&player))).await
        }

        Request::Flip {
            player,
            row,
            column,
        } => {
            if let Some(rejected) = reject_blank_player(&player) {
                return rejected;
            }
            // Bounds are the facade's job; the engine only sees valid
            // linear indices.
            let Some(index) = board.index(row, column) else {
                return Response::from_game_error(&GameError::InvalidAddress);
            };
            let board = Arc::clone(board);
            run_engine(move || {
                board.flip(&player, index)?;
                Ok(board.look(&player))
            })
            .await
        }

        Request::Replace { player, from, to } => {
            if let Some(rejected) = reject_blank_player(&player) {
                return rejected;
            }
            let board = Arc::clone(board);
            run_engine(move || {
                board.replace(&from, &to);
                Ok(board.look(&player))
            })
            .await
        }

        Request::Watch { player } => {
            if let Some(rejected) = reject_blank_player(&player) {
                return rejected;
            }
            let board = Arc::clone(board);
            run_engine(move || {
                board.watch()?;
                Ok(board.look(&player))
            })
            .await
        }
    }
}

fn reject_blank_player(player: &str) -> Option<Response> {
    if player.trim().is_empty() {
        Some(Response::error("invalid_request", "player id must not be blank"))
    } else {
        None
    }
}

async fn run_engine<F>(f: F) -> Response
where
    F: FnOnce() -> Result<String, GameError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(view)) => Response::Board { board: view },
        Ok(Err(err)) => Response::from_game_error(&err),
        Err(join_err) => {
            // A panic inside the engine means a broken invariant, not a
            // recoverable request failure.
            eprintln!("[server] engine task panicked: {}", join_err);
            std::process::abort();
        }
    }
}
