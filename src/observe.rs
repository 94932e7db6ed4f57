//! Observer mode - follow a running server and print each board change.
//!
//! Connects over TCP, prints the initial snapshot, then loops on `watch`:
//! the server replies with a fresh snapshot every time the board moves.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

use anyhow::{anyhow, Result};

use crate::net::protocol::{Request, Response};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveConfig {
    pub host: String,
    pub port: u16,
    pub player: String,
}

pub fn parse_observe_args(args: &[String]) -> Result<Option<ObserveConfig>> {
    if args.is_empty() || args[0] != "observe" {
        return Ok(None);
    }

    let mut host = String::from("127.0.0.1");
    let mut port: u16 = 8080;
    let mut player = String::from("observer");
    let mut i = 1usize;
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| anyhow!("observe: missing value for --host"))?;
                host = v.clone();
            }
            "--port" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| anyhow!("observe: missing value for --port"))?;
                port = v
                    .parse::<u16>()
                    .map_err(|_| anyhow!("observe: invalid --port value: {}", v))?;
            }
            "--player" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| anyhow!("observe: missing value for --player"))?;
                player = v.clone();
            }
            other => {
                return Err(anyhow!("observe: unknown argument: {}", other));
            }
        }
        i += 1;
    }

    Ok(Some(ObserveConfig { host, port, player }))
}

pub fn run_observe(config: &ObserveConfig) -> Result<()> {
    let stream = TcpStream::connect((config.host.as_str(), config.port)).map_err(|e| {
        anyhow!(
            "observe: connect {}:{} failed: {}",
            config.host,
            config.port,
            e
        )
    })?;
    stream
        .set_nodelay(true)
        .map_err(|e| anyhow!("observe: set_nodelay failed: {}", e))?;
    let mut conn = Connection::new(stream)?;

    println!("[observe] watching as {} on {}:{}", config.player, config.host, config.port);

    let look = Request::Look {
        player: config.player.clone(),
    };
    print_board(&expect_board(conn.request(&look)?)?);

    let watch = Request::Watch {
        player: config.player.clone(),
    };
    loop {
        match conn.request(&watch)? {
            Response::Board { board } => print_board(&board),
            Response::Error { code, message } if code == "cancelled" => {
                println!("[observe] server shut down: {}", message);
                return Ok(());
            }
            Response::Error { code, message } => {
                return Err(anyhow!("observe: server error {} {}", code, message));
            }
            Response::Pong => {
                return Err(anyhow!("observe: unexpected pong"));
            }
        }
    }
}

struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Connection {
    fn new(stream: TcpStream) -> Result<Self> {
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }

    fn request(&mut self, request: &Request) -> Result<Response> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;

        let mut reply = String::new();
        if self.reader.read_line(&mut reply)? == 0 {
            return Err(anyhow!("observe: connection closed"));
        }
        Ok(serde_json::from_str(reply.trim())?)
    }
}

fn expect_board(response: Response) -> Result<String> {
    match response {
        Response::Board { board } => Ok(board),
        other => Err(anyhow!("observe: expected board snapshot, got {:?}", other)),
    }
}

fn print_board(board: &str) {
    println!("{}", board);
    println!("--------");
}
