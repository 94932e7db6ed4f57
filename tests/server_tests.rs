//! Server tests - the line protocol over real TCP connections.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use memory_scramble::core::{Board, BoardFile};
use memory_scramble::net::protocol::{Request, Response};
use memory_scramble::net::{run_server, ServerConfig};
use tokio::sync::oneshot;

struct TestServer {
    addr: std::net::SocketAddr,
    board: Arc<Board>,
    _runtime: tokio::runtime::Runtime,
}

fn start_server() -> TestServer {
    let board = Arc::new(Board::new(BoardFile::parse("2x2\nA\nB\nA\nB").unwrap()));
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        board_path: String::new(),
        reset_interval_secs: 0,
        keep_alive_interval_secs: 0,
    };

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (ready_tx, ready_rx) = oneshot::channel();
    let server_board = Arc::clone(&board);
    runtime.spawn(async move {
        let _ = run_server(config, server_board, Some(ready_tx)).await;
    });
    let addr = runtime.block_on(async {
        tokio::time::timeout(Duration::from_secs(2), ready_rx)
            .await
            .expect("server did not come up")
            .expect("server dropped the ready channel")
    });

    TestServer {
        addr,
        board,
        _runtime: runtime,
    }
}

struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    fn connect(server: &TestServer) -> Self {
        let stream = TcpStream::connect(server.addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let writer = stream.try_clone().unwrap();
        Self {
            reader: BufReader::new(stream),
            writer,
        }
    }

    fn send_line(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).unwrap();
        self.writer.write_all(b"\n").unwrap();
        self.writer.flush().unwrap();
    }

    fn recv(&mut self) -> Response {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        serde_json::from_str(line.trim()).unwrap()
    }

    fn request(&mut self, request: &Request) -> Response {
        self.send_line(&serde_json::to_string(request).unwrap());
        self.recv()
    }

    fn look(&mut self, player: &str) -> String {
        match self.request(&Request::Look {
            player: player.to_string(),
        }) {
            Response::Board { board } => board,
            other => panic!("expected board, got {:?}", other),
        }
    }
}

fn flip(player: &str, row: usize, column: usize) -> Request {
    Request::Flip {
        player: player.to_string(),
        row,
        column,
    }
}

#[test]
fn ping_answers_pong() {
    let server = start_server();
    let mut client = Client::connect(&server);
    assert_eq!(client.request(&Request::Ping), Response::Pong);
}

#[test]
fn look_shows_a_fresh_board_face_down() {
    let server = start_server();
    let mut client = Client::connect(&server);
    assert_eq!(client.look("p1"), "2x2\ndown\ndown\ndown\ndown");
}

#[test]
fn flip_returns_the_flippers_view_and_other_players_see_up() {
    let server = start_server();
    let mut p1 = Client::connect(&server);
    let mut p2 = Client::connect(&server);

    let response = p1.request(&flip("p1", 0, 0));
    assert_eq!(
        response,
        Response::Board {
            board: "2x2\nmy A\ndown\ndown\ndown".to_string()
        }
    );
    assert_eq!(p2.look("p2"), "2x2\nup A\ndown\ndown\ndown");
}

#[test]
fn out_of_grid_coordinates_are_rejected_before_the_engine() {
    let server = start_server();
    let mut client = Client::connect(&server);

    for (row, column) in [(2, 0), (0, 2), (9, 9)] {
        match client.request(&flip("p1", row, column)) {
            Response::Error { code, .. } => assert_eq!(code, "invalid_address"),
            other => panic!("expected error, got {:?}", other),
        }
    }
    // Nothing was flipped.
    assert_eq!(client.look("p1"), "2x2\ndown\ndown\ndown\ndown");
}

#[test]
fn restricted_second_flip_surfaces_and_releases_the_first_card() {
    let server = start_server();
    let mut p1 = Client::connect(&server);
    let mut p2 = Client::connect(&server);

    p2.request(&flip("p2", 0, 1));
    p1.request(&flip("p1", 0, 0));

    match p1.request(&flip("p1", 0, 1)) {
        Response::Error { code, .. } => assert_eq!(code, "restricted_access"),
        other => panic!("expected error, got {:?}", other),
    }
    // p1's first card came back up for everyone.
    assert_eq!(p1.look("p1"), "2x2\nup A\nup B\ndown\ndown");
}

#[test]
fn replace_rewrites_values_for_everyone() {
    let server = start_server();
    let mut client = Client::connect(&server);
    client.request(&flip("p1", 0, 0));

    let response = client.request(&Request::Replace {
        player: "p1".to_string(),
        from: "A".to_string(),
        to: "X".to_string(),
    });
    assert_eq!(
        response,
        Response::Board {
            board: "2x2\nmy X\ndown\ndown\ndown".to_string()
        }
    );
    assert_eq!(server.board.card(2).value, "X");
}

#[test]
fn watch_blocks_until_another_client_moves() {
    let server = start_server();
    let mut watcher = Client::connect(&server);
    let mut player = Client::connect(&server);

    watcher.send_line(r#"{"type":"watch","player":"obs"}"#);
    // Give the watch time to park before the change arrives.
    std::thread::sleep(Duration::from_millis(100));

    player.request(&flip("p1", 0, 0));

    match watcher.recv() {
        Response::Board { board } => assert_eq!(board, "2x2\nup A\ndown\ndown\ndown"),
        other => panic!("expected board, got {:?}", other),
    }
}

#[test]
fn malformed_requests_do_not_kill_the_connection() {
    let server = start_server();
    let mut client = Client::connect(&server);

    client.send_line("this is not json");
    match client.recv() {
        Response::Error { code, .. } => assert_eq!(code, "invalid_request"),
        other => panic!("expected error, got {:?}", other),
    }

    client.send_line(r#"{"type":"dance"}"#);
    match client.recv() {
        Response::Error { code, .. } => assert_eq!(code, "invalid_request"),
        other => panic!("expected error, got {:?}", other),
    }

    // The connection is still usable.
    assert_eq!(client.request(&Request::Ping), Response::Pong);
}

#[test]
fn blank_player_ids_are_rejected() {
    let server = start_server();
    let mut client = Client::connect(&server);

    match client.request(&Request::Look {
        player: "  ".to_string(),
    }) {
        Response::Error { code, .. } => assert_eq!(code, "invalid_request"),
        other => panic!("expected error, got {:?}", other),
    }
}
