//! Protocol module - JSON message types for the game server
//!
//! Line-delimited JSON: each request and each response is exactly one JSON
//! object followed by a newline. Messages are tagged with a `type` field.

use serde::{Deserialize, Serialize};

use crate::types::GameError;

/// Client -> server commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Player-scoped board snapshot.
    Look { player: String },
    /// Flip the card at `(row, column)`; may block while the card is held.
    Flip {
        player: String,
        row: usize,
        column: usize,
    },
    /// Rewrite every card valued `from` to `to`.
    Replace {
        player: String,
        from: String,
        to: String,
    },
    /// Block until the board changes, then return a snapshot.
    Watch { player: String },
    /// Health probe.
    Ping,
}

/// Server -> client replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Board { board: String },
    Pong,
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn from_game_error(err: &GameError) -> Self {
        Response::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

pub fn parse_request(line: &str) -> Result<Request, serde_json::Error> {
    serde_json::from_str(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_flip_request() {
        let line = r#"{"type":"flip","player":"p1","row":0,"column":1}"#;
        assert_eq!(
            parse_request(line).unwrap(),
            Request::Flip {
                player: "p1".to_string(),
                row: 0,
                column: 1
            }
        );
    }

    #[test]
    fn parses_look_watch_replace_and_ping() {
        assert_eq!(
            parse_request(r#"{"type":"look","player":"p1"}"#).unwrap(),
            Request::Look {
                player: "p1".to_string()
            }
        );
        assert_eq!(
            parse_request(r#"{"type":"watch","player":"p1"}"#).unwrap(),
            Request::Watch {
                player: "p1".to_string()
            }
        );
        assert_eq!(
            parse_request(r#"{"type":"replace","player":"p1","from":"A","to":"B"}"#).unwrap(),
            Request::Replace {
                player: "p1".to_string(),
                from: "A".to_string(),
                to: "B".to_string()
            }
        );
        assert_eq!(parse_request(r#"{"type":"ping"}"#).unwrap(), Request::Ping);
    }

    #[test]
    fn rejects_unknown_type_and_garbage() {
        assert!(parse_request(r#"{"type":"dance"}"#).is_err());
        assert!(parse_request("not json").is_err());
        assert!(parse_request(r#"{"type":"flip","player":"p1"}"#).is_err());
    }

    #[test]
    fn responses_serialize_with_a_type_tag() {
        let board = Response::Board {
            board: "1x1\ndown".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&board).unwrap(),
            r#"{"type":"board","board":"1x1\ndown"}"#
        );
        assert_eq!(serde_json::to_string(&Response::Pong).unwrap(), r#"{"type":"pong"}"#);
    }

    #[test]
    fn game_errors_map_to_wire_codes() {
        let resp = Response::from_game_error(&GameError::RestrictedAccess);
        match resp {
            Response::Error { code, message } => {
                assert_eq!(code, "restricted_access");
                assert!(!message.is_empty());
            }
            other => panic!("expected error response, got {:?}", other),
        }
    }
}
