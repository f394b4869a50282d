//! Line-oriented wire protocol
//!
//! Client -> server, one command per line:
//! - `GET_STATE`
//! - `MOVE <row> <col>`
//!
//! Server -> client, one message per line:
//! - `1` / `2` - the player value assigned on join
//! - `{...}` - a state snapshot as a JSON object
//! - `INVALID_MOVE`, `NOT_YOUR_TURN`, `MALFORMED_REQUEST <detail>`,
//!   `SERVER_ERROR <detail>`

use std::fmt;

use tictac_core::{Player, Snapshot};

use crate::error::ProtocolError;

/// Longest request line accepted, newline included
pub const MAX_LINE_BYTES: usize = 256;

/// A parsed client request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    GetState,
    /// Coordinates are kept signed; range checking is a game rule, not syntax
    Move { row: i64, col: i64 },
}

impl Command {
    pub const GET_STATE: &'static str = "GET_STATE";
    pub const MOVE: &'static str = "MOVE";

    /// Parse a raw request line as read off the socket
    pub fn parse_bytes(raw: &[u8]) -> Result<Self, ProtocolError> {
        if raw.len() > MAX_LINE_BYTES {
            return Err(ProtocolError::LineTooLong {
                limit: MAX_LINE_BYTES,
            });
        }
        let line = std::str::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8)?;
        Self::parse(line)
    }

    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            return Err(ProtocolError::Empty);
        };
        let args: Vec<&str> = tokens.collect();

        match name {
            Self::GET_STATE => {
                expect_arity(Self::GET_STATE, 0, &args)?;
                Ok(Command::GetState)
            }
            Self::MOVE => {
                expect_arity(Self::MOVE, 2, &args)?;
                Ok(Command::Move {
                    row: parse_int(args[0])?,
                    col: parse_int(args[1])?,
                })
            }
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::GetState => write!(f, "{}", Self::GET_STATE),
            Command::Move { row, col } => write!(f, "{} {} {}", Self::MOVE, row, col),
        }
    }
}

fn expect_arity(command: &'static str, expected: usize, args: &[&str]) -> Result<(), ProtocolError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ProtocolError::WrongArity {
            command,
            expected,
            found: args.len(),
        })
    }
}

fn parse_int(token: &str) -> Result<i64, ProtocolError> {
    token
        .parse()
        .map_err(|_| ProtocolError::NotAnInteger(token.to_string()))
}

/// Error codes sent back to a single connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidMove,
    NotYourTurn,
    MalformedRequest,
    ServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidMove => "INVALID_MOVE",
            ErrorCode::NotYourTurn => "NOT_YOUR_TURN",
            ErrorCode::MalformedRequest => "MALFORMED_REQUEST",
            ErrorCode::ServerError => "SERVER_ERROR",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "INVALID_MOVE" => Some(ErrorCode::InvalidMove),
            "NOT_YOUR_TURN" => Some(ErrorCode::NotYourTurn),
            "MALFORMED_REQUEST" => Some(ErrorCode::MalformedRequest),
            "SERVER_ERROR" => Some(ErrorCode::ServerError),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message pushed to one client
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerMessage {
    /// Seat assignment, sent once right after join
    Assigned(Player),
    /// Authoritative board state
    State(Snapshot),
    Error {
        code: ErrorCode,
        detail: Option<String>,
    },
}

impl ServerMessage {
    pub fn error(code: ErrorCode) -> Self {
        ServerMessage::Error { code, detail: None }
    }

    pub fn error_with_detail(code: ErrorCode, detail: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            detail: Some(detail.into()),
        }
    }

    /// Encode as a single line, without the trailing newline
    pub fn encode(&self) -> String {
        match self {
            ServerMessage::Assigned(player) => player.to_string(),
            // A snapshot holds only numbers, bools and enums
            ServerMessage::State(snapshot) => serde_json::to_string(snapshot)
                .unwrap_or_else(|_| ErrorCode::ServerError.to_string()),
            ServerMessage::Error { code, detail: None } => code.to_string(),
            ServerMessage::Error {
                code,
                detail: Some(detail),
            } => format!("{} {}", code, single_line(detail)),
        }
    }

    /// Inverse of [`ServerMessage::encode`], for clients
    pub fn decode(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.starts_with('{') {
            return serde_json::from_str(line).ok().map(ServerMessage::State);
        }
        if let Ok(value) = line.parse::<u8>() {
            return Player::try_from(value).ok().map(ServerMessage::Assigned);
        }

        let (token, detail) = match line.split_once(' ') {
            Some((token, detail)) => (token, Some(detail.trim().to_string())),
            None => (line, None),
        };
        ErrorCode::from_token(token).map(|code| ServerMessage::Error { code, detail })
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tictac_core::GameState;

    #[test]
    fn test_parse_get_state() {
        assert_eq!(Command::parse("GET_STATE"), Ok(Command::GetState));
        assert_eq!(Command::parse("  GET_STATE\r"), Ok(Command::GetState));
    }

    #[test]
    fn test_parse_move() {
        assert_eq!(Command::parse("MOVE 1 2"), Ok(Command::Move { row: 1, col: 2 }));
        // Out of range is syntactically fine
        assert_eq!(Command::parse("MOVE -1 7"), Ok(Command::Move { row: -1, col: 7 }));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse(""), Err(ProtocolError::Empty));
        assert_eq!(Command::parse("   "), Err(ProtocolError::Empty));
        assert_eq!(
            Command::parse("move 1 2"),
            Err(ProtocolError::UnknownCommand("move".to_string()))
        );
        assert_eq!(
            Command::parse("MOVE 1"),
            Err(ProtocolError::WrongArity {
                command: "MOVE",
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            Command::parse("MOVE 1 2 3"),
            Err(ProtocolError::WrongArity {
                command: "MOVE",
                expected: 2,
                found: 3
            })
        );
        assert_eq!(
            Command::parse("GET_STATE now"),
            Err(ProtocolError::WrongArity {
                command: "GET_STATE",
                expected: 0,
                found: 1
            })
        );
        assert_eq!(
            Command::parse("MOVE a 2"),
            Err(ProtocolError::NotAnInteger("a".to_string()))
        );
        assert_eq!(
            Command::parse("MOVE 1 2.5"),
            Err(ProtocolError::NotAnInteger("2.5".to_string()))
        );
    }

    #[test]
    fn test_parse_bytes() {
        assert_eq!(
            Command::parse_bytes(b"MOVE 0 2\n"),
            Ok(Command::Move { row: 0, col: 2 })
        );
        assert_eq!(
            Command::parse_bytes(b"MOVE \xff 0\n"),
            Err(ProtocolError::InvalidUtf8)
        );

        let long = vec![b'A'; MAX_LINE_BYTES + 1];
        assert_eq!(
            Command::parse_bytes(&long),
            Err(ProtocolError::LineTooLong {
                limit: MAX_LINE_BYTES
            })
        );
    }

    #[test]
    fn test_command_display_parses_back() {
        let cmd = Command::Move { row: 2, col: 0 };
        assert_eq!(cmd.to_string(), "MOVE 2 0");
        assert_eq!(Command::parse(&cmd.to_string()), Ok(cmd));
    }

    #[test]
    fn test_encode_messages() {
        assert_eq!(ServerMessage::Assigned(Player::One).encode(), "1");
        assert_eq!(ServerMessage::error(ErrorCode::NotYourTurn).encode(), "NOT_YOUR_TURN");
        assert_eq!(
            ServerMessage::error_with_detail(ErrorCode::MalformedRequest, "bad\nline").encode(),
            "MALFORMED_REQUEST bad line"
        );

        let state = ServerMessage::State(GameState::new().snapshot()).encode();
        assert!(state.starts_with('{'));
        assert!(!state.contains('\n'));
    }

    #[test]
    fn test_decode_messages() {
        assert_eq!(ServerMessage::decode("2"), Some(ServerMessage::Assigned(Player::Two)));
        assert_eq!(ServerMessage::decode("3"), None);
        assert_eq!(
            ServerMessage::decode("INVALID_MOVE"),
            Some(ServerMessage::error(ErrorCode::InvalidMove))
        );
        assert_eq!(
            ServerMessage::decode("MALFORMED_REQUEST unknown command: FOO"),
            Some(ServerMessage::error_with_detail(
                ErrorCode::MalformedRequest,
                "unknown command: FOO"
            ))
        );
        assert_eq!(ServerMessage::decode("HELLO"), None);

        let mut game = GameState::new();
        game.make_move(1, 1).unwrap();
        let encoded = ServerMessage::State(game.snapshot()).encode();
        assert_eq!(
            ServerMessage::decode(&encoded),
            Some(ServerMessage::State(game.snapshot()))
        );
    }
}
