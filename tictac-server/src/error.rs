//! Error types for request handling
//!
//! Each category maps to a different reaction in the connection handler:
//! protocol and rule errors are reported to the requester and the connection
//! stays open, session errors are internal faults that close the connection.

use tictac_core::MoveError;

use crate::registry::SessionId;

/// A request line that does not match any known command
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty request")]
    Empty,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{command} expects {expected} argument(s), got {found}")]
    WrongArity {
        command: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("not an integer: {0}")]
    NotAnInteger(String),

    #[error("request is not valid UTF-8")]
    InvalidUtf8,

    #[error("request longer than {limit} bytes")]
    LineTooLong { limit: usize },
}

/// A well-formed move the game rules refuse
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RuleViolation {
    #[error("not your turn")]
    NotYourTurn,

    #[error("invalid move: {0}")]
    InvalidMove(#[from] MoveError),
}

/// Internal faults in the session table
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}

/// Outcome of one failed request
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Rule(#[from] RuleViolation),

    #[error(transparent)]
    Session(#[from] SessionError),
}
