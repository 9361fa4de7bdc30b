//! Error types for the session crate

use geotrackr_transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// STOMP framing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Malformed header line: {0}")]
    MalformedHeader(String),

    #[error("Invalid escape sequence: \\{0}")]
    InvalidEscape(char),

    #[error("Invalid content-length: {0}")]
    InvalidContentLength(String),

    #[error("Frame exceeds {0} bytes")]
    TooLarge(usize),

    #[error("Frame body not terminated by NUL")]
    MissingTerminator,

    #[error("Invalid heart-beat header: {0}")]
    InvalidHeartbeat(String),
}

/// Session-level errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("No CONNECTED frame within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("No heart-beat from server within {0:?}")]
    HeartbeatTimeout(Duration),

    #[error("Unexpected frame: {0}")]
    Unexpected(String),

    #[error("Connection closed: {0}")]
    Closed(String),

    #[error("Session task stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, SessionError>;
