//! Solving through an external solver process.
//!
//! The process speaks a framed JSON protocol on its stdio: every frame is an
//! `0xXXXXXXXX\n` hexadecimal length header followed by that many bytes of
//! payload. Payloads are JSON arrays `[kind, ticket, operation, args]`,
//! except for the raw XML frame that follows an `ok+xml` reply.

mod frame;
mod message;
mod session;
mod solver;
mod xml;

use thiserror::Error;

pub use frame::{read_frame, write_frame, HEADER_LEN, MAX_FRAME_LEN};
pub use message::{Message, ReturnStatus};
pub use session::{BatchHandler, Handler, SelectReply, Session};
pub use solver::ExternalSolver;
pub use xml::parse_selections;

/// Protocol version spoken by this side
pub const API_VERSION: &str = "2.7";

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid frame header {0:?}")]
    InvalidHeader(String),

    #[error("Frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Invalid message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Unsupported API version {0}, need at least {API_VERSION}")]
    UnsupportedApiVersion(String),

    #[error("Reply for unknown ticket {0}")]
    UnknownTicket(String),

    #[error("External solver exited before replying")]
    PrematureExit,

    #[error("Invalid selections document: {0}")]
    Xml(String),
}
