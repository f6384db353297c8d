//! Error types for the computer opponent
//!
//! Only failures that break the session state machine are surfaced here.
//! Recoverable conditions stay below the controller boundary:
//!
//! - Malformed engine lines decode to [`crate::protocol::EngineEvent::Unrecognized`]
//!   or to events with absent fields, and are never reported as errors.
//! - Search timeouts resolve with a fallback move flagged through
//!   [`crate::session::DegradedReason::Timeout`].

use std::time::Duration;

use thiserror::Error;

use crate::rules::GameStatus;
use crate::session::SessionState;

/// Errors that can occur while driving the engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpponentError {
    /// The engine never completed the `uci`/`isready` handshake
    ///
    /// Fatal: the session is `Terminated` and is not retried.
    #[error("Engine startup failed: no handshake within {waited:?}")]
    EngineStartupFailed { waited: Duration },

    /// The engine stopped answering `isready` on a live session
    #[error("Engine unresponsive: no readyok within {waited:?}")]
    EngineUnresponsive { waited: Duration },

    /// A search was requested while another one is in flight
    #[error("Engine session is busy with another search")]
    SessionBusy,

    /// The channel to the engine was closed from the other side
    #[error("Engine transport closed")]
    TransportClosed,

    /// The operation requires a `Ready` session
    #[error("Engine session is not ready (state: {state:?})")]
    NotReady { state: SessionState },

    /// The session has already been terminated
    #[error("Engine session has been terminated")]
    Terminated,

    /// Search constraints with neither a depth nor a time bound
    #[error("Search constraints must bound depth or time")]
    UnboundedSearch,

    /// The game in the given position has already ended
    #[error("Game is already over: {status:?}")]
    GameOver { status: GameStatus },

    /// The position could not be parsed
    #[error("Invalid FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },
}

/// Result type alias for opponent operations
pub type OpponentResult<T> = Result<T, OpponentError>;
