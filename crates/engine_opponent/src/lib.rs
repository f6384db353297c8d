//! Computer opponent orchestration for KidsChess
//!
//! Drives an external UCI engine over an asynchronous line channel, keeps at
//! most one search in flight per engine, adapts engine strength to a
//! difficulty profile and produces child-friendly hints alongside each move.
//!
//! # Architecture
//!
//! - [`protocol`]: stateless encode/decode of protocol lines
//! - [`router`]: matches decoded events to the request waiting for them
//! - [`session`]: lifecycle, timeouts and cancellation for one engine
//! - [`difficulty`]: profiles, presets and the engine options they imply
//! - [`candidates`]: ranked MultiPV lines gathered during a search
//! - [`threats`]: capturable-piece hints computed from the rules alone
//! - [`controller`]: the façade the game talks to
//! - [`rules`]: narrow adapter over `shakmaty`
//! - [`transport`]: in-process channels and spawned engine processes
//!
//! # Guarantees
//!
//! Whatever move reaches the board is legal in the requested position. If the
//! engine hangs or answers nonsense the controller still resolves, with a
//! random legal move flagged as degraded.

pub mod candidates;
pub mod controller;
pub mod difficulty;
pub mod error;
pub mod protocol;
pub mod router;
pub mod rules;
pub mod session;
pub mod threats;
pub mod transport;

pub use candidates::{CandidateAnalyzer, CandidateMove};
pub use controller::{ComputerOpponentController, OpponentMove};
pub use difficulty::{build_options, DifficultyProfile};
pub use error::{OpponentError, OpponentResult};
pub use protocol::{decode, encode, EngineCommand, EngineEvent, InfoLine, Score, SearchConstraints};
pub use router::{ResponseRouter, Routed};
pub use rules::{GameStatus, STARTING_FEN};
pub use session::{
    DegradedReason, EngineSession, SearchId, SearchOutcome, SessionConfig, SessionState,
};
pub use threats::{compute_threats, ThreatSet};
pub use transport::{EngineChannel, EngineEndpoint, EngineProcess};
