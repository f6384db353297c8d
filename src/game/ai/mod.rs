//! Chess AI opponent
//!
//! Connects the application to the `engine_opponent` core.
//!
//! # Architecture
//!
//! - `AiOpponent`: service owning the engine process and its controller
//! - `MoveReport`: serializable answer handed to the UI
//! - `AiStatistics`: running totals (moves, fallbacks, engine launches)
//!
//! The engine is started lazily on the first request and replaced after it
//! dies, so a crashed engine costs one failed request rather than the game.

pub mod resource;
pub mod service;

pub use resource::{AiStatistics, CandidateHint, MoveReport};
pub use service::{AiOpponent, EngineLauncher, LaunchedEngine, ProcessLauncher};
