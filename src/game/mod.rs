//! Game-side integration of the computer opponent

pub mod ai;

pub use ai::{AiOpponent, MoveReport};
