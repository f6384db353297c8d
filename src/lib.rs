//! KidsChess computer opponent shell
//!
//! Wraps the `engine_opponent` core with what a running application needs:
//! persisted settings, profile lookup, engine process management and a
//! service the UI can call.

pub mod core;
pub mod game;
