//! Core module - settings and error plumbing for the opponent shell
//!
//! # Contents
//!
//! - [`error`] - [`AppError`] and the [`AppResult`] alias
//! - [`settings_persistence`] - [`OpponentSettings`] and its JSON file
//!
//! Everything chess-specific lives in the `engine_opponent` crate; this
//! module only turns user configuration into the values that crate expects.

pub mod error;
pub mod settings_persistence;

pub use error::{AppError, AppResult};
pub use settings_persistence::{
    load_settings, save_settings, settings_path, try_load_settings, OpponentSettings,
};
