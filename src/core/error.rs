//! Error types for the application shell
//!
//! Wraps the opponent core's [`OpponentError`] together with the failures the
//! shell adds on top: reading and writing settings, resolving difficulty
//! profiles and launching the engine binary.

use std::path::PathBuf;

use engine_opponent::OpponentError;
use thiserror::Error;

/// Errors that can occur in the application shell
#[derive(Error, Debug)]
pub enum AppError {
    /// Settings file I/O error
    #[error("Settings I/O error: {0}")]
    SettingsIo(#[from] std::io::Error),

    /// Settings serialization/deserialization error
    #[error("Settings serialization error: {0}")]
    SettingsSerialization(#[from] serde_json::Error),

    /// No preset or custom profile with this id
    #[error("Unknown difficulty profile '{id}'")]
    UnknownProfile { id: String },

    /// The engine binary could not be started
    #[error("Failed to launch engine {path:?}: {source}")]
    EngineLaunch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error reported by the opponent core
    #[error(transparent)]
    Opponent(#[from] OpponentError),
}

impl AppError {
    /// Whether the engine behind this error is gone and must be relaunched
    pub fn is_engine_lost(&self) -> bool {
        matches!(
            self,
            AppError::Opponent(
                OpponentError::TransportClosed
                    | OpponentError::EngineStartupFailed { .. }
                    | OpponentError::EngineUnresponsive { .. }
                    | OpponentError::Terminated
            )
        )
    }
}

/// Result type alias for shell operations
pub type AppResult<T> = Result<T, AppError>;
