//! AI opponent service
//!
//! Owns the engine for the rest of the application. The engine process is
//! launched on the first move request, not at startup, so menus never wait
//! on it.
//!
//! # Engine loss
//!
//! When the engine dies (closed transport, failed handshake, no `readyok`)
//! the failing request reports the error as-is and the dead controller is
//! dropped. The *next* request launches a fresh engine. There is no silent
//! retry inside the failing call.
//!
//! # Integration
//!
//! ```rust,ignore
//! let opponent = AiOpponent::new(load_settings(&settings_path()));
//! let report = opponent.request_move(&fen, Some("knight")).await?;
//! // player navigated away mid-search
//! opponent.cancel_pending();
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use engine_opponent::rules;
use engine_opponent::{ComputerOpponentController, EngineChannel, EngineProcess, SessionState};
use parking_lot::Mutex;
use tracing::{info, warn};

use super::resource::{AiStatistics, MoveReport};
use crate::core::error::{AppError, AppResult};
use crate::core::settings_persistence::OpponentSettings;

/// A freshly started engine
pub struct LaunchedEngine {
    pub channel: EngineChannel,
    /// Child process to keep alive, if the engine runs out of process
    pub process: Option<EngineProcess>,
}

/// Starts engines for [`AiOpponent`]
pub trait EngineLauncher: Send + Sync {
    fn launch(&self) -> AppResult<LaunchedEngine>;
}

impl<F> EngineLauncher for F
where
    F: Fn() -> AppResult<LaunchedEngine> + Send + Sync,
{
    fn launch(&self) -> AppResult<LaunchedEngine> {
        self()
    }
}

/// Launches a UCI binary from disk
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    path: PathBuf,
}

impl ProcessLauncher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EngineLauncher for ProcessLauncher {
    fn launch(&self) -> AppResult<LaunchedEngine> {
        let (process, channel) =
            EngineProcess::spawn(&self.path).map_err(|source| AppError::EngineLaunch {
                path: self.path.clone(),
                source,
            })?;
        Ok(LaunchedEngine {
            channel,
            process: Some(process),
        })
    }
}

struct RunningEngine {
    controller: ComputerOpponentController,
    _process: Option<EngineProcess>,
}

/// The computer opponent as the rest of the app sees it
pub struct AiOpponent {
    settings: OpponentSettings,
    launcher: Box<dyn EngineLauncher>,
    engine: Mutex<Option<Arc<RunningEngine>>>,
    stats: Mutex<AiStatistics>,
}

impl AiOpponent {
    /// Opponent backed by the engine binary named in `settings`
    pub fn new(settings: OpponentSettings) -> Self {
        let launcher = ProcessLauncher::new(settings.engine_path.clone());
        Self::with_launcher(settings, launcher)
    }

    pub fn with_launcher(
        settings: OpponentSettings,
        launcher: impl EngineLauncher + 'static,
    ) -> Self {
        Self {
            settings,
            launcher: Box::new(launcher),
            engine: Mutex::new(None),
            stats: Mutex::new(AiStatistics::default()),
        }
    }

    pub fn settings(&self) -> &OpponentSettings {
        &self.settings
    }

    pub fn statistics(&self) -> AiStatistics {
        *self.stats.lock()
    }

    /// Session state of the current engine, if one is running
    pub fn engine_state(&self) -> Option<SessionState> {
        self.engine.lock().as_ref().map(|e| e.controller.state())
    }

    fn engine(&self) -> AppResult<Arc<RunningEngine>> {
        let mut slot = self.engine.lock();
        if let Some(engine) = slot.as_ref() {
            return Ok(Arc::clone(engine));
        }

        let launched = self.launcher.launch()?;
        let engine = Arc::new(RunningEngine {
            controller: ComputerOpponentController::new(
                launched.channel,
                self.settings.session_config(),
            ),
            _process: launched.process,
        });
        *slot = Some(Arc::clone(&engine));
        self.stats.lock().engine_launches += 1;
        info!("[AI] Engine launched");
        Ok(engine)
    }

    fn discard(&self, engine: &Arc<RunningEngine>) {
        let mut slot = self.engine.lock();
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, engine)) {
            warn!("[AI] Engine lost; the next request starts a fresh one");
            engine.controller.dispose();
            *slot = None;
        }
    }

    /// Ask the computer for its move
    ///
    /// # Arguments
    ///
    /// * `fen` - Position with the computer to move
    /// * `profile_id` - Difficulty id; `None` uses the settings' default
    ///
    /// # Errors
    ///
    /// Unknown profiles and bad FENs are rejected before the engine is
    /// launched. Engine failures come back as [`AppError::Opponent`].
    pub async fn request_move(
        &self,
        fen: &str,
        profile_id: Option<&str>,
    ) -> AppResult<MoveReport> {
        let profile = self.settings.resolve_profile(profile_id)?;
        let position = rules::parse_fen(fen)?;
        let engine = self.engine()?;

        match engine.controller.request_move(&position, &profile).await {
            Ok(reply) => {
                let report = MoveReport::from_reply(&position, &profile.id, &reply);
                self.stats.lock().record(&report);
                Ok(report)
            }
            Err(e) => {
                let err = AppError::from(e);
                if err.is_engine_lost() {
                    self.discard(&engine);
                }
                Err(err)
            }
        }
    }

    /// Reset engine-side game state before a new game
    pub async fn new_game(&self) -> AppResult<()> {
        let engine = self.engine()?;
        if let Err(e) = engine.controller.new_game().await {
            let err = AppError::from(e);
            if err.is_engine_lost() {
                self.discard(&engine);
            }
            return Err(err);
        }
        Ok(())
    }

    /// Cut the in-flight request short; nothing happens when idle
    pub fn cancel_pending(&self) {
        if let Some(engine) = self.engine.lock().as_ref() {
            engine.controller.cancel_pending();
        }
    }

    /// Stop the engine; a later request launches a new one
    pub fn shutdown(&self) {
        if let Some(engine) = self.engine.lock().take() {
            engine.controller.dispose();
            info!("[AI] Engine shut down");
        }
    }
}
