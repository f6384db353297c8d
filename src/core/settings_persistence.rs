//! Opponent settings persistence
//!
//! Saves and loads [`OpponentSettings`] to/from a JSON file, so the engine
//! location, timing knobs and any custom difficulty profiles survive between
//! runs.
//!
//! # File Location
//!
//! Settings live in `settings.json` under the platform configuration
//! directory (e.g. `~/.config/kidschess/settings.json` on Linux). When no
//! configuration directory can be resolved, a local `settings.json` is used.
//!
//! # Error Handling
//!
//! - [`load_settings`] never fails: a missing or broken file falls back to
//!   defaults with a warning
//! - [`try_load_settings`] and [`save_settings`] surface [`AppError`]s for
//!   callers that want to report them
//!
//! # Example file
//!
//! ```json
//! {
//!   "engine_path": "stockfish",
//!   "startup_timeout_ms": 5000,
//!   "grace_period_ms": 500,
//!   "search_margin_ms": 250,
//!   "depth_only_budget_ms": 3000,
//!   "default_profile": "pawn",
//!   "custom_profiles": [
//!     { "id": "tiny", "skill": 0, "depth": 1, "time_ms": 100,
//!       "multi_pv": 2, "threads": 1, "kids_mode": true }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use engine_opponent::{DifficultyProfile, SessionConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::error::{AppError, AppResult};

/// Settings filename
const SETTINGS_FILENAME: &str = "settings.json";

/// Everything the shell needs to run the computer opponent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpponentSettings {
    /// UCI engine binary; a bare name is looked up on `PATH`
    pub engine_path: PathBuf,
    pub startup_timeout_ms: u64,
    pub grace_period_ms: u64,
    pub search_margin_ms: u64,
    pub depth_only_budget_ms: u64,
    /// Profile used when a request names none
    pub default_profile: String,
    /// Extra profiles; an id here shadows the preset of the same name
    pub custom_profiles: Vec<DifficultyProfile>,
}

impl Default for OpponentSettings {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            engine_path: PathBuf::from("stockfish"),
            startup_timeout_ms: millis(session.startup_timeout),
            grace_period_ms: millis(session.grace_period),
            search_margin_ms: millis(session.search_margin),
            depth_only_budget_ms: millis(session.depth_only_budget),
            default_profile: DifficultyProfile::default().id,
            custom_profiles: Vec::new(),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl OpponentSettings {
    /// Session timings for the opponent core
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            startup_timeout: Duration::from_millis(self.startup_timeout_ms),
            grace_period: Duration::from_millis(self.grace_period_ms),
            search_margin: Duration::from_millis(self.search_margin_ms),
            depth_only_budget: Duration::from_millis(self.depth_only_budget_ms),
        }
    }

    /// Find a profile by id, or the default profile when `id` is `None`
    ///
    /// Custom profiles are checked before the built-in presets. Matching is
    /// case-insensitive.
    pub fn resolve_profile(&self, id: Option<&str>) -> AppResult<DifficultyProfile> {
        let id = id.unwrap_or(&self.default_profile).trim();
        self.custom_profiles
            .iter()
            .find(|p| p.id.eq_ignore_ascii_case(id))
            .cloned()
            .or_else(|| DifficultyProfile::preset(id))
            .ok_or_else(|| AppError::UnknownProfile { id: id.to_string() })
    }

    /// Every profile a request may name: custom ones first, then unshadowed presets
    pub fn available_profiles(&self) -> Vec<DifficultyProfile> {
        let mut profiles = self.custom_profiles.clone();
        for preset in DifficultyProfile::presets() {
            if !profiles.iter().any(|p| p.id.eq_ignore_ascii_case(&preset.id)) {
                profiles.push(preset);
            }
        }
        profiles
    }
}

/// Resolve the settings file path
///
/// Returns `settings.json` in the user's configuration directory, or a local
/// `settings.json` if the system config dir cannot be found.
pub fn settings_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "kidschess", "KidsChess") {
        proj_dirs.config_dir().join(SETTINGS_FILENAME)
    } else {
        PathBuf::from(SETTINGS_FILENAME)
    }
}

/// Read and parse a settings file
pub fn try_load_settings(path: &Path) -> AppResult<OpponentSettings> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Load settings, falling back to defaults on any failure
pub fn load_settings(path: &Path) -> OpponentSettings {
    if !path.exists() {
        info!("[SETTINGS] No settings file found at {:?}. Using defaults.", path);
        return OpponentSettings::default();
    }

    match try_load_settings(path) {
        Ok(settings) => {
            info!("[SETTINGS] Loaded settings from {:?}", path);
            settings
        }
        Err(e) => {
            warn!(
                "[SETTINGS] Failed to load settings file at {:?}: {}. Using defaults.",
                path, e
            );
            OpponentSettings::default()
        }
    }
}

/// Write settings as pretty JSON, creating the parent directory if needed
pub fn save_settings(settings: &OpponentSettings, path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    info!("[SETTINGS] Saved settings to {:?}", path);
    Ok(())
}
