//! Computer opponent façade
//!
//! [`ComputerOpponentController`] owns exactly one [`EngineSession`] and turns
//! "here is a position and a difficulty" into a legal move plus, in kids
//! mode, hint data for the board.
//!
//! # Move request sequence
//!
//! 1. Lazily run the engine handshake on first use
//! 2. Send the profile's engine options, in order
//! 3. Search with the profile's depth/time constraints
//! 4. In kids mode, attach ranked candidates and the threat set
//!
//! Requests are serialised: a second caller waits for the first move to
//! resolve instead of hitting [`crate::OpponentError::SessionBusy`].

use std::time::Duration;

use shakmaty::uci::UciMove;
use shakmaty::{Chess, Move};
use tracing::{debug, info};

use crate::candidates::{CandidateAnalyzer, CandidateMove};
use crate::difficulty::{build_options, DifficultyProfile};
use crate::error::{OpponentError, OpponentResult};
use crate::rules;
use crate::session::{DegradedReason, EngineSession, SessionConfig, SessionState};
use crate::threats::{compute_threats, ThreatSet};
use crate::transport::EngineChannel;

/// The computer's answer for one position
#[derive(Debug, Clone)]
pub struct OpponentMove {
    /// Legal in the requested position
    pub chosen: Move,
    pub uci: UciMove,
    /// Set when the move is a fallback rather than the engine's choice
    pub degraded: Option<DegradedReason>,
    /// Top ranked lines (kids mode only)
    pub candidates: Option<Vec<CandidateMove>>,
    /// Our pieces the player could capture next (kids mode only)
    pub threats: Option<ThreatSet>,
    pub elapsed: Duration,
}

/// Drives one engine session on behalf of the game
#[derive(Debug)]
pub struct ComputerOpponentController {
    session: EngineSession,
    turn: tokio::sync::Mutex<()>,
}

impl ComputerOpponentController {
    pub fn new(channel: EngineChannel, config: SessionConfig) -> Self {
        Self::from_session(EngineSession::new(channel, config))
    }

    pub fn from_session(session: EngineSession) -> Self {
        Self {
            session,
            turn: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Pick the computer's move for `position` at the given difficulty
    ///
    /// # Arguments
    ///
    /// * `position` - Position with the computer to move
    /// * `profile` - Difficulty; out-of-range values are clamped
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let profile = DifficultyProfile::preset("pawn").unwrap_or_default();
    /// let reply = controller.request_move(&position, &profile).await?;
    /// board.play(&reply.chosen);
    /// ```
    pub async fn request_move(
        &self,
        position: &Chess,
        profile: &DifficultyProfile,
    ) -> OpponentResult<OpponentMove> {
        let status = rules::game_status(position);
        if status.is_over() {
            return Err(OpponentError::GameOver { status });
        }

        let _turn = self.turn.lock().await;
        let profile = profile.clamped();

        self.session.initialize().await?;
        self.session.configure(&build_options(&profile))?;
        let outcome = self.session.search(position, profile.constraints()).await?;

        let (candidates, threats) = if profile.kids_mode {
            let hints: Vec<CandidateMove> =
                CandidateAnalyzer::from_candidates(outcome.candidates, profile.multi_pv)
                    .top_n(profile.multi_pv as usize)
                    .into_iter()
                    .filter(|c| rules::resolve_uci(position, &c.mv).is_some())
                    .collect();
            let threats = compute_threats(position);
            debug!("[AI] {} hint(s), threats {threats}", hints.len());
            (Some(hints), Some(threats))
        } else {
            (None, None)
        };

        let uci = rules::to_uci(&outcome.chosen);
        match outcome.degraded {
            Some(reason) => info!("[AI] {} plays {uci} (fallback: {reason})", profile.id),
            None => info!("[AI] {} plays {uci}", profile.id),
        }

        Ok(OpponentMove {
            chosen: outcome.chosen,
            uci,
            degraded: outcome.degraded,
            candidates,
            threats,
            elapsed: outcome.elapsed,
        })
    }

    /// Same as [`Self::request_move`] for a position given as FEN
    pub async fn request_move_fen(
        &self,
        fen: &str,
        profile: &DifficultyProfile,
    ) -> OpponentResult<OpponentMove> {
        let position = rules::parse_fen(fen)?;
        self.request_move(&position, profile).await
    }

    /// Start a new game on the engine side
    pub async fn new_game(&self) -> OpponentResult<()> {
        let _turn = self.turn.lock().await;
        self.session.initialize().await?;
        self.session.new_game().await
    }

    /// Cut the in-flight move request short (the player left the board)
    pub fn cancel_pending(&self) {
        self.session.cancel();
    }

    /// Shut the engine down; later requests fail with `Terminated`
    pub fn dispose(&self) {
        self.session.terminate();
    }
}
