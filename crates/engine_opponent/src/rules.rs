//! Thin adapter over the external rules library
//!
//! The opponent never implements chess rules itself. Legality, move
//! application and game-over detection come from `shakmaty`; this module only
//! narrows its API to the handful of operations the orchestration needs and
//! converts between board moves and the wire format.

use rand::seq::IndexedRandom;
use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Move, MoveList, Position};

use crate::error::{OpponentError, OpponentResult};

/// FEN of the standard starting position
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Whether a position can still be played, and if not, why
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameStatus {
    Ongoing,
    Checkmate,
    Stalemate,
    /// Insufficient material or the fifty-move rule
    Draw,
}

impl GameStatus {
    pub fn is_over(self) -> bool {
        self != GameStatus::Ongoing
    }
}

/// Parse a FEN string into a playable position
pub fn parse_fen(fen: &str) -> OpponentResult<Chess> {
    let invalid = |reason: String| OpponentError::InvalidFen {
        fen: fen.to_string(),
        reason,
    };
    let parsed = Fen::from_ascii(fen.trim().as_bytes()).map_err(|e| invalid(e.to_string()))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| invalid(e.to_string()))
}

/// Render a position as FEN for the `position` command
pub fn to_fen(position: &Chess) -> String {
    Fen::from_position(position.clone(), EnPassantMode::Legal).to_string()
}

/// All legal moves for the side to move
pub fn legal_moves(position: &Chess) -> MoveList {
    position.legal_moves()
}

/// Play a move on a copy of the position
///
/// Returns `None` when the move is not legal; the input is never mutated.
pub fn apply(position: &Chess, mv: &Move) -> Option<Chess> {
    position.clone().play(mv).ok()
}

/// Classify the position
pub fn game_status(position: &Chess) -> GameStatus {
    if position.is_checkmate() {
        GameStatus::Checkmate
    } else if position.is_stalemate() {
        GameStatus::Stalemate
    } else if position.is_insufficient_material() || position.halfmoves() >= 100 {
        GameStatus::Draw
    } else {
        GameStatus::Ongoing
    }
}

/// Pick a legal move uniformly at random
pub fn random_legal_move(position: &Chess) -> Option<Move> {
    let moves = position.legal_moves();
    moves.choose(&mut rand::rng()).cloned()
}

/// Resolve an engine-proposed move against the position
///
/// `None` covers both the null move and moves that are not legal here.
pub fn resolve_uci(position: &Chess, uci: &UciMove) -> Option<Move> {
    uci.to_move(position).ok()
}

/// Wire representation of a board move
pub fn to_uci(mv: &Move) -> UciMove {
    mv.to_uci(CastlingMode::Standard)
}
