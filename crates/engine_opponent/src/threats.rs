//! Threat hints for kids mode
//!
//! Marks the squares where the side to move has a piece the opponent could
//! capture right now. The answer comes from the rules library alone: the
//! position is copied with the turn handed to the opponent, and the
//! destination squares of its legal captures that hold one of our pieces are
//! collected. No engine search is involved, and the caller's position and
//! history are left untouched.

use std::fmt;

use shakmaty::{Bitboard, Chess, Position, Square};
use tracing::trace;

/// Squares holding the side to move's pieces that the opponent can capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreatSet(Bitboard);

impl ThreatSet {
    pub fn contains(&self, square: Square) -> bool {
        self.0.contains(square)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.count()
    }

    pub fn squares(&self) -> impl Iterator<Item = Square> {
        self.0.into_iter()
    }

    pub fn as_bitboard(&self) -> Bitboard {
        self.0
    }
}

impl fmt::Display for ThreatSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.squares().map(|sq| sq.to_string()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Compute the threat set for the side to move
pub fn compute_threats(position: &Chess) -> ThreatSet {
    let ours = position.us();

    match position.clone().swap_turn() {
        Ok(flipped) => {
            let mut threatened = Bitboard::EMPTY;
            for mv in flipped.legal_moves().iter().filter(|m| m.is_capture()) {
                if ours.contains(mv.to()) {
                    threatened |= Bitboard::from_square(mv.to());
                }
            }
            ThreatSet(threatened)
        }
        Err(_) => {
            // The flipped position is not a legal one (the side to move is
            // in check), so read the opponent's attacks off the board instead.
            trace!("[THREATS] Turn swap rejected; using attack map");
            let board = position.board();
            let them = !position.turn();
            let mut threatened = Bitboard::EMPTY;
            for square in ours {
                if board.attacks_to(square, them, board.occupied()).any() {
                    threatened |= Bitboard::from_square(square);
                }
            }
            ThreatSet(threatened)
        }
    }
}
