//! Data the AI opponent hands to the UI layer
//!
//! The opponent core speaks in board types (`Move`, `UciMove`, bitboards).
//! The UI only needs strings it can render, so each answered request is
//! flattened into a serializable [`MoveReport`].
//!
//! # Report contents
//!
//! | Field        | Present          | Meaning                                   |
//! |--------------|------------------|-------------------------------------------|
//! | `uci`, `san` | always           | The computer's move                       |
//! | `degraded`   | fallback only    | Why the engine's own answer was not used  |
//! | `candidates` | kids mode        | Ranked engine lines, best first           |
//! | `threats`    | kids mode        | Squares where the player can capture next |
//!
//! # Example
//!
//! ```rust,ignore
//! let report = opponent.request_move(&fen, Some("pawn")).await?;
//! for square in report.threats.iter().flatten() {
//!     board.highlight(square);
//! }
//! ```

use serde::Serialize;
use shakmaty::san::San;
use shakmaty::{Chess, Move};

use engine_opponent::rules;
use engine_opponent::{CandidateMove, DegradedReason, OpponentMove};

/// One engine line shown as a hint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateHint {
    /// 1 = the engine's favourite
    pub rank: u32,
    pub uci: String,
    pub san: String,
    /// Human-readable score, e.g. `+0.35` or `-M2`
    pub score: String,
    /// Score in centipawns for sorting and colouring
    pub score_cp: i32,
    pub depth: u32,
}

/// Everything the UI needs after the computer has moved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveReport {
    /// Position the move was chosen for
    pub fen: String,
    pub profile: String,
    pub uci: String,
    pub san: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<DegradedReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<CandidateHint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threats: Option<Vec<String>>,
    pub elapsed_ms: u64,
}

fn san(position: &Chess, mv: &Move) -> String {
    San::from_move(position, mv).to_string()
}

impl CandidateHint {
    fn from_candidate(position: &Chess, candidate: &CandidateMove) -> Self {
        let san = rules::resolve_uci(position, &candidate.mv)
            .map(|mv| san(position, &mv))
            .unwrap_or_else(|| candidate.mv.to_string());
        Self {
            rank: candidate.rank,
            uci: candidate.mv.to_string(),
            san,
            score: candidate.score.to_string(),
            score_cp: candidate.score.to_cp(),
            depth: candidate.depth,
        }
    }
}

impl MoveReport {
    /// Flatten a controller reply for the position it was requested for
    pub fn from_reply(position: &Chess, profile: &str, reply: &OpponentMove) -> Self {
        Self {
            fen: rules::to_fen(position),
            profile: profile.to_string(),
            uci: reply.uci.to_string(),
            san: san(position, &reply.chosen),
            degraded: reply.degraded,
            candidates: reply.candidates.as_ref().map(|candidates| {
                candidates
                    .iter()
                    .map(|c| CandidateHint::from_candidate(position, c))
                    .collect()
            }),
            threats: reply
                .threats
                .map(|threats| threats.squares().map(|sq| sq.to_string()).collect()),
            elapsed_ms: u64::try_from(reply.elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Running totals for the AI opponent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AiStatistics {
    pub moves_played: u64,
    /// Moves that came from the fallback instead of the engine
    pub degraded_moves: u64,
    pub engine_launches: u64,
    pub last_elapsed_ms: u64,
}

impl AiStatistics {
    pub(crate) fn record(&mut self, report: &MoveReport) {
        self.moves_played += 1;
        if report.degraded.is_some() {
            self.degraded_moves += 1;
        }
        self.last_elapsed_ms = report.elapsed_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_opponent::rules::{parse_fen, STARTING_FEN};
    use engine_opponent::{compute_threats, Score};
    use std::time::Duration;

    fn reply(position: &Chess, uci: &str, kids: bool) -> OpponentMove {
        let chosen = rules::resolve_uci(position, &uci.parse().unwrap()).unwrap();
        OpponentMove {
            uci: rules::to_uci(&chosen),
            chosen,
            degraded: None,
            candidates: kids.then(|| {
                vec![CandidateMove {
                    mv: uci.parse().unwrap(),
                    score: Score::Centipawns(35),
                    rank: 1,
                    depth: 8,
                    pv: vec![uci.parse().unwrap()],
                }]
            }),
            threats: kids.then(|| compute_threats(position)),
            elapsed: Duration::from_millis(120),
        }
    }

    #[test]
    fn test_report_uses_san_and_score_text() {
        //! Hints carry both notations and a printable score
        let position = parse_fen(STARTING_FEN).unwrap();
        let report = MoveReport::from_reply(&position, "pawn", &reply(&position, "g1f3", true));

        assert_eq!(report.uci, "g1f3");
        assert_eq!(report.san, "Nf3");
        assert_eq!(report.elapsed_ms, 120);
        let hint = &report.candidates.as_ref().unwrap()[0];
        assert_eq!(hint.san, "Nf3");
        assert_eq!(hint.score, "+0.35");
        assert_eq!(report.threats, Some(Vec::new()));
    }

    #[test]
    fn test_report_json_omits_absent_hints() {
        //! Non-kids reports leave the hint keys out entirely
        let position = parse_fen(STARTING_FEN).unwrap();
        let report = MoveReport::from_reply(&position, "rook", &reply(&position, "e2e4", false));
        let json = serde_json::to_value(&report).unwrap();

        assert!(json.get("candidates").is_none());
        assert!(json.get("threats").is_none());
        assert!(json.get("degraded").is_none());
        assert_eq!(json["san"], "e4");
    }

    #[test]
    fn test_extreme_engine_score_still_renders() {
        let position = parse_fen(STARTING_FEN).unwrap();
        let mut reply = reply(&position, "e2e4", true);
        if let Some(candidates) = reply.candidates.as_mut() {
            candidates[0].score = Score::Mate(i32::MIN);
        }

        let report = MoveReport::from_reply(&position, "pawn", &reply);

        let hint = &report.candidates.as_ref().unwrap()[0];
        assert_eq!(hint.score, "-M2147483648");
        assert_eq!(hint.score_cp, -1_000);
    }

    #[test]
    fn test_statistics_count_fallbacks() {
        let position = parse_fen(STARTING_FEN).unwrap();
        let mut report =
            MoveReport::from_reply(&position, "pawn", &reply(&position, "e2e4", false));
        let mut stats = AiStatistics::default();

        stats.record(&report);
        report.degraded = Some(DegradedReason::Timeout);
        stats.record(&report);

        assert_eq!(stats.moves_played, 2);
        assert_eq!(stats.degraded_moves, 1);
    }
}
