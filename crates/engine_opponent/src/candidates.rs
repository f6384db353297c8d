//! Ranked candidate lines from a MultiPV search
//!
//! While a search runs, every `info` line refines one rank slot. Deeper lines
//! replace shallower ones for the same rank, and a bound-only score never
//! replaces an exact one at the same depth. The engine's own rank order is
//! kept as-is: two candidates with equal scores stay in the order the engine
//! reported them, since that order already reflects its search.
//!
//! A search stopped mid-iteration can leave slots at different depths, so a
//! deeper rank 1 may repeat a move still sitting in a shallower slot. Hints
//! list each move once, under its best rank.

use std::collections::BTreeMap;

use shakmaty::uci::UciMove;

use crate::protocol::{InfoLine, Score, ScoreBound};

/// One engine-proposed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMove {
    /// First move of the line
    pub mv: UciMove,
    pub score: Score,
    /// 1 = engine's best line
    pub rank: u32,
    pub depth: u32,
    pub pv: Vec<UciMove>,
}

#[derive(Debug, Clone)]
struct Slot {
    candidate: CandidateMove,
    bound: ScoreBound,
}

/// Accumulates `info` lines into per-rank slots and serves the top lines
#[derive(Debug, Clone)]
pub struct CandidateAnalyzer {
    multi_pv: u32,
    slots: BTreeMap<u32, Slot>,
}

impl CandidateAnalyzer {
    /// Analyzer accepting ranks `1..=multi_pv`
    pub fn new(multi_pv: u32) -> Self {
        Self {
            multi_pv: multi_pv.max(1),
            slots: BTreeMap::new(),
        }
    }

    /// Rebuild an analyzer from a finished search's candidate list
    pub fn from_candidates(candidates: Vec<CandidateMove>, multi_pv: u32) -> Self {
        let mut analyzer = Self::new(multi_pv);
        for candidate in candidates {
            if candidate.rank >= 1 && candidate.rank <= analyzer.multi_pv {
                analyzer.slots.entry(candidate.rank).or_insert(Slot {
                    candidate,
                    bound: ScoreBound::Exact,
                });
            }
        }
        analyzer
    }

    /// Fold one progress line into its rank slot
    ///
    /// Lines without a score or a principal variation, or with a rank outside
    /// the configured MultiPV window, are partial and skipped.
    pub fn observe(&mut self, info: &InfoLine) {
        let rank = info.multi_pv;
        if rank == 0 || rank > self.multi_pv {
            return;
        }
        let (Some(score), Some(first)) = (info.score, info.pv.first()) else {
            return;
        };
        let depth = info.depth.unwrap_or(0);

        let replace = match self.slots.get(&rank) {
            None => true,
            Some(slot) => {
                let current = slot.candidate.depth;
                depth > current
                    || (depth == current
                        && (info.bound == ScoreBound::Exact || slot.bound != ScoreBound::Exact))
            }
        };

        if replace {
            self.slots.insert(
                rank,
                Slot {
                    candidate: CandidateMove {
                        mv: first.clone(),
                        score,
                        rank,
                        depth,
                        pv: info.pv.clone(),
                    },
                    bound: info.bound,
                },
            );
        }
    }

    pub fn multi_pv(&self) -> u32 {
        self.multi_pv
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Best line, if the engine reported any
    pub fn best(&self) -> Option<&CandidateMove> {
        self.slots.values().next().map(|s| &s.candidate)
    }

    /// At most `min(n, multi_pv)` distinct moves in ascending rank order
    pub fn top_n(&self, n: usize) -> Vec<CandidateMove> {
        let limit = n.min(self.multi_pv as usize);
        let mut top: Vec<CandidateMove> = Vec::with_capacity(limit);
        for slot in self.slots.values() {
            if top.len() == limit {
                break;
            }
            if top.iter().any(|c| c.mv == slot.candidate.mv) {
                continue;
            }
            top.push(slot.candidate.clone());
        }
        top
    }

    /// All candidates in ascending rank order
    pub fn into_candidates(self) -> Vec<CandidateMove> {
        self.slots.into_values().map(|s| s.candidate).collect()
    }
}
