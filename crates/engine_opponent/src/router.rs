//! Routing of decoded engine events to whoever is waiting for them
//!
//! The router keeps a queue of pending expectations, each created by a
//! command the session sent. Lifecycle acknowledgements (`uciok`, `readyok`)
//! satisfy the oldest matching lifecycle waiter; `info` and `bestmove` belong
//! to the active search.
//!
//! The router does not assume any ordering among `info` lines. It only relies
//! on two facts: a `bestmove` ends the current search, and the engine answers
//! commands in the order it received them. A search that was abandoned
//! without its `bestmove` therefore leaves one `bestmove` owed by the engine;
//! everything up to and including that late `bestmove` is discarded so it can
//! never be applied to a newer search.
//!
//! An engine that drops a `bestmove` altogether would otherwise make every
//! later search lose its own answer. When a search is abandoned after the only
//! `bestmove` it saw was swallowed as stale, that line is taken to have been
//! its answer and the debt is not carried forward.

use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use crate::protocol::{EngineEvent, InfoLine};
use crate::session::SearchId;

/// What a sent command is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    UciOk,
    ReadyOk,
    BestMove { search: SearchId },
}

/// Why an event was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Belongs to a search that already timed out or was abandoned
    StaleSearch,
    /// Nobody was waiting for this kind of event
    Unexpected,
}

/// Outcome of routing one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// A lifecycle waiter was satisfied
    Lifecycle(Expectation),
    /// Progress for the active search
    Progress { search: SearchId, info: InfoLine },
    /// The active search finished
    Finished {
        search: SearchId,
        event: EngineEvent,
    },
    Discarded(DiscardReason),
    /// Chatter with no routing meaning (`id`, `info string`, unknown lines)
    Ignored,
}

/// Matches engine events to pending expectations
#[derive(Debug, Default)]
pub struct ResponseRouter {
    pending: VecDeque<Expectation>,
    owed_bestmoves: usize,
    /// Search that was active when a stale `bestmove` was last swallowed
    swallowed_during: Option<SearchId>,
}

impl ResponseRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for a command that was just sent
    pub fn expect(&mut self, expectation: Expectation) {
        self.pending.push_back(expectation);
    }

    /// The search currently waiting for a `bestmove`, if any
    pub fn active_search(&self) -> Option<SearchId> {
        self.pending.iter().find_map(|e| match e {
            Expectation::BestMove { search } => Some(*search),
            _ => None,
        })
    }

    /// Give up on a search whose `bestmove` never arrived
    ///
    /// The engine still owes that `bestmove`; it will be discarded on arrival.
    pub fn abandon_search(&mut self, search: SearchId) {
        let before = self.pending.len();
        self.pending
            .retain(|e| *e != Expectation::BestMove { search });
        if self.pending.len() == before {
            return;
        }
        if self.swallowed_during == Some(search) {
            self.swallowed_during = None;
            warn!(
                "[ROUTER] Search {search:?} only saw a stale bestmove; \
                 assuming the engine dropped one and resyncing"
            );
            return;
        }
        self.owed_bestmoves += 1;
        debug!(
            "[ROUTER] Abandoned search {search:?}; {} bestmove(s) owed",
            self.owed_bestmoves
        );
    }

    /// Drop lifecycle waiters that timed out
    pub fn clear_lifecycle(&mut self) {
        self.pending
            .retain(|e| matches!(e, Expectation::BestMove { .. }));
    }

    /// Number of late `bestmove` lines still to be swallowed
    pub fn owed_bestmoves(&self) -> usize {
        self.owed_bestmoves
    }

    pub fn route(&mut self, event: EngineEvent) -> Routed {
        match event {
            EngineEvent::UciOk => self.satisfy_lifecycle(Expectation::UciOk),
            EngineEvent::ReadyOk => self.satisfy_lifecycle(Expectation::ReadyOk),
            EngineEvent::Info(info) => {
                if self.owed_bestmoves > 0 {
                    trace!("[ROUTER] Discarding info from stale search");
                    return Routed::Discarded(DiscardReason::StaleSearch);
                }
                match self.active_search() {
                    Some(search) => Routed::Progress { search, info },
                    None => {
                        trace!("[ROUTER] Discarding info with no active search");
                        Routed::Discarded(DiscardReason::Unexpected)
                    }
                }
            }
            event @ EngineEvent::BestMove { .. } => {
                if self.owed_bestmoves > 0 {
                    self.owed_bestmoves -= 1;
                    self.swallowed_during = self.active_search();
                    debug!("[ROUTER] Discarding late bestmove from abandoned search");
                    return Routed::Discarded(DiscardReason::StaleSearch);
                }
                let Some(search) = self.active_search() else {
                    debug!("[ROUTER] Discarding bestmove with no active search");
                    return Routed::Discarded(DiscardReason::Unexpected);
                };
                self.pending
                    .retain(|e| *e != Expectation::BestMove { search });
                Routed::Finished { search, event }
            }
            EngineEvent::Id { .. } | EngineEvent::InfoString(_) => Routed::Ignored,
            EngineEvent::Unrecognized(line) => {
                trace!("[ROUTER] Ignoring unrecognized line: {line}");
                Routed::Ignored
            }
        }
    }

    fn satisfy_lifecycle(&mut self, expectation: Expectation) -> Routed {
        match self.pending.iter().position(|e| *e == expectation) {
            Some(index) => {
                self.pending.remove(index);
                Routed::Lifecycle(expectation)
            }
            None => {
                debug!("[ROUTER] Unexpected {expectation:?}");
                Routed::Discarded(DiscardReason::Unexpected)
            }
        }
    }
}
