//! Engine session: lifecycle and single-search discipline for one engine
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──initialize──▶ Initializing ──uciok+readyok──▶ Ready
//!                                    │                          │  ▲
//!                                 timeout                   search │ bestmove / fallback
//!                                    ▼                          ▼  │
//!                               Terminated ◀──terminate──── Searching
//! ```
//!
//! `Terminated` is absorbing. A closed transport also lands there.
//!
//! # Concurrency
//!
//! Every method takes `&self`. The state machine lives behind a
//! `parking_lot::Mutex` and is never held across an await; the event receiver
//! and the [`ResponseRouter`] live behind an async mutex owned by whichever
//! operation is currently reading engine output. This lets [`EngineSession::cancel`]
//! run while a [`EngineSession::search`] is suspended, and makes a second
//! concurrent `search` fail fast with [`OpponentError::SessionBusy`].
//!
//! # Timeouts
//!
//! | Phase        | Limit                                           | On expiry                         |
//! |--------------|-------------------------------------------------|-----------------------------------|
//! | Handshake    | `startup_timeout`                               | `Terminated`, `EngineStartupFailed` |
//! | Search       | movetime (or `depth_only_budget`) + `search_margin` | `stop`, then grace period      |
//! | After `stop` | `grace_period`                                  | random legal move, degraded       |

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use shakmaty::uci::UciMove;
use shakmaty::{Chess, Move};
use tokio::sync::{mpsc, Notify};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

use crate::candidates::{CandidateAnalyzer, CandidateMove};
use crate::error::{OpponentError, OpponentResult};
use crate::protocol::{decode, encode, EngineCommand, EngineEvent, SearchConstraints};
use crate::router::{Expectation, ResponseRouter, Routed};
use crate::rules;
use crate::transport::EngineChannel;

/// Identifies one search episode within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SearchId(pub u64);

/// Lifecycle state of an [`EngineSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Searching,
    Terminated,
}

/// Timing knobs for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long the `uci`/`isready` handshake may take
    pub startup_timeout: Duration,
    /// Wait for the forced `bestmove` after `stop`
    pub grace_period: Duration,
    /// Slack added to the search's own time budget before `stop` is sent
    pub search_margin: Duration,
    /// Time budget for searches bounded by depth only
    pub depth_only_budget: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(5),
            grace_period: Duration::from_millis(500),
            search_margin: Duration::from_millis(250),
            depth_only_budget: Duration::from_secs(3),
        }
    }
}

/// Why a search result did not come from the engine's own `bestmove`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
    /// Neither the search budget nor the grace period produced a `bestmove`
    Timeout,
    /// Cancelled, and no `bestmove` followed within the grace period
    Cancelled,
    /// The engine answered `bestmove (none)`
    NoBestMove,
    /// The engine's move is not legal in the searched position
    IllegalBestMove,
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DegradedReason::Timeout => "timeout",
            DegradedReason::Cancelled => "cancelled",
            DegradedReason::NoBestMove => "no best move",
            DegradedReason::IllegalBestMove => "illegal best move",
        };
        f.write_str(text)
    }
}

/// Result of one completed search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// The move to play; always legal in the searched position
    pub chosen: Move,
    /// What the engine answered, if anything
    pub best: Option<UciMove>,
    pub ponder: Option<UciMove>,
    /// Ranked candidate lines seen during the search
    pub candidates: Vec<CandidateMove>,
    /// Set when `chosen` is a fallback move
    pub degraded: Option<DegradedReason>,
    pub elapsed: Duration,
}

impl SearchOutcome {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

#[derive(Debug)]
struct ActiveSearch {
    id: SearchId,
    cancel: Arc<Notify>,
    go_sent: bool,
    stop_sent: bool,
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    commands: Option<mpsc::UnboundedSender<String>>,
    next_search: u64,
    active: Option<ActiveSearch>,
    /// Searches whose future was dropped after `go`; settled under the io lock
    orphaned: Vec<SearchId>,
}

impl Inner {
    fn send(&mut self, command: &EngineCommand) -> OpponentResult<()> {
        let Some(commands) = self.commands.as_ref() else {
            return Err(OpponentError::Terminated);
        };
        let line = encode(command);
        debug!("[ENGINE] >> {line}");
        if commands.send(line).is_err() {
            warn!("[ENGINE] Transport closed while sending; terminating session");
            self.terminate_now();
            return Err(OpponentError::TransportClosed);
        }
        Ok(())
    }

    fn terminate_now(&mut self) {
        self.state = SessionState::Terminated;
        self.commands = None;
        if let Some(active) = self.active.as_ref() {
            active.cancel.notify_one();
        }
    }

    /// Send `stop` at most once for the given search
    fn stop_once(&mut self, id: SearchId) -> OpponentResult<()> {
        let pending = match self.active.as_mut() {
            Some(active) if active.id == id && !active.stop_sent => {
                active.stop_sent = true;
                true
            }
            _ => false,
        };
        if pending {
            self.send(&EngineCommand::Stop)?;
        }
        Ok(())
    }
}

/// Puts the session back to `Ready` when a search ends, even if its future
/// is dropped mid-flight
struct SearchGuard<'a> {
    inner: &'a Mutex<Inner>,
    id: SearchId,
    finished: bool,
}

impl Drop for SearchGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        let ours = inner.active.as_ref().is_some_and(|a| a.id == self.id);
        if !self.finished && ours && inner.active.as_ref().is_some_and(|a| a.go_sent) {
            warn!("[ENGINE] Search {:?} dropped mid-flight; stopping it", self.id);
            let _ = inner.stop_once(self.id);
            inner.orphaned.push(self.id);
        }
        if ours {
            inner.active = None;
        }
        if inner.state == SessionState::Searching {
            inner.state = SessionState::Ready;
        }
    }
}

#[derive(Debug)]
struct Io {
    events: mpsc::UnboundedReceiver<String>,
    router: ResponseRouter,
}

impl Io {
    async fn next_routed(&mut self) -> OpponentResult<Routed> {
        let line = self
            .events
            .recv()
            .await
            .ok_or(OpponentError::TransportClosed)?;
        debug!("[ENGINE] << {line}");
        Ok(self.router.route(decode(&line)))
    }

    async fn wait_for(&mut self, expectation: Expectation) -> OpponentResult<()> {
        loop {
            if let Routed::Lifecycle(seen) = self.next_routed().await? {
                if seen == expectation {
                    return Ok(());
                }
            }
        }
    }

    /// Feed progress into `analyzer` until this search's `bestmove` arrives
    async fn collect(
        &mut self,
        id: SearchId,
        analyzer: &mut CandidateAnalyzer,
    ) -> OpponentResult<(Option<UciMove>, Option<UciMove>)> {
        loop {
            match self.next_routed().await? {
                Routed::Progress { search, info } if search == id => analyzer.observe(&info),
                Routed::Finished {
                    search,
                    event: EngineEvent::BestMove { mv, ponder },
                } if search == id => return Ok((mv, ponder)),
                _ => {}
            }
        }
    }
}

enum FirstWait {
    Answered(Option<UciMove>, Option<UciMove>),
    Cancelled,
    TimedOut,
}

/// One engine instance and the channel it speaks over
#[derive(Debug)]
pub struct EngineSession {
    config: SessionConfig,
    inner: Mutex<Inner>,
    io: tokio::sync::Mutex<Io>,
}

impl EngineSession {
    /// Wrap a channel; nothing is sent until [`EngineSession::initialize`]
    pub fn new(channel: EngineChannel, config: SessionConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: SessionState::Uninitialized,
                commands: Some(channel.commands),
                next_search: 0,
                active: None,
                orphaned: Vec::new(),
            }),
            io: tokio::sync::Mutex::new(Io {
                events: channel.events,
                router: ResponseRouter::new(),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn send(&self, command: &EngineCommand) -> OpponentResult<()> {
        self.inner.lock().send(command)
    }

    fn mark_terminated(&self) {
        self.inner.lock().terminate_now();
    }

    /// Hand searches dropped after `go` to the router so their late output is
    /// swallowed
    fn settle_orphans(&self, io: &mut Io) {
        let orphaned = std::mem::take(&mut self.inner.lock().orphaned);
        for id in orphaned {
            io.router.abandon_search(id);
        }
    }

    /// Run the `uci` / `isready` handshake
    ///
    /// A no-op on a session that is already `Ready`. If the handshake does not
    /// finish within `startup_timeout` the session is terminated and
    /// [`OpponentError::EngineStartupFailed`] is returned.
    pub async fn initialize(&self) -> OpponentResult<()> {
        {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Ready => return Ok(()),
                SessionState::Terminated => return Err(OpponentError::Terminated),
                SessionState::Uninitialized => inner.state = SessionState::Initializing,
                state => return Err(OpponentError::NotReady { state }),
            }
        }

        info!("[ENGINE] Starting handshake");
        let mut guard = self.io.lock().await;
        let io = &mut *guard;

        let handshake = async {
            self.send(&EngineCommand::Init)?;
            io.router.expect(Expectation::UciOk);
            io.wait_for(Expectation::UciOk).await?;
            self.send(&EngineCommand::IsReady)?;
            io.router.expect(Expectation::ReadyOk);
            io.wait_for(Expectation::ReadyOk).await
        };
        let result = timeout(self.config.startup_timeout, handshake).await;

        match result {
            Ok(Ok(())) => {
                let mut inner = self.inner.lock();
                if inner.state != SessionState::Initializing {
                    return Err(OpponentError::Terminated);
                }
                inner.state = SessionState::Ready;
                info!("[ENGINE] Engine ready");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("[ENGINE] Handshake failed: {e}");
                self.mark_terminated();
                Err(e)
            }
            Err(_) => {
                io.router.clear_lifecycle();
                let waited = self.config.startup_timeout;
                warn!("[ENGINE] No handshake within {waited:?}; giving up on engine");
                let mut inner = self.inner.lock();
                let _ = inner.send(&EngineCommand::Quit);
                inner.terminate_now();
                Err(OpponentError::EngineStartupFailed { waited })
            }
        }
    }

    fn require_ready(&self) -> OpponentResult<()> {
        match self.state() {
            SessionState::Ready => Ok(()),
            SessionState::Terminated => Err(OpponentError::Terminated),
            state => Err(OpponentError::NotReady { state }),
        }
    }

    /// Send one `setoption` per entry, in the given order
    ///
    /// Options are fire-and-forget; once this returns every line is queued on
    /// the channel ahead of anything sent afterwards.
    pub fn configure(&self, options: &[(String, String)]) -> OpponentResult<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::Ready => {}
            SessionState::Terminated => return Err(OpponentError::Terminated),
            state => return Err(OpponentError::NotReady { state }),
        }
        for (name, value) in options {
            inner.send(&EngineCommand::SetOption {
                name: name.clone(),
                value: value.clone(),
            })?;
        }
        debug!("[ENGINE] Applied {} option(s)", options.len());
        Ok(())
    }

    /// Tell the engine a new game starts and wait until it is ready again
    pub async fn new_game(&self) -> OpponentResult<()> {
        self.require_ready()?;
        let mut guard = self.io.lock().await;
        let io = &mut *guard;
        self.settle_orphans(io);

        let sync = async {
            self.send(&EngineCommand::NewGame)?;
            self.send(&EngineCommand::IsReady)?;
            io.router.expect(Expectation::ReadyOk);
            io.wait_for(Expectation::ReadyOk).await
        };
        let result = timeout(self.config.startup_timeout, sync).await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.mark_terminated();
                Err(e)
            }
            Err(_) => {
                io.router.clear_lifecycle();
                let waited = self.config.startup_timeout;
                warn!("[ENGINE] No readyok after ucinewgame within {waited:?}");
                self.mark_terminated();
                Err(OpponentError::EngineUnresponsive { waited })
            }
        }
    }

    /// Search `position` and return a move that is legal in it
    ///
    /// Progress lines are folded into ranked candidates while waiting. When
    /// the engine never answers, a uniformly random legal move is returned
    /// with [`SearchOutcome::degraded`] set instead of failing.
    ///
    /// # Errors
    ///
    /// - [`OpponentError::GameOver`] when the position is already finished
    ///   (the engine is not contacted)
    /// - [`OpponentError::SessionBusy`] when another search is in flight
    /// - [`OpponentError::TransportClosed`] when the engine went away; the
    ///   session is `Terminated` afterwards
    ///
    /// # Cancel safety
    ///
    /// Dropping the future returns the session to `Ready`. If `go` was already
    /// sent, `stop` goes out and the engine's late `bestmove` is discarded
    /// before the next search reads anything.
    pub async fn search(
        &self,
        position: &Chess,
        constraints: SearchConstraints,
    ) -> OpponentResult<SearchOutcome> {
        let status = rules::game_status(position);
        if status.is_over() {
            return Err(OpponentError::GameOver { status });
        }

        let (id, cancel) = {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Ready => {}
                SessionState::Searching => return Err(OpponentError::SessionBusy),
                SessionState::Terminated => return Err(OpponentError::Terminated),
                state => return Err(OpponentError::NotReady { state }),
            }
            inner.next_search += 1;
            let id = SearchId(inner.next_search);
            let cancel = Arc::new(Notify::new());
            inner.state = SessionState::Searching;
            inner.active = Some(ActiveSearch {
                id,
                cancel: Arc::clone(&cancel),
                go_sent: false,
                stop_sent: false,
            });
            (id, cancel)
        };

        let mut restore = SearchGuard {
            inner: &self.inner,
            id,
            finished: false,
        };
        let result = self.run_search(id, position, constraints, &cancel).await;
        restore.finished = true;
        drop(restore);
        result
    }

    async fn run_search(
        &self,
        id: SearchId,
        position: &Chess,
        constraints: SearchConstraints,
        cancel: &Notify,
    ) -> OpponentResult<SearchOutcome> {
        let started = Instant::now();
        let mut guard = self.io.lock().await;
        let io = &mut *guard;
        self.settle_orphans(io);

        {
            let mut inner = self.inner.lock();
            inner.send(&EngineCommand::Position {
                fen: rules::to_fen(position),
            })?;
            inner.send(&EngineCommand::Go { constraints })?;
            if let Some(active) = inner.active.as_mut() {
                active.go_sent = true;
            }
        }
        io.router.expect(Expectation::BestMove { search: id });
        debug!("[ENGINE] Search {id:?} started");

        let budget = constraints
            .movetime()
            .unwrap_or(self.config.depth_only_budget);
        let deadline = started + budget + self.config.search_margin;
        let mut analyzer = CandidateAnalyzer::new(constraints.multi_pv());

        let first = tokio::select! {
            answer = io.collect(id, &mut analyzer) => match answer {
                Ok((mv, ponder)) => FirstWait::Answered(mv, ponder),
                Err(e) => {
                    self.mark_terminated();
                    return Err(e);
                }
            },
            _ = cancel.notified() => FirstWait::Cancelled,
            _ = sleep_until(deadline) => FirstWait::TimedOut,
        };

        let (best, ponder, missing) = match first {
            FirstWait::Answered(mv, ponder) => (mv, ponder, None),
            interrupted => {
                let reason = match interrupted {
                    FirstWait::Cancelled => DegradedReason::Cancelled,
                    _ => DegradedReason::Timeout,
                };
                if self.state() == SessionState::Terminated {
                    io.router.abandon_search(id);
                    return Err(OpponentError::Terminated);
                }
                match reason {
                    DegradedReason::Cancelled => info!("[ENGINE] Search {id:?} cancelled"),
                    _ => warn!("[ENGINE] Search {id:?} overran {budget:?}; sending stop"),
                }
                let stopped = self.inner.lock().stop_once(id);
                if let Err(e) = stopped {
                    io.router.abandon_search(id);
                    return Err(e);
                }

                let grace = timeout(self.config.grace_period, io.collect(id, &mut analyzer)).await;
                match grace {
                    Ok(Ok((mv, ponder))) => (mv, ponder, None),
                    Ok(Err(e)) => {
                        self.mark_terminated();
                        return Err(e);
                    }
                    Err(_) => {
                        warn!(
                            "[ENGINE] No bestmove within {:?} of stop",
                            self.config.grace_period
                        );
                        io.router.abandon_search(id);
                        (None, None, Some(reason))
                    }
                }
            }
        };

        let (chosen, degraded) = match (&best, missing) {
            (_, Some(reason)) => (self.fallback(position)?, Some(reason)),
            (Some(uci), None) => match rules::resolve_uci(position, uci) {
                Some(mv) => (mv, None),
                None => {
                    warn!("[ENGINE] Engine proposed illegal move {uci}; using fallback");
                    (self.fallback(position)?, Some(DegradedReason::IllegalBestMove))
                }
            },
            (None, None) => {
                warn!("[ENGINE] Engine reported no best move; using fallback");
                (self.fallback(position)?, Some(DegradedReason::NoBestMove))
            }
        };

        let elapsed = started.elapsed();
        debug!(
            "[ENGINE] Search {id:?} chose {} in {elapsed:?}",
            rules::to_uci(&chosen)
        );
        Ok(SearchOutcome {
            chosen,
            best,
            ponder,
            candidates: analyzer.into_candidates(),
            degraded,
            elapsed,
        })
    }

    fn fallback(&self, position: &Chess) -> OpponentResult<Move> {
        rules::random_legal_move(position).ok_or_else(|| OpponentError::GameOver {
            status: rules::game_status(position),
        })
    }

    /// Stop the in-flight search early
    ///
    /// The suspended [`EngineSession::search`] then resolves with whatever
    /// `bestmove` follows, or with a fallback move after the grace period.
    /// Does nothing (and sends nothing) when no search is running.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Searching {
            debug!("[ENGINE] Cancel ignored in state {:?}", inner.state);
            return;
        }
        let Some((id, go_sent, notify)) = inner
            .active
            .as_ref()
            .map(|a| (a.id, a.go_sent, Arc::clone(&a.cancel)))
        else {
            return;
        };
        if go_sent {
            let _ = inner.stop_once(id);
        }
        notify.notify_one();
    }

    /// Send `quit` and release the channel; idempotent
    pub fn terminate(&self) {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Terminated {
            return;
        }
        let _ = inner.send(&EngineCommand::Quit);
        inner.terminate_now();
        info!("[ENGINE] Session terminated");
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.state != SessionState::Terminated {
            if let Some(commands) = inner.commands.take() {
                let _ = commands.send(encode(&EngineCommand::Quit));
            }
        }
    }
}
