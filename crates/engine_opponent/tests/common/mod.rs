//! Scripted in-process engine for integration tests
//!
//! The fake speaks just enough UCI to drive a session: it answers the
//! handshake, records every command it receives, and replies to each `go`
//! from a queue of [`GoReply`] scripts.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use engine_opponent::{EngineChannel, SessionConfig};
use parking_lot::Mutex;

/// Closes the engine side of the channel when sent as a reply line
pub const CLOSE: &str = "<close>";

/// What the fake engine does for one `go`
#[derive(Debug, Clone, Default)]
pub struct GoReply {
    /// Sent immediately after `go`
    pub lines: Vec<String>,
    /// Sent when `stop` arrives while this search is open
    pub on_stop: Vec<String>,
}

impl GoReply {
    /// Answer straight away with `bestmove <mv>`
    pub fn best(mv: &str) -> Self {
        Self {
            lines: vec![format!("bestmove {mv}")],
            on_stop: Vec::new(),
        }
    }

    /// Never answer, not even to `stop`
    pub fn silent() -> Self {
        Self::default()
    }

    /// Stay quiet until `stop`, then answer `bestmove <mv>`
    pub fn on_stop(mv: &str) -> Self {
        Self {
            lines: Vec::new(),
            on_stop: vec![format!("bestmove {mv}")],
        }
    }

    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            on_stop: Vec::new(),
        }
    }
}

/// Behaviour of the whole fake engine
#[derive(Debug, Clone)]
pub struct Script {
    /// Answer `uci` / `isready`
    pub handshake: bool,
    /// One entry per `go`, consumed in order; an empty queue means silent
    pub replies: Vec<GoReply>,
}

impl Script {
    pub fn replies(replies: Vec<GoReply>) -> Self {
        Self {
            handshake: true,
            replies,
        }
    }

    pub fn mute() -> Self {
        Self {
            handshake: false,
            replies: Vec::new(),
        }
    }
}

/// Commands the fake engine received, in arrival order
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<String>>>);

impl CommandLog {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|l| l.starts_with(prefix))
            .count()
    }

    /// Index of the first command starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.0.lock().iter().position(|l| l.starts_with(prefix))
    }

    fn push(&self, line: &str) {
        self.0.lock().push(line.to_string());
    }
}

/// Spawn the fake engine and return the controller side of its channel
pub fn spawn_engine(script: Script) -> (EngineChannel, CommandLog) {
    let (channel, mut endpoint) = EngineChannel::pair();
    let log = CommandLog::default();
    let seen = log.clone();

    tokio::spawn(async move {
        let mut replies: VecDeque<GoReply> = script.replies.into();
        let mut on_stop: Vec<String> = Vec::new();

        while let Some(command) = endpoint.recv().await {
            seen.push(&command);
            let mut out: Vec<String> = Vec::new();
            match command.split_whitespace().next() {
                Some("uci") if script.handshake => {
                    out.push("id name FakeFish".to_string());
                    out.push("id author Tests".to_string());
                    out.push("uciok".to_string());
                }
                Some("isready") if script.handshake => out.push("readyok".to_string()),
                Some("go") => {
                    let reply = replies.pop_front().unwrap_or_default();
                    out = reply.lines;
                    on_stop = reply.on_stop;
                }
                Some("stop") => out = std::mem::take(&mut on_stop),
                Some("quit") => break,
                _ => {}
            }
            for line in out {
                if line == CLOSE {
                    return;
                }
                if !endpoint.send(line) {
                    return;
                }
            }
        }
    });

    (channel, log)
}

/// Session timings used throughout the tests
pub fn test_config() -> SessionConfig {
    SessionConfig::default()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
