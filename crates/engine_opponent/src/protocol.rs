//! Line codec for the UCI engine protocol
//!
//! Stateless encoder/decoder. Every [`EngineCommand`] renders to exactly one
//! line and every raw engine line decodes to exactly one [`EngineEvent`].
//!
//! # Tolerance
//!
//! Decoding never fails. Unknown prefixes become [`EngineEvent::Unrecognized`],
//! and a malformed numeric field inside a recognised line is treated as absent
//! while the rest of the line is still used. Progress lines are high-volume
//! and often truncated when the engine is stopped mid-write, so a partial
//! `info` line is still worth reading.
//!
//! # Wire format
//!
//! | Command                     | Line                                   |
//! |-----------------------------|----------------------------------------|
//! | `Init`                      | `uci`                                  |
//! | `IsReady`                   | `isready`                              |
//! | `NewGame`                   | `ucinewgame`                           |
//! | `SetOption { name, value }` | `setoption name <name> value <value>`  |
//! | `Position { fen }`          | `position fen <fen>`                   |
//! | `Go { constraints }`        | `go [depth N] [movetime N]`            |
//! | `Stop`                      | `stop`                                 |
//! | `Quit`                      | `quit`                                 |

use std::fmt;
use std::time::Duration;

use shakmaty::uci::UciMove;

use crate::error::{OpponentError, OpponentResult};

/// Per-search limits passed with `go`
///
/// At least one of `depth` or `movetime` is always set; an unbounded search
/// cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConstraints {
    depth: Option<u32>,
    movetime: Option<Duration>,
    multi_pv: u32,
}

impl SearchConstraints {
    /// Build constraints, rejecting unbounded searches
    ///
    /// `multi_pv` is clamped to at least 1.
    pub fn new(
        depth: Option<u32>,
        movetime: Option<Duration>,
        multi_pv: u32,
    ) -> OpponentResult<Self> {
        let depth = depth.filter(|d| *d > 0);
        let movetime = movetime.filter(|t| !t.is_zero());
        if depth.is_none() && movetime.is_none() {
            return Err(OpponentError::UnboundedSearch);
        }
        Ok(Self {
            depth,
            movetime,
            multi_pv: multi_pv.max(1),
        })
    }

    /// Constraints bounded by both depth and time
    pub(crate) fn bounded(depth: u32, movetime: Duration, multi_pv: u32) -> Self {
        Self {
            depth: Some(depth.max(1)),
            movetime: Some(movetime),
            multi_pv: multi_pv.max(1),
        }
    }

    pub fn depth(&self) -> Option<u32> {
        self.depth
    }

    pub fn movetime(&self) -> Option<Duration> {
        self.movetime
    }

    pub fn multi_pv(&self) -> u32 {
        self.multi_pv
    }
}

/// Commands sent to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    Init,
    IsReady,
    NewGame,
    SetOption { name: String, value: String },
    Position { fen: String },
    Go { constraints: SearchConstraints },
    Stop,
    Quit,
}

/// Engine evaluation score, from the side to move's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Score {
    Centipawns(i32),
    /// Mate in N moves; negative when the side to move is being mated
    Mate(i32),
}

/// Mate distances beyond this collapse to the same centipawn value
const MAX_MATE_DISTANCE: u32 = 290;

impl Score {
    /// Collapse to centipawns for comparisons. Mates map past any material score.
    pub fn to_cp(self) -> i32 {
        match self {
            Score::Centipawns(cp) => cp,
            Score::Mate(m) => {
                let distance = m.unsigned_abs().min(MAX_MATE_DISTANCE) as i32 * 100;
                if m > 0 {
                    30_000 - distance
                } else {
                    -30_000 + distance
                }
            }
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Centipawns(cp) => write!(f, "{:+.2}", f64::from(*cp) / 100.0),
            Score::Mate(m) if *m > 0 => write!(f, "+M{m}"),
            Score::Mate(m) => write!(f, "-M{}", m.unsigned_abs()),
        }
    }
}

/// Whether an `info` score is exact or only a search-window bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreBound {
    #[default]
    Exact,
    Lower,
    Upper,
}

/// One decoded `info` progress line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoLine {
    /// 1-based MultiPV rank; 1 when the engine omits it
    pub multi_pv: u32,
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub time_ms: Option<u64>,
    pub score: Option<Score>,
    pub bound: ScoreBound,
    pub pv: Vec<UciMove>,
}

impl Default for InfoLine {
    fn default() -> Self {
        Self {
            multi_pv: 1,
            depth: None,
            seldepth: None,
            nodes: None,
            nps: None,
            time_ms: None,
            score: None,
            bound: ScoreBound::Exact,
            pv: Vec::new(),
        }
    }
}

/// Events decoded from engine output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    UciOk,
    ReadyOk,
    /// `id name ...` / `id author ...`
    Id { key: String, value: String },
    Info(InfoLine),
    /// Free-form `info string ...` chatter
    InfoString(String),
    /// Final answer of a search; `mv` is absent for `(none)`, `0000` or garbage
    BestMove {
        mv: Option<UciMove>,
        ponder: Option<UciMove>,
    },
    Unrecognized(String),
}

/// Render a command as one protocol line (without the trailing newline)
pub fn encode(command: &EngineCommand) -> String {
    match command {
        EngineCommand::Init => "uci".to_string(),
        EngineCommand::IsReady => "isready".to_string(),
        EngineCommand::NewGame => "ucinewgame".to_string(),
        EngineCommand::SetOption { name, value } => format!(
            "setoption name {} value {}",
            single_line(name),
            single_line(value)
        ),
        EngineCommand::Position { fen } => format!("position fen {}", single_line(fen)),
        EngineCommand::Go { constraints } => {
            let mut line = String::from("go");
            if let Some(depth) = constraints.depth() {
                line.push_str(&format!(" depth {depth}"));
            }
            if let Some(movetime) = constraints.movetime() {
                line.push_str(&format!(" movetime {}", movetime.as_millis()));
            }
            line
        }
        EngineCommand::Stop => "stop".to_string(),
        EngineCommand::Quit => "quit".to_string(),
    }
}

// The engine tokenises by whitespace; a stray newline would split a command in two.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode one raw engine line
pub fn decode(line: &str) -> EngineEvent {
    let trimmed = line.trim();
    let mut tokens = trimmed.split_whitespace();

    match tokens.next() {
        Some("uciok") => EngineEvent::UciOk,
        Some("readyok") => EngineEvent::ReadyOk,
        Some("bestmove") => {
            let mv = tokens.next().and_then(parse_move);
            let ponder = match tokens.next() {
                Some("ponder") => tokens.next().and_then(parse_move),
                _ => None,
            };
            EngineEvent::BestMove { mv, ponder }
        }
        Some("id") => match tokens.next() {
            Some(key) => EngineEvent::Id {
                key: key.to_string(),
                value: tokens.collect::<Vec<_>>().join(" "),
            },
            None => EngineEvent::Unrecognized(trimmed.to_string()),
        },
        Some("info") => decode_info(trimmed),
        _ => EngineEvent::Unrecognized(trimmed.to_string()),
    }
}

fn parse_move(token: &str) -> Option<UciMove> {
    match token.parse::<UciMove>() {
        Ok(UciMove::Null) | Err(_) => None,
        Ok(mv) => Some(mv),
    }
}

fn decode_info(line: &str) -> EngineEvent {
    let tokens: Vec<&str> = line.split_whitespace().skip(1).collect();
    let mut info = InfoLine::default();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            "string" => {
                let text = tokens[i + 1..].join(" ");
                return EngineEvent::InfoString(text);
            }
            "depth" => {
                info.depth = number(&tokens, i + 1);
                i += 2;
            }
            "seldepth" => {
                info.seldepth = number(&tokens, i + 1);
                i += 2;
            }
            "multipv" => {
                info.multi_pv = number(&tokens, i + 1).filter(|n| *n > 0).unwrap_or(1);
                i += 2;
            }
            "nodes" => {
                info.nodes = number(&tokens, i + 1);
                i += 2;
            }
            "nps" => {
                info.nps = number(&tokens, i + 1);
                i += 2;
            }
            "time" => {
                info.time_ms = number(&tokens, i + 1);
                i += 2;
            }
            "score" => {
                info.score = match tokens.get(i + 1) {
                    Some(&"cp") => number(&tokens, i + 2).map(Score::Centipawns),
                    Some(&"mate") => number(&tokens, i + 2).map(Score::Mate),
                    _ => None,
                };
                i += 3;
                match tokens.get(i) {
                    Some(&"lowerbound") => {
                        info.bound = ScoreBound::Lower;
                        i += 1;
                    }
                    Some(&"upperbound") => {
                        info.bound = ScoreBound::Upper;
                        i += 1;
                    }
                    _ => {}
                }
            }
            "pv" => {
                // pv runs to the end of the line; stop at the first bad token
                info.pv = tokens[i + 1..]
                    .iter()
                    .map_while(|t| parse_move(t))
                    .collect();
                break;
            }
            _ => i += 1,
        }
    }

    EngineEvent::Info(info)
}

fn number<T: std::str::FromStr>(tokens: &[&str], index: usize) -> Option<T> {
    tokens.get(index).and_then(|t| t.parse().ok())
}
