//! `kidschess` - ask the computer opponent for one move
//!
//! ```text
//! kidschess --engine /usr/bin/stockfish --profile pawn \
//!     --fen "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
//! ```
//!
//! Prints the move report as JSON on stdout; logs go to stderr and are
//! filtered with `RUST_LOG` (default `info`). Ctrl-C cancels the search and
//! still prints whatever move the opponent settled on.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use engine_opponent::STARTING_FEN;
use kidschess::core::{load_settings, settings_path};
use kidschess::game::AiOpponent;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kidschess", version, about = "Computer opponent for KidsChess")]
struct Cli {
    /// UCI engine binary (overrides the settings file)
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Position to move in, as FEN
    #[arg(long, default_value = STARTING_FEN)]
    fen: String,

    /// Difficulty profile id (defaults to the settings' default profile)
    #[arg(long)]
    profile: Option<String>,

    /// Settings file (defaults to the platform config directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Print the available difficulty profiles and exit
    #[arg(long)]
    list_profiles: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let path = cli.settings.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings(&path);
    if let Some(engine) = cli.engine {
        settings.engine_path = engine;
    }

    if cli.list_profiles {
        let profiles = settings.available_profiles();
        println!("{}", serde_json::to_string_pretty(&profiles)?);
        return Ok(());
    }

    info!("[AI] Using engine {:?}", settings.engine_path);
    let opponent = AiOpponent::new(settings);

    let request = opponent.request_move(&cli.fen, cli.profile.as_deref());
    tokio::pin!(request);
    let result = tokio::select! {
        result = &mut request => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("[AI] Interrupted; cancelling search");
            opponent.cancel_pending();
            request.await
        }
    };

    let report = result.context("computer opponent failed to move")?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    opponent.shutdown();
    Ok(())
}
