//! Computer opponent controller integration tests
//!
//! End-to-end move requests against the scripted fake engine: lazy startup,
//! option sequencing, kids-mode hints, fallbacks and shutdown.

mod common;

use std::time::Duration;

use common::{init_tracing, spawn_engine, test_config, CommandLog, GoReply, Script};
use engine_opponent::rules::{self, STARTING_FEN};
use engine_opponent::{
    ComputerOpponentController, DegradedReason, DifficultyProfile, OpponentError, SessionState,
};
use shakmaty::{Chess, Square};

const TICK: Duration = Duration::from_millis(1);

fn controller(replies: Vec<GoReply>) -> (ComputerOpponentController, CommandLog) {
    init_tracing();
    let (channel, log) = spawn_engine(Script::replies(replies));
    (ComputerOpponentController::new(channel, test_config()), log)
}

fn start() -> Chess {
    rules::parse_fen(STARTING_FEN).unwrap()
}

fn kids_profile() -> DifficultyProfile {
    DifficultyProfile {
        id: "kids".to_string(),
        skill: 0,
        depth: 1,
        time_ms: 300,
        multi_pv: 3,
        threads: 1,
        kids_mode: true,
    }
}

fn three_lines() -> GoReply {
    GoReply::lines([
        "info depth 1 multipv 1 score cp 40 pv e2e4",
        "info depth 1 multipv 3 score cp 5 pv b1c3",
        "info depth 1 multipv 2 score cp 30 pv d2d4",
        "bestmove e2e4",
    ])
}

// ============================================================================
// Move requests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_kids_profile_on_starting_position() {
    //! Beginner profile on the opening position
    //!
    //! Returns a legal move inside the time budget, an empty threat set
    //! (nothing can be captured yet) and up to three ranked candidates.
    let (controller, _log) = controller(vec![three_lines()]);
    let position = start();
    let config = test_config();

    let reply = controller
        .request_move(&position, &kids_profile())
        .await
        .unwrap();

    assert!(rules::legal_moves(&position).contains(&reply.chosen));
    assert_eq!(reply.uci.to_string(), "e2e4");
    let budget = Duration::from_millis(300) + config.search_margin + config.grace_period;
    assert!(reply.elapsed <= budget);

    let threats = reply.threats.expect("kids mode computes threats");
    assert!(threats.is_empty());

    let candidates = reply.candidates.expect("kids mode attaches candidates");
    assert!(candidates.len() <= 3);
    let ranks: Vec<u32> = candidates.iter().map(|c| c.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_request_sequences_handshake_options_then_search() {
    let (controller, log) = controller(vec![GoReply::best("e2e4")]);

    controller
        .request_move(&start(), &kids_profile())
        .await
        .unwrap();

    let lines = log.lines();
    assert_eq!(
        &lines[..6],
        &[
            "uci",
            "isready",
            "setoption name Skill Level value 0",
            "setoption name Depth Limit value 1",
            "setoption name Threads value 1",
            "setoption name MultiPV value 3",
        ]
    );
    assert!(lines[6].starts_with("position fen rnbqkbnr/pppppppp"));
    assert_eq!(lines[7], "go depth 1 movetime 300");
}

#[tokio::test(start_paused = true)]
async fn test_handshake_runs_once_across_requests() {
    let (controller, log) = controller(vec![GoReply::best("e2e4"), GoReply::best("g8f6")]);

    controller
        .request_move(&start(), &kids_profile())
        .await
        .unwrap();
    let after_e4 =
        rules::parse_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1").unwrap();
    let reply = controller
        .request_move(&after_e4, &kids_profile())
        .await
        .unwrap();

    assert_eq!(reply.uci.to_string(), "g8f6");
    assert_eq!(log.count("uci"), 1);
    assert_eq!(log.count("setoption name Skill Level"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_non_kids_profile_has_no_hints() {
    let (controller, _log) = controller(vec![three_lines()]);
    let rook = DifficultyProfile::preset("rook").unwrap();

    let reply = controller.request_move(&start(), &rook).await.unwrap();

    assert!(reply.candidates.is_none());
    assert!(reply.threats.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_illegal_candidates_are_filtered_from_hints() {
    let reply = GoReply::lines([
        "info depth 2 multipv 1 score cp 40 pv e2e4",
        "info depth 2 multipv 2 score cp 30 pv e2e5",
        "bestmove e2e4",
    ]);
    let (controller, _log) = controller(vec![reply]);

    let reply = controller
        .request_move(&start(), &kids_profile())
        .await
        .unwrap();

    let moves: Vec<String> = reply
        .candidates
        .unwrap()
        .iter()
        .map(|c| c.mv.to_string())
        .collect();
    assert_eq!(moves, vec!["e2e4"]);
}

#[tokio::test(start_paused = true)]
async fn test_threats_reported_for_hanging_piece() {
    //! Black to move with the d5 pawn attacked by e4
    let (controller, _log) = controller(vec![GoReply::best("d5e4")]);
    let position =
        rules::parse_fen("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 2").unwrap();

    let reply = controller
        .request_move(&position, &kids_profile())
        .await
        .unwrap();

    let threats = reply.threats.unwrap();
    assert!(threats.contains(Square::D5));
    assert_eq!(reply.uci.to_string(), "d5e4");
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_profile_is_clamped() {
    let (controller, log) = controller(vec![GoReply::best("e2e4")]);
    let wild = DifficultyProfile {
        skill: 50,
        depth: 0,
        multi_pv: 9,
        ..kids_profile()
    };

    controller.request_move(&start(), &wild).await.unwrap();

    assert_eq!(log.count("setoption name Skill Level value 20"), 1);
    assert_eq!(log.count("setoption name MultiPV value 5"), 1);
    assert_eq!(log.count("go depth 1 movetime 300"), 1);
}

// ============================================================================
// Fallbacks and failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_unresponsive_engine_still_moves_legally() {
    let positions = [
        STARTING_FEN,
        "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2",
        "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1",
        "7k/8/8/8/8/8/1q6/K7 w - - 0 1",
    ];
    let (controller, _log) = controller(vec![GoReply::silent(); positions.len()]);

    for fen in positions {
        let position = rules::parse_fen(fen).unwrap();
        let reply = controller
            .request_move(&position, &kids_profile())
            .await
            .unwrap();
        assert!(rules::legal_moves(&position).contains(&reply.chosen), "{fen}");
        assert_eq!(reply.degraded, Some(DegradedReason::Timeout));
    }
}

#[tokio::test(start_paused = true)]
async fn test_game_over_does_not_touch_engine() {
    let (controller, log) = controller(vec![]);
    let stalemate = rules::parse_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();

    let err = controller
        .request_move(&stalemate, &kids_profile())
        .await
        .unwrap_err();

    assert!(matches!(err, OpponentError::GameOver { .. }));
    tokio::time::sleep(TICK).await;
    assert!(log.lines().is_empty());
    assert_eq!(controller.state(), SessionState::Uninitialized);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_fen_is_rejected() {
    let (controller, _log) = controller(vec![]);

    let err = controller
        .request_move_fen("not a position", &kids_profile())
        .await
        .unwrap_err();

    assert!(matches!(err, OpponentError::InvalidFen { .. }));
}

// ============================================================================
// Cancellation, concurrency and shutdown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_pending_cuts_request_short() {
    let (controller, _log) = controller(vec![GoReply::on_stop("d2d4")]);
    let slow = DifficultyProfile {
        time_ms: 10_000,
        ..kids_profile()
    };

    let start_pos = start();
    let (reply, _) = tokio::join!(controller.request_move(&start_pos, &slow), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.cancel_pending();
    });

    let reply = reply.unwrap();
    assert_eq!(reply.uci.to_string(), "d2d4");
    assert!(reply.elapsed < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_request_does_not_wedge_controller() {
    //! The caller gives up on a hung request; the next request still moves
    let (controller, log) = controller(vec![GoReply::silent(), GoReply::best("e2e4")]);
    let position = start();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(100),
        controller.request_move(&position, &kids_profile()),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(controller.state(), SessionState::Ready);

    let reply = controller
        .request_move(&position, &kids_profile())
        .await
        .unwrap();
    assert!(rules::legal_moves(&position).contains(&reply.chosen));
    assert_eq!(log.count("go"), 2);
    assert_eq!(controller.state(), SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_are_serialised() {
    //! Two overlapping callers both get a move instead of SessionBusy
    let (controller, log) = controller(vec![GoReply::best("e2e4"), GoReply::best("d2d4")]);
    let position = start();
    let profile = kids_profile();

    let (first, second) = tokio::join!(
        controller.request_move(&position, &profile),
        controller.request_move(&position, &profile),
    );

    assert_eq!(first.unwrap().uci.to_string(), "e2e4");
    assert_eq!(second.unwrap().uci.to_string(), "d2d4");
    assert_eq!(log.count("go"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_is_final_and_idempotent() {
    let (controller, log) = controller(vec![GoReply::best("e2e4")]);
    controller
        .request_move(&start(), &kids_profile())
        .await
        .unwrap();

    controller.dispose();
    controller.dispose();
    tokio::time::sleep(TICK).await;

    assert_eq!(controller.state(), SessionState::Terminated);
    assert_eq!(log.count("quit"), 1);
    assert_eq!(
        controller
            .request_move(&start(), &kids_profile())
            .await
            .unwrap_err(),
        OpponentError::Terminated
    );
}
