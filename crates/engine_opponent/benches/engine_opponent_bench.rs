//! Opponent Hot-Path Benchmarks
//!
//! Line decoding and candidate folding run for every `info` line the engine
//! prints, and threat hints are computed once per kids-mode move.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use engine_opponent::protocol::{decode, EngineEvent};
use engine_opponent::rules::{parse_fen, STARTING_FEN};
use engine_opponent::{compute_threats, CandidateAnalyzer};

const INFO_LINE: &str = "info depth 18 seldepth 27 multipv 2 score cp -35 nodes 1843221 nps 1520000 time 1212 pv e7e5 g1f3 b8c6 f1b5 a7a6 b5a4 g8f6 e1g1";

const MIDDLEGAME: &str = "r1bq1rk1/pp2bppp/2n1pn2/3p4/2PP4/2N1PN2/PP3PPP/R2QKB1R w KQ - 2 9";

fn bench_decode_info(c: &mut Criterion) {
    c.bench_function("decode_info_line", |b| {
        b.iter(|| black_box(decode(black_box(INFO_LINE))))
    });
}

fn bench_decode_bestmove(c: &mut Criterion) {
    c.bench_function("decode_bestmove", |b| {
        b.iter(|| black_box(decode(black_box("bestmove e2e4 ponder e7e5"))))
    });
}

fn bench_candidate_folding(c: &mut Criterion) {
    let lines: Vec<_> = (1..=20)
        .flat_map(|depth| {
            (1..=3).filter_map(move |rank| {
                match decode(&format!(
                    "info depth {depth} multipv {rank} score cp {} pv e2e4 e7e5",
                    depth * rank
                )) {
                    EngineEvent::Info(info) => Some(info),
                    _ => None,
                }
            })
        })
        .collect();

    c.bench_function("candidate_folding_60_lines", |b| {
        b.iter(|| {
            let mut analyzer = CandidateAnalyzer::new(3);
            for info in &lines {
                analyzer.observe(info);
            }
            black_box(analyzer.top_n(3))
        })
    });
}

fn bench_threats(c: &mut Criterion) {
    let opening = parse_fen(STARTING_FEN).unwrap();
    let middlegame = parse_fen(MIDDLEGAME).unwrap();

    c.bench_function("threats_starting_position", |b| {
        b.iter(|| black_box(compute_threats(&opening)))
    });
    c.bench_function("threats_middlegame", |b| {
        b.iter(|| black_box(compute_threats(&middlegame)))
    });
}

criterion_group!(
    benches,
    bench_decode_info,
    bench_decode_bestmove,
    bench_candidate_folding,
    bench_threats,
);
criterion_main!(benches);
