//! Per-payload cost of the scan loop between decode and login: ticket extraction and the
//! dedup decision.

use criterion::{Criterion, criterion_group, criterion_main};
use magicmimi::services::{DedupGate, TicketExtractor};
use std::hint::black_box;
use std::time::{Duration, Instant};

const GAME_PAYLOAD: &str = "https://user.mihoyo.com/qr_code_in_game.html?app_id=4&app_name=%E5%8E%9F%E7%A5%9E&bbs=true&biz_key=hk4e_cn&expire=1700000000&ticket=6552e4a1d2c5f30013b1f1a2";
const FOREIGN_PAYLOAD: &str = "https://example.com/menu?table=12&lang=en";

fn bench_extract(c: &mut Criterion) {
    let extractor = TicketExtractor::new();

    let mut group = c.benchmark_group("extract");
    group.bench_function("game_payload", |b| {
        b.iter(|| extractor.extract(black_box(GAME_PAYLOAD)))
    });
    group.bench_function("foreign_payload", |b| {
        b.iter(|| extractor.extract(black_box(FOREIGN_PAYLOAD)))
    });
    group.finish();
}

fn bench_dedup(c: &mut Criterion) {
    let now = Instant::now();

    c.bench_function("dedup_repeat_suppressed", |b| {
        let mut gate = DedupGate::new(Duration::from_secs(5));
        gate.admit("6552e4a1d2c5f30013b1f1a2", now);
        b.iter(|| gate.admit(black_box("6552e4a1d2c5f30013b1f1a2"), now))
    });

    c.bench_function("dedup_rotating_tickets", |b| {
        let mut gate = DedupGate::new(Duration::from_secs(5));
        let tickets = ["aa01", "bb02", "cc03"];
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % tickets.len();
            gate.admit(black_box(tickets[i]), now)
        })
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let extractor = TicketExtractor::new();
    let now = Instant::now();

    c.bench_function("extract_then_admit", |b| {
        let mut gate = DedupGate::new(Duration::from_secs(5));
        b.iter(|| {
            extractor
                .extract(black_box(GAME_PAYLOAD))
                .map(|ticket| gate.admit(ticket, now))
        })
    });
}

criterion_group!(benches, bench_extract, bench_dedup, bench_pipeline);
criterion_main!(benches);
