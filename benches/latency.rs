//! Report path latency: classify, decode and run the gesture timer for one
//! report, the work done for every report the controller sends.

use std::hint::black_box;
use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion};
use procond::gesture::{GestureDetector, HomeTimer};
use procond::input::{decode_full, decode_simple, DecodePolicy, GyroTrigger, Mode};
use procond::protocol::{decode, report_tag, Command, Framing, RawReport, ReportMode};
use procond::rumble::encode_rumble;

fn full_report() -> Vec<u8> {
    let mut report = vec![0u8; 49];
    report[0] = report_tag::INPUT_FULL;
    report[3] = 0x48;
    report[6..12].copy_from_slice(&[0x00, 0x08, 0x80, 0x00, 0x08, 0x80]);
    report[13..17].copy_from_slice(&[0x10, 0x00, 0xF0, 0xFF]);
    report
}

fn simple_report() -> Vec<u8> {
    let mut report = vec![report_tag::INPUT_SIMPLE, 0x02, 0x10, 0x08];
    for _ in 0..4 {
        report.extend_from_slice(&0x7FFFu16.to_le_bytes());
    }
    report
}

fn benchmark_report_path(c: &mut Criterion) {
    let detector = GestureDetector::default();
    let now = Instant::now();

    let full = full_report();
    let gyro_policy = DecodePolicy {
        mode: Mode::Gyro,
        gyro_trigger: GyroTrigger::Right,
        ..Default::default()
    };
    c.bench_function("full report (gyro fusion)", |b| {
        b.iter(|| {
            if let Ok(RawReport::InputFull(payload)) = decode(Framing::Raw, black_box(&full)) {
                let event = decode_full(&payload, &gyro_policy);
                black_box(detector.update(HomeTimer::Released, &event, now));
            }
        });
    });

    let simple = simple_report();
    let policy = DecodePolicy::default();
    c.bench_function("simple report", |b| {
        b.iter(|| {
            if let Ok(RawReport::InputSimple(payload)) = decode(Framing::Raw, black_box(&simple)) {
                let event = decode_simple(&payload, &policy);
                black_box(detector.update(HomeTimer::HeldSince(now), &event, now));
            }
        });
    });
}

fn benchmark_encoding(c: &mut Criterion) {
    c.bench_function("encode wrapped SetMode", |b| {
        b.iter(|| black_box(Command::SetMode(ReportMode::Full).encode(black_box(Framing::Wrapped))));
    });

    c.bench_function("encode rumble", |b| {
        b.iter(|| black_box(encode_rumble(black_box(30_000), black_box(12_345))));
    });
}

criterion_group!(benches, benchmark_report_path, benchmark_encoding);
criterion_main!(benches);
