//! Simulator hot-loop benchmark over a synthetic trading day.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use orblab_core::costs::{ContractSpec, CostBook, FrictionSchedule, InstrumentCosts};
use orblab_core::domain::{InstrumentId, MinuteBar, OpeningRange, StopMode};
use orblab_core::sim::{simulate, SimParams};

fn synthetic_day() -> (OpeningRange, Vec<MinuteBar>, SimParams, CostBook) {
    let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    let range = OpeningRange::new(date, "MES".into(), "w".into(), 5102.0, 5100.0).unwrap();

    // One full session of minute bars drifting upward with oscillation.
    let start = date.and_hms_opt(9, 45, 0).unwrap();
    let bars: Vec<MinuteBar> = (0..375)
        .map(|i| {
            let ts = start + Duration::minutes(i);
            let drift = i as f64 * 0.01;
            let wave = (i as f64 * 0.7).sin() * 0.8;
            let close = 5102.5 + drift + wave;
            MinuteBar {
                instrument: "MES".into(),
                ts_utc: Utc.from_utc_datetime(&(ts + Duration::hours(5))),
                ts_local: ts,
                open: close - 0.25,
                high: close + 0.75,
                low: close - 0.75,
                close,
                volume: 500,
            }
        })
        .collect();

    let params = SimParams {
        stop_mode: StopMode::Full,
        target_r: 2.0,
        entry_slippage: 0.25,
        tick_size: 0.25,
        scan_end: date.and_hms_opt(16, 0, 0).unwrap(),
    };

    let mut instruments = BTreeMap::new();
    instruments.insert(
        InstrumentId::from("MES"),
        InstrumentCosts {
            contract: ContractSpec {
                tick_size: 0.25,
                tick_value: 2.5,
            },
            friction: FrictionSchedule {
                commission: 2.5,
                slippage: 2.5,
                spread: 2.4,
            },
        },
    );
    let book = CostBook {
        version: "bench".to_string(),
        instruments,
    };

    (range, bars, params, book)
}

fn bench_simulate(c: &mut Criterion) {
    let (range, bars, params, book) = synthetic_day();
    c.bench_function("simulate_full_session", |b| {
        b.iter(|| {
            let result = simulate(
                black_box(&range),
                black_box(&bars),
                black_box(&params),
                black_box(&book),
            );
            black_box(result)
        })
    });
}

criterion_group!(benches, bench_simulate);
criterion_main!(benches);
