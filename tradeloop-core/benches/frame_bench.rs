//! Criterion benchmarks for the per-poll hot path.
//!
//! Every poll recomputes all frames from scratch, so these bound the cycle cost:
//! 1. Indicator frame computation (single indicators and a full preset plan)
//! 2. Signal evaluation over prebuilt frames
//! 3. M1 → higher-timeframe resampling

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tradeloop_core::components::{FramePlan, Indicator, MarketFrames};
use tradeloop_core::domain::{resample, Candle, InstrumentSpec, Quote, Timeframe};
use tradeloop_core::indicators::{Adx, Atr, Ema, Rsi, UtBot};
use tradeloop_core::signal::{preset, EvalContext, SignalEvaluator};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_candles(n: usize, timeframe: Timeframe) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = 1.1 + (i as f64 * 0.05).sin() * 0.0040;
            Candle {
                open_time: start + Duration::minutes(i as i64 * timeframe.minutes()),
                open: close - 0.0001,
                high: close + 0.0006,
                low: close - 0.0006,
                close,
                tick_volume: 100 + (i as u64 % 50),
            }
        })
        .collect()
}

// ── 1. Frames ────────────────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicator_compute");

    for &count in &[300, 1_000, 5_000] {
        let candles = make_candles(count, Timeframe::M5);
        group.bench_with_input(BenchmarkId::new("ema_50", count), &count, |b, _| {
            let ema = Ema::new(50);
            b.iter(|| ema.compute(black_box(&candles)))
        });
        group.bench_with_input(BenchmarkId::new("adx_14", count), &count, |b, _| {
            let adx = Adx::new(14);
            b.iter(|| adx.compute(black_box(&candles)))
        });
        group.bench_with_input(BenchmarkId::new("ut_bot_1_10", count), &count, |b, _| {
            let ut = UtBot::position(1.0, 10, true);
            b.iter(|| ut.compute(black_box(&candles)))
        });
    }

    group.finish();
}

fn bench_frame_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_plan");

    let mut plan = FramePlan::new();
    plan.require(Timeframe::M5, Atr::new(14));
    plan.require(Timeframe::M5, Rsi::new(14));
    plan.require(Timeframe::M5, Adx::new(14));
    plan.require(Timeframe::M5, Adx::plus_di(14));
    plan.require(Timeframe::M5, Adx::minus_di(14));
    plan.require(Timeframe::M5, Ema::new(9));
    plan.require(Timeframe::M5, Ema::new(21));
    let candles = make_candles(300, Timeframe::M5);

    group.bench_function("build_m5_300_7_indicators", |b| {
        b.iter(|| plan.build(Timeframe::M5, black_box(candles.clone())))
    });

    group.finish();
}

// ── 2. Evaluation ────────────────────────────────────────────────────

fn bench_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluation");

    for name in ["donchian_breakout", "ema_crossover", "ut_bot"] {
        let Some(config) = preset(name, "EURUSD") else {
            continue;
        };
        let Ok(evaluator) = SignalEvaluator::new(config) else {
            continue;
        };
        let mut plan = FramePlan::new();
        evaluator.register(&mut plan);
        let mut frames = MarketFrames::new();
        for timeframe in plan.timeframes() {
            frames.insert(plan.build(timeframe, make_candles(300, timeframe)));
        }
        let instrument = InstrumentSpec::forex_major("EURUSD");
        let quote = Quote {
            time: Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap(),
            bid: 1.1,
            ask: 1.10012,
        };

        group.bench_function(name, |b| {
            b.iter(|| {
                evaluator.evaluate(black_box(&EvalContext {
                    frames: &frames,
                    quote: &quote,
                    instrument: &instrument,
                }))
            })
        });
    }

    group.finish();
}

// ── 3. Resampling ────────────────────────────────────────────────────

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("resample");
    let m1 = make_candles(10_080, Timeframe::M1);

    for timeframe in [Timeframe::M5, Timeframe::H1] {
        group.bench_function(format!("m1_week_to_{timeframe}"), |b| {
            b.iter(|| resample(black_box(&m1), timeframe))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_indicators,
    bench_frame_plan,
    bench_evaluation,
    bench_resample
);
criterion_main!(benches);
