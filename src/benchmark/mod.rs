//! Ranking micro-benchmarks and latency guardrails.
//!
//! [`benchmark_ranking`] times the heap selector against a full sort on a
//! real candidate set. [`history`] keeps a JSONL log of runs and
//! [`guardrails`] compares latency snapshots against a baseline.

pub mod guardrails;
pub mod history;

pub use guardrails::{
    PerfSnapshot, PerfSummary, RegressionThresholds, RegressionViolation,
    find_regression_violations, summarise_samples,
};
pub use history::{
    BenchmarkHistoryEntry, HISTORY_DISPLAY_LIMIT, append_history, load_history,
    render_history_summary,
};

use crate::error::{GitsemError, GitsemResult};
use crate::topk::{full_sort_top_k, select_top_k};
use serde::Serialize;
use std::hint::black_box;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingBenchmark {
    pub baseline_ms: f64,
    pub optimised_ms: f64,
    /// Infinite when the heap run rounds to zero.
    pub speedup: f64,
}

pub(crate) fn round_ms(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn millis(elapsed: Duration) -> f64 {
    round_ms(elapsed.as_secs_f64() * 1000.0)
}

/// Run both selectors `iterations` times over `items`.
pub fn benchmark_ranking<T, F>(
    items: &[T],
    limit: usize,
    iterations: usize,
    score: F,
) -> GitsemResult<RankingBenchmark>
where
    F: Fn(&T) -> f32,
{
    if iterations == 0 {
        return Err(GitsemError::config("iterations must be greater than zero"));
    }

    let start = Instant::now();
    for _ in 0..iterations {
        black_box(full_sort_top_k(items.iter(), limit, |item| score(item)));
    }
    let baseline_ms = millis(start.elapsed());

    let start = Instant::now();
    for _ in 0..iterations {
        black_box(select_top_k(items.iter(), limit, |item| score(item)));
    }
    let optimised_ms = millis(start.elapsed());

    let speedup = if optimised_ms > 0.0 {
        baseline_ms / optimised_ms
    } else {
        f64::INFINITY
    };
    tracing::debug!(baseline_ms, optimised_ms, speedup, iterations, "ranking benchmark");

    Ok(RankingBenchmark {
        baseline_ms,
        optimised_ms,
        speedup,
    })
}
