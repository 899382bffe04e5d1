//! Latency summaries and regression checks against a stored baseline.

use crate::benchmark::round_ms;
use crate::error::{GitsemError, GitsemResult};
use serde::{Deserialize, Serialize};

/// Distribution of one suite's samples, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfSummary {
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfSnapshot {
    pub cold: PerfSummary,
    pub warm: PerfSummary,
    pub index_load: PerfSummary,
}

/// Allowed slowdown per metric, in percent of the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionThresholds {
    pub cold_p50_pct: f64,
    pub cold_p95_pct: f64,
    pub warm_p50_pct: f64,
    pub warm_p95_pct: f64,
    pub index_load_p50_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionViolation {
    pub metric: String,
    pub baseline_ms: f64,
    pub current_ms: f64,
    pub allowed_ms: f64,
    pub threshold_pct: f64,
}

pub fn summarise_samples(samples: &[f64]) -> GitsemResult<PerfSummary> {
    if samples.is_empty() {
        return Err(GitsemError::config("cannot summarise an empty sample set"));
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let count = sorted.len();
    let mean = sorted.iter().sum::<f64>() / count as f64;

    // Nearest-rank percentile
    let percentile = |p: f64| {
        let rank = ((p / 100.0) * count as f64).ceil() as isize - 1;
        sorted[rank.clamp(0, count as isize - 1) as usize]
    };

    Ok(PerfSummary {
        count,
        min_ms: round_ms(sorted[0]),
        max_ms: round_ms(sorted[count - 1]),
        mean_ms: round_ms(mean),
        p50_ms: round_ms(percentile(50.0)),
        p95_ms: round_ms(percentile(95.0)),
    })
}

/// Metrics of `current` slower than `baseline` allows.
pub fn find_regression_violations(
    baseline: &PerfSnapshot,
    current: &PerfSnapshot,
    thresholds: &RegressionThresholds,
) -> Vec<RegressionViolation> {
    let checks = [
        ("cold.p50", baseline.cold.p50_ms, current.cold.p50_ms, thresholds.cold_p50_pct),
        ("cold.p95", baseline.cold.p95_ms, current.cold.p95_ms, thresholds.cold_p95_pct),
        ("warm.p50", baseline.warm.p50_ms, current.warm.p50_ms, thresholds.warm_p50_pct),
        ("warm.p95", baseline.warm.p95_ms, current.warm.p95_ms, thresholds.warm_p95_pct),
        (
            "indexLoad.p50",
            baseline.index_load.p50_ms,
            current.index_load.p50_ms,
            thresholds.index_load_p50_pct,
        ),
    ];

    checks
        .into_iter()
        .filter_map(|(metric, baseline_ms, current_ms, threshold_pct)| {
            let allowed_ms = round_ms(baseline_ms * (1.0 + threshold_pct / 100.0));
            (current_ms > allowed_ms).then(|| RegressionViolation {
                metric: metric.to_string(),
                baseline_ms,
                current_ms,
                allowed_ms,
                threshold_pct,
            })
        })
        .collect()
}
