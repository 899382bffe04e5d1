//! Hybrid score model: semantic, lexical and recency signals blended by weight.

use crate::error::{GitsemError, GitsemResult};
use crate::types::parse_commit_date;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_DAY: f64 = 1000.0 * 60.0 * 60.0 * 24.0;

/// Decay constant of the recency signal, in days.
pub const RECENCY_DECAY_DAYS: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreWeights {
    pub semantic: f32,
    pub lexical: f32,
    pub recency: f32,
    pub recency_boost_enabled: bool,
}

impl ScoreWeights {
    pub fn new(semantic: f32, lexical: f32, recency: f32, recency_boost_enabled: bool) -> Self {
        Self {
            semantic,
            lexical,
            recency,
            recency_boost_enabled,
        }
    }
}

/// Scale the weights to sum to 1. The boost flag passes through unchanged.
pub fn normalise_weights(weights: ScoreWeights) -> GitsemResult<ScoreWeights> {
    let total = weights.semantic + weights.lexical + weights.recency;
    if total.is_nan() || total <= 0.0 {
        return Err(GitsemError::config(
            "At least one search weight must be greater than zero.",
        ));
    }
    Ok(ScoreWeights {
        semantic: weights.semantic / total,
        lexical: weights.lexical / total,
        recency: weights.recency / total,
        recency_boost_enabled: weights.recency_boost_enabled,
    })
}

pub fn combine_scores(semantic: f32, lexical: f32, recency: f32, weights: &ScoreWeights) -> f32 {
    semantic * weights.semantic + lexical * weights.lexical + recency * weights.recency
}

/// `exp(-age_days / 365)`, or 1 for commits dated now or later.
///
/// Unparseable dates score 0.
pub fn recency_score(date: &str) -> f32 {
    recency_score_at(date, Utc::now())
}

pub fn recency_score_at(date: &str, now: DateTime<Utc>) -> f32 {
    let Some(date) = parse_commit_date(date) else {
        return 0.0;
    };
    let age_ms = (now.timestamp_millis() - date.timestamp_millis()) as f64;
    if age_ms <= 0.0 {
        return 1.0;
    }
    (-(age_ms / MILLIS_PER_DAY) / RECENCY_DECAY_DAYS).exp() as f32
}
