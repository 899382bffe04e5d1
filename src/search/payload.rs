//! The serialisable result of one search.

use crate::ranking::ScoreWeights;
use crate::search::filters::SearchFilters;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    pub rank: usize,
    pub score: f32,
    pub semantic_score: f32,
    pub lexical_score: f32,
    pub recency_score: f32,
    pub hash: String,
    pub date: String,
    pub author: String,
    pub message: String,
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Filters echoed back in the payload; dates as RFC 3339.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub limit: usize,
}

impl PayloadFilters {
    pub fn from_filters(filters: &SearchFilters, limit: usize) -> Self {
        Self {
            author: filters.author.clone(),
            after: filters.after.map(|d| d.to_rfc3339()),
            before: filters.before.map(|d| d.to_rfc3339()),
            file: filters.file.clone(),
            limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPayload {
    pub query: String,
    pub model: String,
    pub format: String,
    pub explain: bool,
    /// Strategy that produced the semantic candidates, e.g. `ann->exact`
    pub strategy: String,
    pub total_indexed_commits: usize,
    pub matched_commits: usize,
    pub returned_results: usize,
    pub score_weights: ScoreWeights,
    pub filters: PayloadFilters,
    pub results: Vec<RankedResult>,
}

impl SearchPayload {
    /// A payload with no results and default weights.
    pub fn empty(query: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            model: model.into(),
            format: "text".to_string(),
            explain: false,
            strategy: "exact".to_string(),
            total_indexed_commits: 0,
            matched_commits: 0,
            returned_results: 0,
            score_weights: ScoreWeights::new(0.75, 0.2, 0.05, true),
            filters: PayloadFilters::default(),
            results: Vec::new(),
        }
    }
}
