//! Hybrid search: filter, semantic candidates, BM25 and recency re-rank,
//! heap top-K.

use crate::config::{AnnConfig, Settings};
use crate::error::{GitsemError, GitsemResult};
use crate::git::CommitSource;
use crate::lexical::{LexicalCacheStore, bm25_scores};
use crate::plugins::{HookData, PluginRegistry, ScoringSignal};
use crate::ranking::{ScoreWeights, combine_scores, normalise_weights, recency_score};
use crate::search::filters::SearchFilters;
use crate::search::format::OutputFormat;
use crate::search::payload::{PayloadFilters, RankedResult, SearchPayload};
use crate::topk::select_top_k_by_mapped_score;
use crate::types::{IndexedCommit, SearchStrategyName, SemanticIndex};
use crate::vector::similarity::normalise_in_place;
use crate::vector::{
    AnnIndexHandle, Candidate, Embedder, StrategyOptions, VectorSearchStrategy,
    create_search_strategy,
};
use std::sync::Arc;

pub const MAX_LIMIT: usize = 200;

/// Semantic candidates fetched per requested result before re-ranking.
const ANN_RERANK_FACTOR: usize = 10;
const EXACT_RERANK_FACTOR: usize = 3;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub format: OutputFormat,
    pub explain: bool,
    /// Raw weights; normalised per search.
    pub weights: ScoreWeights,
    pub filters: SearchFilters,
    pub snippets: bool,
    pub snippet_lines: usize,
    /// `None` uses the format's default threshold.
    pub min_score: Option<f32>,
    pub strategy: SearchStrategyName,
    pub ann: AnnConfig,
}

impl SearchOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let search = &settings.search;
        Self {
            limit: search.limit,
            format: OutputFormat::default(),
            explain: false,
            weights: ScoreWeights::new(
                search.semantic_weight,
                search.lexical_weight,
                search.recency_weight,
                search.recency_boost,
            ),
            filters: SearchFilters::default(),
            snippets: false,
            snippet_lines: search.snippet_lines,
            min_score: search.min_score,
            strategy: search.strategy,
            ann: settings.ann.clone(),
        }
    }

    pub fn effective_min_score(&self) -> f32 {
        self.min_score
            .unwrap_or_else(|| self.format.default_min_score())
    }

    /// Normalised weights, with recency zeroed when the boost is off.
    pub fn score_weights(&self) -> GitsemResult<ScoreWeights> {
        let mut weights = self.weights;
        if !weights.recency_boost_enabled {
            weights.recency = 0.0;
        }
        normalise_weights(weights)
    }

    fn validate(&self) -> GitsemResult<()> {
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(GitsemError::config(format!(
                "limit must be between 1 and {MAX_LIMIT}, got {}",
                self.limit
            )));
        }
        Ok(())
    }
}

/// What a search runs against. Everything but the index is borrowed from
/// the caller so a session can reuse it across queries.
pub struct SearchContext<'a> {
    pub index: &'a SemanticIndex,
    pub embedder: &'a dyn Embedder,
    pub lexical: &'a LexicalCacheStore,
    pub ann: Option<Arc<dyn AnnIndexHandle>>,
    /// Needed only for diff snippets.
    pub source: Option<&'a dyn CommitSource>,
    pub registry: Option<&'a PluginRegistry>,
}

/// Embed `query` and return it unit-normalised.
pub fn embed_query(embedder: &dyn Embedder, query: &str, dimension: usize) -> GitsemResult<Vec<f32>> {
    let failure = |reason: String| GitsemError::Embedding {
        model: embedder.model_name().to_string(),
        cache_dir: embedder.cache_dir().map(|p| p.to_path_buf()).unwrap_or_default(),
        reason,
    };

    let mut vector = embedder
        .embed_batch(&[query.to_string()])
        .map_err(|e| failure(e.to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| failure("no embedding returned for the query".to_string()))?;
    if vector.len() != dimension {
        return Err(failure(format!(
            "query embedding has {} dimensions, index has {dimension}",
            vector.len()
        )));
    }
    normalise_in_place(&mut vector);
    Ok(vector)
}

/// Hybrid score of one candidate.
pub fn hybrid_score(
    commit: &IndexedCommit,
    semantic: f32,
    lexical: f32,
    weights: &ScoreWeights,
    signals: &[&dyn ScoringSignal],
    query: &str,
) -> (f32, f32) {
    let recency = if weights.recency_boost_enabled {
        recency_score(&commit.date)
    } else {
        0.0
    };
    let mut score = combine_scores(semantic, lexical, recency, weights);
    for signal in signals {
        score += signal.score(commit, query) * signal.default_weight();
    }
    (score, recency)
}

/// Run one search. `Ok(None)` means nothing matched the filters or cleared
/// the score threshold.
pub fn execute_search(
    query: &str,
    options: &SearchOptions,
    context: &SearchContext<'_>,
) -> GitsemResult<Option<SearchPayload>> {
    let index = context.index;
    if index.is_empty() {
        return Err(GitsemError::EmptyIndex);
    }
    options.validate()?;
    let weights = options.score_weights()?;
    let min_score = options.effective_min_score();

    let (query, filters) = match context.registry {
        Some(registry) => match registry.run_hooks(HookData::PreSearch {
            query: query.to_string(),
            filters: options.filters.clone(),
        })? {
            HookData::PreSearch { query, filters } => (query, filters),
            other => return Err(hook_point_changed(other.point().as_str())),
        },
        None => (query.to_string(), options.filters.clone()),
    };

    let mut candidates: Vec<Candidate<'_>> = filters.apply(&index.commits);
    if let Some(registry) = context.registry {
        for filter in registry.commit_filters() {
            candidates.retain(|c| filter.keep(c.commit));
        }
    }
    if candidates.is_empty() {
        tracing::debug!(query = %query, "no commits matched the filters");
        return Ok(None);
    }

    let query_vector = embed_query(context.embedder, &query, index.dimension())?;

    let strategy: Box<dyn VectorSearchStrategy> = match context
        .registry
        .and_then(|r| r.search_strategy(index.commits.len()))
    {
        Some(strategy) => strategy,
        None => create_search_strategy(
            &StrategyOptions {
                requested: options.strategy,
                commit_count: index.commits.len(),
                commit_threshold: options.ann.commit_threshold,
                overfetch: options.ann.overfetch,
                min_filtered_ratio: options.ann.min_filtered_ratio,
            },
            context.ann.clone(),
        )?,
    };

    let factor = if strategy.name() == "ann" {
        ANN_RERANK_FACTOR
    } else {
        EXACT_RERANK_FACTOR
    };
    let semantic = strategy.search(&query_vector, &candidates, options.limit * factor)?;
    tracing::debug!(
        strategy = %semantic.strategy,
        candidates = candidates.len(),
        hits = semantic.hits.len(),
        "semantic candidates"
    );

    let cache = context.lexical.get_or_build(index);
    let lexical = bm25_scores(&query, &cache, candidates.iter().map(|c| c.commit.hash.as_str()));
    let signals: Vec<&dyn ScoringSignal> = context
        .registry
        .map(|r| r.scoring_signals().collect())
        .unwrap_or_default();

    let selected = select_top_k_by_mapped_score(
        semantic
            .hits
            .iter()
            .filter_map(|hit| candidates.get(hit.index).map(|c| (c.commit, hit.score))),
        options.limit,
        |(commit, semantic_score)| {
            let lexical_score = lexical.get(&commit.hash).copied().unwrap_or(0.0);
            let (score, recency) =
                hybrid_score(commit, semantic_score, lexical_score, &weights, &signals, &query);
            (score, (commit, semantic_score, lexical_score, recency))
        },
    );

    let results: Vec<RankedResult> = selected
        .into_iter()
        .filter(|(score, _)| *score >= min_score)
        .enumerate()
        .map(|(position, (score, (commit, semantic_score, lexical_score, recency)))| RankedResult {
            rank: position + 1,
            score,
            semantic_score,
            lexical_score,
            recency_score: recency,
            hash: commit.hash.clone(),
            date: commit.date.clone(),
            author: commit.author.clone(),
            message: commit.message.clone(),
            files: commit.files.clone(),
            snippet: options
                .snippets
                .then(|| snippet_for(context.source, &commit.hash, options.snippet_lines))
                .flatten(),
        })
        .collect();

    if results.is_empty() {
        tracing::debug!(query = %query, min_score, "no results above the score threshold");
        return Ok(None);
    }

    let payload = SearchPayload {
        query: query.clone(),
        model: index.model_name.clone(),
        format: options.format.to_string(),
        explain: options.explain,
        strategy: semantic.strategy,
        total_indexed_commits: index.commits.len(),
        matched_commits: candidates.len(),
        returned_results: results.len(),
        score_weights: weights,
        filters: PayloadFilters::from_filters(&filters, options.limit),
        results,
    };

    let payload = match context.registry {
        Some(registry) => match registry.run_hooks(HookData::PostSearch { query, payload })? {
            HookData::PostSearch { payload, .. } => payload,
            other => return Err(hook_point_changed(other.point().as_str())),
        },
        None => payload,
    };
    Ok(Some(payload))
}

fn hook_point_changed(returned: &str) -> GitsemError {
    GitsemError::General(format!("search hook returned {returned} data"))
}

fn snippet_for(source: Option<&dyn CommitSource>, hash: &str, max_lines: usize) -> Option<String> {
    let source = source?;
    match source.diff_snippet(hash, max_lines) {
        Ok(snippet) if !snippet.is_empty() => Some(snippet),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(hash, error = %e, "could not read diff snippet");
            None
        }
    }
}
