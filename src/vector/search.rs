//! Candidate generation over a filtered commit set.
//!
//! `ExactSearch` scores every candidate and is always correct. `AnnSearch`
//! asks an [`AnnIndexHandle`] for globally close rows, maps them back into
//! the filtered candidate list and falls back to exact search when the
//! filter is too narrow or too few hits survive.

use crate::error::{GitsemError, GitsemResult};
use crate::topk::select_top_k_by_mapped_score;
use crate::types::{IndexedCommit, SearchStrategyName};
use crate::vector::ann::AnnIndexHandle;
use crate::vector::similarity::dot;
use crate::vector::types::VectorError;
use std::collections::HashMap;
use std::sync::Arc;

/// A commit eligible for this query, with its row in the full index.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub global_index: usize,
    pub commit: &'a IndexedCommit,
}

/// A hit, addressed by position in the candidate slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemanticCandidate {
    pub index: usize,
    pub score: f32,
}

/// Hits plus the name of the strategy that actually produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyResult {
    pub strategy: String,
    pub hits: Vec<SemanticCandidate>,
}

pub trait VectorSearchStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `limit` hits, best first. The query must be unit length.
    fn search(
        &self,
        query: &[f32],
        candidates: &[Candidate<'_>],
        limit: usize,
    ) -> Result<StrategyResult, VectorError>;
}

/// Brute-force dot product over pre-normalised vectors.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactSearch;

impl ExactSearch {
    pub fn top_hits(
        query: &[f32],
        candidates: &[Candidate<'_>],
        limit: usize,
    ) -> Result<Vec<SemanticCandidate>, VectorError> {
        if let Some(bad) = candidates
            .iter()
            .find(|c| c.commit.embedding.len() != query.len())
        {
            return Err(VectorError::DimensionMismatch {
                expected: query.len(),
                actual: bad.commit.embedding.len(),
            });
        }
        Ok(
            select_top_k_by_mapped_score(candidates.iter().enumerate(), limit, |(index, candidate)| {
                let score = dot(query, candidate.commit.embedding.as_slice());
                (score, SemanticCandidate { index, score })
            })
            .into_iter()
            .map(|(_, hit)| hit)
            .collect(),
        )
    }
}

impl VectorSearchStrategy for ExactSearch {
    fn name(&self) -> &str {
        "exact"
    }

    fn search(
        &self,
        query: &[f32],
        candidates: &[Candidate<'_>],
        limit: usize,
    ) -> Result<StrategyResult, VectorError> {
        Ok(StrategyResult {
            strategy: "exact".to_string(),
            hits: Self::top_hits(query, candidates, limit)?,
        })
    }
}

/// Name reported when ANN handed the query to exact search.
pub const ANN_FALLBACK_STRATEGY: &str = "ann->exact";

/// Approximate search with exact fallback.
pub struct AnnSearch {
    handle: Arc<dyn AnnIndexHandle>,
    overfetch: usize,
    min_filtered_ratio: f32,
}

impl AnnSearch {
    pub fn new(handle: Arc<dyn AnnIndexHandle>, overfetch: usize, min_filtered_ratio: f32) -> Self {
        Self {
            handle,
            overfetch: overfetch.max(1),
            min_filtered_ratio,
        }
    }

    fn fallback(
        query: &[f32],
        candidates: &[Candidate<'_>],
        limit: usize,
    ) -> Result<StrategyResult, VectorError> {
        Ok(StrategyResult {
            strategy: ANN_FALLBACK_STRATEGY.to_string(),
            hits: ExactSearch::top_hits(query, candidates, limit)?,
        })
    }
}

impl VectorSearchStrategy for AnnSearch {
    fn name(&self) -> &str {
        "ann"
    }

    fn search(
        &self,
        query: &[f32],
        candidates: &[Candidate<'_>],
        limit: usize,
    ) -> Result<StrategyResult, VectorError> {
        let corpus = self.handle.size().max(1);
        let filtered_ratio = candidates.len() as f32 / corpus as f32;
        if filtered_ratio < self.min_filtered_ratio {
            tracing::debug!(
                candidates = candidates.len(),
                corpus,
                "filtered set too small for ANN, using exact search"
            );
            return Self::fallback(query, candidates, limit);
        }

        let global_to_filtered: HashMap<usize, usize> = candidates
            .iter()
            .enumerate()
            .map(|(position, candidate)| (candidate.global_index, position))
            .collect();

        let ann_limit = limit.saturating_mul(self.overfetch).min(self.handle.size());
        let hits: Vec<SemanticCandidate> = self
            .handle
            .search(query, ann_limit)
            .into_iter()
            .filter_map(|(global, score)| {
                global_to_filtered
                    .get(&global)
                    .map(|&index| SemanticCandidate { index, score })
            })
            .take(limit)
            .collect();

        if hits.len() < limit && hits.len() < candidates.len() {
            tracing::debug!(
                returned = hits.len(),
                limit,
                candidates = candidates.len(),
                "ANN under-delivered after filtering, using exact search"
            );
            return Self::fallback(query, candidates, limit);
        }

        Ok(StrategyResult {
            strategy: "ann".to_string(),
            hits,
        })
    }
}

/// Inputs to built-in strategy selection.
pub struct StrategyOptions {
    pub requested: SearchStrategyName,
    pub commit_count: usize,
    pub commit_threshold: usize,
    pub overfetch: usize,
    pub min_filtered_ratio: f32,
}

/// `exact` always works. `ann` needs a handle. `auto` uses ANN only with a
/// handle and at least `commit_threshold` commits.
pub fn create_search_strategy(
    options: &StrategyOptions,
    ann_handle: Option<Arc<dyn AnnIndexHandle>>,
) -> GitsemResult<Box<dyn VectorSearchStrategy>> {
    let ann = |handle| -> Box<dyn VectorSearchStrategy> {
        Box::new(AnnSearch::new(
            handle,
            options.overfetch,
            options.min_filtered_ratio,
        ))
    };

    match (options.requested, ann_handle) {
        (SearchStrategyName::Exact, _) => Ok(Box::new(ExactSearch)),
        (SearchStrategyName::Ann, Some(handle)) => Ok(ann(handle)),
        (SearchStrategyName::Ann, None) => Err(GitsemError::config(
            "ANN strategy requested but no ANN index is available. Run 'gitsem index --ann always'",
        )),
        (SearchStrategyName::Auto, Some(handle))
            if options.commit_count >= options.commit_threshold =>
        {
            Ok(ann(handle))
        }
        (SearchStrategyName::Auto, _) => Ok(Box::new(ExactSearch)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::ann::IvfIndex;
    use crate::vector::similarity::normalise_vector;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn commit(i: usize, embedding: Vec<f32>) -> IndexedCommit {
        IndexedCommit {
            hash: format!("h{i}"),
            author: "a".to_string(),
            date: "2024-01-01T00:00:00Z".to_string(),
            message: format!("commit {i}"),
            files: vec![],
            embedding: embedding.into(),
        }
    }

    fn corpus(n: usize, dim: usize) -> Vec<IndexedCommit> {
        let mut rng = StdRng::seed_from_u64(5);
        (0..n)
            .map(|i| {
                let raw: Vec<f32> = (0..dim).map(|_| rng.random::<f32>() - 0.5).collect();
                commit(i, normalise_vector(&raw))
            })
            .collect()
    }

    fn candidates(commits: &[IndexedCommit]) -> Vec<Candidate<'_>> {
        commits
            .iter()
            .enumerate()
            .map(|(global_index, commit)| Candidate {
                global_index,
                commit,
            })
            .collect()
    }

    fn handle(commits: &[IndexedCommit]) -> Arc<dyn AnnIndexHandle> {
        let rows: Vec<&[f32]> = commits.iter().map(|c| c.embedding.as_slice()).collect();
        Arc::new(IvfIndex::build(&rows, 8).unwrap())
    }

    /// Returns every row it indexes, best first, like a perfect ANN.
    struct Scripted(Vec<(usize, f32)>);

    impl AnnIndexHandle for Scripted {
        fn search(&self, _query: &[f32], limit: usize) -> Vec<(usize, f32)> {
            self.0.iter().copied().take(limit).collect()
        }
        fn size(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn test_exact_ranks_by_similarity() {
        let commits = vec![
            commit(0, vec![1.0, 0.0]),
            commit(1, vec![0.0, 1.0]),
            commit(2, normalise_vector(&[1.0, 1.0])),
        ];
        let result = ExactSearch
            .search(&[1.0, 0.0], &candidates(&commits), 2)
            .unwrap();
        assert_eq!(result.strategy, "exact");
        let order: Vec<usize> = result.hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![0, 2]);
    }

    #[test]
    fn test_exact_top_hits_agree_with_sorting_everything() {
        let commits = corpus(300, 8);
        let query = commits[42].embedding.to_vec();
        let hits = ExactSearch::top_hits(&query, &candidates(&commits), 7).unwrap();

        let mut all: Vec<(usize, f32)> = commits
            .iter()
            .enumerate()
            .map(|(i, c)| (i, dot(&query, c.embedding.as_slice())))
            .collect();
        all.sort_by(|a, b| b.1.total_cmp(&a.1));

        assert_eq!(hits.len(), 7);
        assert_eq!(hits[0].index, 42);
        for (hit, (index, score)) in hits.iter().zip(all) {
            assert_eq!(hit.index, index);
            assert_eq!(hit.score, score);
        }
    }

    #[test]
    fn test_exact_rejects_dimension_mismatch() {
        let commits = vec![commit(0, vec![1.0, 0.0])];
        assert!(ExactSearch.search(&[1.0], &candidates(&commits), 1).is_err());
    }

    #[test]
    fn test_small_filtered_set_matches_exact() {
        let commits = corpus(500, 16);
        let all = candidates(&commits);
        // Keep 20 scattered commits: 4% of the corpus
        let filtered: Vec<Candidate<'_>> = all.iter().copied().filter(|c| c.global_index % 25 == 0).collect();

        let ann = AnnSearch::new(handle(&commits), 10, 0.1);
        let query = commits[3].embedding.to_vec();

        let approx = ann.search(&query, &filtered, 5).unwrap();
        let exact = ExactSearch.search(&query, &filtered, 5).unwrap();
        assert_eq!(approx.strategy, ANN_FALLBACK_STRATEGY);

        let a: HashSet<usize> = approx.hits.iter().map(|h| h.index).collect();
        let e: HashSet<usize> = exact.hits.iter().map(|h| h.index).collect();
        assert_eq!(a, e);
    }

    #[test]
    fn test_maps_global_keys_to_filtered_positions() {
        let commits = corpus(10, 4);
        let all = candidates(&commits);
        let filtered: Vec<Candidate<'_>> = all[5..].to_vec();
        let scripted = Scripted((0..10).rev().map(|i| (i, i as f32 / 10.0)).collect());

        let ann = AnnSearch::new(Arc::new(scripted), 10, 0.1);
        let result = ann.search(&[0.0; 4], &filtered, 3).unwrap();
        assert_eq!(result.strategy, "ann");
        let positions: Vec<usize> = result.hits.iter().map(|h| h.index).collect();
        // Global rows 9, 8, 7 sit at filtered positions 4, 3, 2
        assert_eq!(positions, vec![4, 3, 2]);
    }

    #[test]
    fn test_under_filled_ann_falls_back() {
        let commits = corpus(10, 4);
        let all = candidates(&commits);
        // The scripted index only knows rows outside the filter
        let scripted = Scripted(vec![(0, 0.9), (1, 0.8)]);
        let filtered: Vec<Candidate<'_>> = all[2..].to_vec();

        let ann = AnnSearch::new(Arc::new(scripted), 10, 0.0);
        let result = ann.search(&commits[4].embedding.to_vec(), &filtered, 3).unwrap();
        assert_eq!(result.strategy, ANN_FALLBACK_STRATEGY);
        assert_eq!(result.hits.len(), 3);
        assert_eq!(result.hits[0].index, 2);
    }

    #[test]
    fn test_strategy_selection() {
        let commits = corpus(20, 4);
        let options = |requested, commit_count| StrategyOptions {
            requested,
            commit_count,
            commit_threshold: 10_000,
            overfetch: 10,
            min_filtered_ratio: 0.1,
        };

        let auto_small =
            create_search_strategy(&options(SearchStrategyName::Auto, 20), Some(handle(&commits)))
                .unwrap();
        assert_eq!(auto_small.name(), "exact");

        let auto_large = create_search_strategy(
            &options(SearchStrategyName::Auto, 10_000),
            Some(handle(&commits)),
        )
        .unwrap();
        assert_eq!(auto_large.name(), "ann");

        let auto_no_handle =
            create_search_strategy(&options(SearchStrategyName::Auto, 50_000), None).unwrap();
        assert_eq!(auto_no_handle.name(), "exact");

        assert!(matches!(
            create_search_strategy(&options(SearchStrategyName::Ann, 5), None),
            Err(GitsemError::Config { .. })
        ));
        let exact =
            create_search_strategy(&options(SearchStrategyName::Exact, 50_000), Some(handle(&commits)))
                .unwrap();
        assert_eq!(exact.name(), "exact");
    }
}
