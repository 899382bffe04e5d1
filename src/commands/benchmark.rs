//! `gitsem benchmark`: time heap top-K against a full sort on real scores.

use crate::benchmark::{
    BenchmarkHistoryEntry, append_history, benchmark_ranking, load_history,
    render_history_summary,
};
use crate::commands::{FilterArgs, Workspace, WeightArgs};
use crate::display::create_benchmark_table;
use crate::error::{GitsemError, GitsemResult};
use crate::io::ExitCode;
use crate::lexical::{LexicalCacheStore, bm25_scores};
use crate::ranking::{ScoreWeights, normalise_weights};
use crate::search::{embed_query, hybrid_score};
use crate::types::{SemanticIndex, now_iso};
use crate::vector::{Embedder, cosine_similarity_unit};
use clap::Args;

pub const DEFAULT_ITERATIONS: usize = 200;

#[derive(Args, Debug, Clone)]
pub struct BenchmarkArgs {
    /// Query whose hybrid scores are ranked
    #[arg(required_unless_present = "history")]
    pub query: Option<String>,

    #[command(flatten)]
    pub filters: FilterArgs,

    #[command(flatten)]
    pub weights: WeightArgs,

    /// Results kept by each selector
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: usize,

    /// Append this run to the benchmark history
    #[arg(long)]
    pub save: bool,

    /// Show recent saved runs instead of benchmarking
    #[arg(long)]
    pub history: bool,
}

/// Hybrid score of every commit passing `filters`, without plugin signals.
pub fn score_candidates(
    index: &SemanticIndex,
    embedder: &dyn Embedder,
    query: &str,
    args: &BenchmarkArgs,
    weights: ScoreWeights,
) -> GitsemResult<Vec<f32>> {
    let candidates = args.filters.to_filters().apply(&index.commits);
    if candidates.is_empty() {
        return Err(GitsemError::General(
            "No indexed commits matched the provided filters.".to_string(),
        ));
    }

    let mut weights = weights;
    if !weights.recency_boost_enabled {
        weights.recency = 0.0;
    }
    let weights = normalise_weights(weights)?;
    let query_vector = embed_query(embedder, query, index.dimension())?;

    let lexical_cache = LexicalCacheStore::default();
    let cache = lexical_cache.get_or_build(index);
    let lexical = bm25_scores(query, &cache, candidates.iter().map(|c| c.commit.hash.as_str()));

    candidates
        .iter()
        .map(|candidate| {
            let commit = candidate.commit;
            let semantic = cosine_similarity_unit(&query_vector, commit.embedding.as_slice())?;
            let lexical = lexical.get(&commit.hash).copied().unwrap_or(0.0);
            Ok(hybrid_score(commit, semantic, lexical, &weights, &[], query).0)
        })
        .collect()
}

pub fn run(args: &BenchmarkArgs, workspace: &Workspace) -> GitsemResult<ExitCode> {
    let history_path = &workspace.paths.benchmarks_file;
    if args.history {
        println!("{}", render_history_summary(&load_history(history_path)?));
        return Ok(ExitCode::Success);
    }
    let Some(query) = args.query.as_deref() else {
        return Err(GitsemError::config("a query is required unless --history is given"));
    };

    let limit = args.limit.unwrap_or(workspace.settings.search.limit);
    let (_, loaded) = workspace.load(None)?;
    let index = loaded.index;
    let registry = workspace.registry();
    let embedder = workspace.embedder(&index.model_name, &registry, false)?;

    let scores = score_candidates(
        &index,
        embedder.as_ref(),
        query,
        args,
        args.weights.resolve(&workspace.settings),
    )?;
    let result = benchmark_ranking(&scores, limit, args.iterations, |score| *score)?;

    println!("Benchmark query: \"{query}\"");
    println!(
        "{}",
        create_benchmark_table(&result, scores.len(), limit, args.iterations)
    );

    if args.save {
        append_history(
            history_path,
            &BenchmarkHistoryEntry {
                timestamp: now_iso(),
                query: query.to_string(),
                candidates: scores.len(),
                limit,
                iterations: args.iterations,
                baseline_ms: result.baseline_ms,
                optimised_ms: result.optimised_ms,
                speedup: result.speedup,
            },
        )?;
        println!("Saved benchmark run to {}", history_path.display());
    }
    Ok(ExitCode::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IndexedCommit;
    use crate::vector::HashEmbedder;

    fn args(author: Option<&str>) -> BenchmarkArgs {
        BenchmarkArgs {
            query: Some("token refresh".to_string()),
            filters: FilterArgs {
                author: author.map(str::to_string),
                ..Default::default()
            },
            weights: WeightArgs::default(),
            limit: Some(2),
            iterations: 3,
            save: false,
            history: false,
        }
    }

    fn index(embedder: &HashEmbedder) -> SemanticIndex {
        let mut index = SemanticIndex::new("gitsem/hash-64", "/repo");
        for (i, message) in ["Fix token refresh race", "Add README", "Tune logging"]
            .iter()
            .enumerate()
        {
            index.commits.push(IndexedCommit {
                hash: format!("h{i}"),
                author: if i == 0 { "Ada" } else { "Grace" }.to_string(),
                date: format!("2024-03-0{}T10:00:00Z", i + 1),
                message: message.to_string(),
                files: vec![format!("src/f{i}.rs")],
                embedding: embedder.embed_one(message).into(),
            });
        }
        index
    }

    #[test]
    fn test_scores_every_filtered_candidate() {
        let embedder = HashEmbedder::new(64).unwrap();
        let index = index(&embedder);
        let weights = ScoreWeights::new(0.75, 0.2, 0.05, true);

        let all = score_candidates(&index, &embedder, "token refresh", &args(None), weights).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0] > all[1] && all[0] > all[2]);

        let grace = score_candidates(&index, &embedder, "token refresh", &args(Some("grace")), weights)
            .unwrap();
        assert_eq!(grace.len(), 2);

        let nobody = score_candidates(&index, &embedder, "x", &args(Some("nobody")), weights);
        assert!(nobody.is_err());
    }
}
