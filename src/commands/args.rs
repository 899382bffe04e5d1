//! Flags shared by several subcommands.

use crate::config::{AnnBuildPolicy, Settings};
use crate::ranking::ScoreWeights;
use crate::search::{OutputFormat, SearchFilters, SearchOptions};
use crate::types::{SearchStrategyName, VectorDtype, parse_date_arg};
use chrono::{DateTime, Utc};
use clap::Args;

fn parse_date(value: &str) -> Result<DateTime<Utc>, String> {
    parse_date_arg(value)
}

/// Indexing knobs accepted by `index` and `update`.
#[derive(Args, Debug, Clone, Default)]
pub struct IndexingArgs {
    /// Include a summary of each commit's diff in the embedding text
    #[arg(long)]
    pub full: bool,

    /// Commits per embedding call (1-256)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Only index changes to files matching this glob (repeatable)
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Ignore changes to files matching this glob (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Element type of the compact vector file
    #[arg(long, value_enum)]
    pub dtype: Option<VectorDtype>,

    /// Build the approximate nearest-neighbour sidecar
    #[arg(long, value_enum)]
    pub ann: Option<AnnBuildPolicy>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Author name or email contains this text
    #[arg(long)]
    pub author: Option<String>,

    /// Committed after this date (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub after: Option<DateTime<Utc>>,

    /// Committed before this date (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub before: Option<DateTime<Utc>>,

    /// A changed file path contains this text
    #[arg(long)]
    pub file: Option<String>,
}

impl FilterArgs {
    pub fn to_filters(&self) -> SearchFilters {
        SearchFilters {
            author: self.author.clone(),
            after: self.after,
            before: self.before,
            file: self.file.clone(),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct WeightArgs {
    #[arg(long)]
    pub semantic_weight: Option<f32>,

    #[arg(long)]
    pub lexical_weight: Option<f32>,

    #[arg(long)]
    pub recency_weight: Option<f32>,

    /// Ignore commit age when ranking
    #[arg(long)]
    pub no_recency: bool,
}

impl WeightArgs {
    /// Settings weights with CLI overrides applied. Not yet normalised.
    pub fn resolve(&self, settings: &Settings) -> ScoreWeights {
        let search = &settings.search;
        ScoreWeights::new(
            self.semantic_weight.unwrap_or(search.semantic_weight),
            self.lexical_weight.unwrap_or(search.lexical_weight),
            self.recency_weight.unwrap_or(search.recency_weight),
            search.recency_boost && !self.no_recency,
        )
    }
}

/// Everything `search` and `serve` accept besides the query.
#[derive(Args, Debug, Clone, Default)]
pub struct SearchArgs {
    /// Embedding model whose index to query
    #[arg(long)]
    pub model: Option<String>,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Maximum number of results (1-200)
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// text, markdown, json, or a plugin formatter name
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Show the score breakdown for each result
    #[arg(long)]
    pub explain: bool,

    #[command(flatten)]
    pub weights: WeightArgs,

    /// Attach a short diff excerpt to each result
    #[arg(long)]
    pub snippets: bool,

    /// Diff lines per snippet
    #[arg(long)]
    pub snippet_lines: Option<usize>,

    /// Drop results scoring below this
    #[arg(long)]
    pub min_score: Option<f32>,

    #[arg(long, value_enum)]
    pub strategy: Option<SearchStrategyName>,
}

impl SearchArgs {
    pub fn to_options(&self, settings: &Settings) -> SearchOptions {
        let mut options = SearchOptions::from_settings(settings);
        if let Some(limit) = self.limit {
            options.limit = limit;
        }
        if let Some(format) = &self.format {
            options.format = format.clone();
        }
        options.explain = self.explain;
        options.weights = self.weights.resolve(settings);
        options.filters = self.filters.to_filters();
        options.snippets = self.snippets;
        if let Some(lines) = self.snippet_lines {
            options.snippet_lines = lines;
        }
        if self.min_score.is_some() {
            options.min_score = self.min_score;
        }
        if let Some(strategy) = self.strategy {
            options.strategy = strategy;
        }
        options
    }
}
