//! BM25 term statistics over commit messages and file paths.

use crate::types::IndexedCommit;
use std::collections::{HashMap, HashSet};

pub const BM25_K1: f64 = 1.5;
pub const BM25_B: f64 = 0.75;

/// Tokens shorter than this are dropped.
pub const MIN_TOKEN_LEN: usize = 2;

/// Lowercase ASCII alphanumeric runs of at least [`MIN_TOKEN_LEN`] characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| token.len() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// The text a commit is scored on: message, then file paths.
pub fn document_text(commit: &IndexedCommit) -> String {
    format!("{} {}", commit.message, commit.files.join(" "))
}

#[derive(Debug, Clone, Default)]
pub struct DocumentStats {
    pub length: usize,
    pub term_frequency: HashMap<String, u32>,
}

impl DocumentStats {
    fn from_tokens(tokens: Vec<String>) -> Self {
        let length = tokens.len();
        let mut term_frequency = HashMap::new();
        for token in tokens {
            *term_frequency.entry(token).or_insert(0) += 1;
        }
        Self {
            length,
            term_frequency,
        }
    }
}

/// Corpus statistics for one index, keyed by commit hash.
#[derive(Debug, Clone, Default)]
pub struct LexicalCache {
    docs: HashMap<String, DocumentStats>,
    document_frequency: HashMap<String, u32>,
    avgdl: f64,
    total_docs: usize,
}

impl LexicalCache {
    pub fn build(commits: &[IndexedCommit]) -> Self {
        let mut docs = HashMap::with_capacity(commits.len());
        let mut document_frequency: HashMap<String, u32> = HashMap::new();
        let mut total_length = 0usize;

        for commit in commits {
            let stats = DocumentStats::from_tokens(tokenize(&document_text(commit)));
            total_length += stats.length;
            for token in stats.term_frequency.keys() {
                *document_frequency.entry(token.clone()).or_insert(0) += 1;
            }
            docs.insert(commit.hash.clone(), stats);
        }

        let avgdl = if commits.is_empty() {
            0.0
        } else {
            total_length as f64 / commits.len() as f64
        };

        Self {
            docs,
            document_frequency,
            avgdl,
            total_docs: commits.len(),
        }
    }

    pub fn total_docs(&self) -> usize {
        self.total_docs
    }

    pub fn avgdl(&self) -> f64 {
        self.avgdl
    }

    pub fn document(&self, hash: &str) -> Option<&DocumentStats> {
        self.docs.get(hash)
    }

    fn idf(&self, token: &str) -> f64 {
        let df = f64::from(self.document_frequency.get(token).copied().unwrap_or(0));
        let n = self.total_docs as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn raw_score(&self, doc: &DocumentStats, query_tokens: &[String]) -> f64 {
        let length_ratio = doc.length as f64 / self.avgdl.max(1.0);
        query_tokens
            .iter()
            .filter_map(|token| {
                let tf = f64::from(*doc.term_frequency.get(token)?);
                let denominator = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * length_ratio);
                Some(self.idf(token) * (tf * (BM25_K1 + 1.0)) / denominator)
            })
            .sum()
    }
}

/// BM25 scores for `hashes`, divided by the best score among them.
///
/// The normalisation is relative to this query batch: the same document can
/// score differently depending on which other candidates are in `hashes`.
/// Hashes the cache does not know are left out and count as 0.
pub fn bm25_scores<'a, I>(query: &str, cache: &LexicalCache, hashes: I) -> HashMap<String, f32>
where
    I: IntoIterator<Item = &'a str>,
{
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() || cache.total_docs == 0 {
        return HashMap::new();
    }

    let mut seen = HashSet::new();
    let mut raw: Vec<(&str, f64)> = Vec::new();
    let mut max_score = 0.0f64;
    for hash in hashes {
        if !seen.insert(hash) {
            continue;
        }
        let Some(doc) = cache.docs.get(hash) else {
            continue;
        };
        let score = cache.raw_score(doc, &query_tokens);
        max_score = max_score.max(score);
        raw.push((hash, score));
    }

    let scale = if max_score > 0.0 { max_score } else { 1.0 };
    raw.into_iter()
        .map(|(hash, score)| (hash.to_string(), (score / scale) as f32))
        .collect()
}
