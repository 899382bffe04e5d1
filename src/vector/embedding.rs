//! Embedding generation for commit text and queries.
//!
//! [`FastEmbedEmbedder`] runs an ONNX sentence-transformer through fastembed.
//! [`HashEmbedder`] is an offline feature-hashing embedder: deterministic,
//! dependency-free at runtime, and good enough for tests and air-gapped use.

use crate::error::{GitsemError, GitsemResult};
use crate::vector::similarity::normalise_in_place;
use crate::vector::types::VectorError;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Prefix selecting the hashing embedder, e.g. `gitsem/hash-384`.
pub const HASH_MODEL_PREFIX: &str = "gitsem/hash-";

/// Maps a batch of texts to equal-length vectors.
///
/// Output length equals input length, and an empty batch yields an empty
/// result without touching the model.
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Where model weights are cached, for error reports.
    fn cache_dir(&self) -> Option<&Path> {
        None
    }
}

/// Models fastembed can serve, keyed by the names users pass on the CLI.
struct KnownModel {
    aliases: &'static [&'static str],
    model: EmbeddingModel,
    dimension: usize,
}

fn known_models() -> [KnownModel; 6] {
    [
        KnownModel {
            aliases: &[
                "Xenova/all-MiniLM-L6-v2",
                "sentence-transformers/all-MiniLM-L6-v2",
                "AllMiniLML6V2",
            ],
            model: EmbeddingModel::AllMiniLML6V2,
            dimension: 384,
        },
        KnownModel {
            aliases: &[
                "Xenova/all-MiniLM-L12-v2",
                "sentence-transformers/all-MiniLM-L12-v2",
                "AllMiniLML12V2",
            ],
            model: EmbeddingModel::AllMiniLML12V2,
            dimension: 384,
        },
        KnownModel {
            aliases: &["Xenova/bge-small-en-v1.5", "BAAI/bge-small-en-v1.5", "BGESmallENV15"],
            model: EmbeddingModel::BGESmallENV15,
            dimension: 384,
        },
        KnownModel {
            aliases: &["Xenova/bge-base-en-v1.5", "BAAI/bge-base-en-v1.5", "BGEBaseENV15"],
            model: EmbeddingModel::BGEBaseENV15,
            dimension: 768,
        },
        KnownModel {
            aliases: &["nomic-ai/nomic-embed-text-v1.5", "NomicEmbedTextV15"],
            model: EmbeddingModel::NomicEmbedTextV15,
            dimension: 768,
        },
        KnownModel {
            aliases: &[
                "Xenova/multilingual-e5-small",
                "intfloat/multilingual-e5-small",
                "MultilingualE5Small",
            ],
            model: EmbeddingModel::MultilingualE5Small,
            dimension: 384,
        },
    ]
}

/// Resolve a user-facing model name to a fastembed model and its dimension.
pub fn parse_embedding_model(name: &str) -> Option<(EmbeddingModel, usize)> {
    known_models()
        .into_iter()
        .find(|known| known.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name)))
        .map(|known| (known.model, known.dimension))
}

/// Names accepted by [`create_embedder`], for help and error text.
pub fn supported_model_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = known_models()
        .iter()
        .map(|known| known.aliases[0])
        .collect();
    names.push("gitsem/hash-<dimension>");
    names
}

/// FastEmbed implementation.
pub struct FastEmbedEmbedder {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: usize,
    cache_dir: PathBuf,
}

impl FastEmbedEmbedder {
    /// Load (downloading on first use) the named model into `cache_dir`.
    pub fn new(model_name: &str, cache_dir: &Path, show_progress: bool) -> GitsemResult<Self> {
        let (model, dimension) = parse_embedding_model(model_name).ok_or_else(|| {
            GitsemError::config(format!(
                "unknown embedding model '{model_name}'. Supported: {}",
                supported_model_names().join(", ")
            ))
        })?;

        let embedding = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir.to_path_buf())
                .with_show_download_progress(show_progress),
        )
        .map_err(|e| GitsemError::Embedding {
            model: model_name.to_string(),
            cache_dir: cache_dir.to_path_buf(),
            reason: format!("failed to initialise: {e}"),
        })?;

        Ok(Self {
            model: Mutex::new(embedding),
            model_name: model_name.to_string(),
            dimension,
            cache_dir: cache_dir.to_path_buf(),
        })
    }
}

impl Embedder for FastEmbedEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(texts, None)
            .map_err(|e| VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}")))?;

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(VectorError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }

    fn cache_dir(&self) -> Option<&Path> {
        Some(&self.cache_dir)
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Signed feature hashing of lowercase word tokens, L2-normalised.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    model_name: String,
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Result<Self, VectorError> {
        if dimension == 0 {
            return Err(VectorError::InvalidDimension {
                dimension,
                reason: "Hash embedder needs at least one bucket",
            });
        }
        Ok(Self {
            model_name: format!("{HASH_MODEL_PREFIX}{dimension}"),
            dimension,
        })
    }

    /// Parse `gitsem/hash-<dimension>`.
    pub fn from_model_name(name: &str) -> Option<Result<Self, VectorError>> {
        let dimension = name.strip_prefix(HASH_MODEL_PREFIX)?.parse::<usize>().ok()?;
        Some(Self::new(dimension))
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lower = text.to_lowercase();
        for token in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = fnv1a(token.as_bytes());
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        normalise_in_place(&mut vector);
        vector
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, VectorError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

/// Build the embedder for `model_name`.
pub fn create_embedder(
    model_name: &str,
    cache_dir: &Path,
    show_progress: bool,
) -> GitsemResult<Box<dyn Embedder>> {
    if let Some(hash) = HashEmbedder::from_model_name(model_name) {
        return Ok(Box::new(hash?));
    }
    Ok(Box::new(FastEmbedEmbedder::new(
        model_name,
        cache_dir,
        show_progress,
    )?))
}
