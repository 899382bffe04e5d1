//! Vector primitives and nearest-neighbour search.
//!
//! - [`similarity`]: cosine similarity and L2 normalisation
//! - [`quantize`]: float16 conversion for compact vector files
//! - [`clustering`] and [`ann`]: the IVF-flat approximate index
//! - [`search`]: exact and approximate candidate generation
//! - [`embedding`]: the `Embedder` collaborator and its implementations

pub mod ann;
pub mod clustering;
pub mod embedding;
pub mod quantize;
pub mod search;
pub mod similarity;
mod types;

pub use ann::{ANN_METRIC, AnnIndexHandle, IvfIndex};
pub use clustering::{ClusteringError, KMeansResult, kmeans_clustering};
pub use embedding::{
    Embedder, FastEmbedEmbedder, HASH_MODEL_PREFIX, HashEmbedder, create_embedder,
    parse_embedding_model,
};
pub use quantize::{
    BYTES_PER_F16, BYTES_PER_F32, decode_f16, decode_f32, encode_f16, encode_f32,
    f16_bits_to_f32, f32_to_f16_bits, quantise_f16,
};
pub use search::{
    AnnSearch, Candidate, ExactSearch, SemanticCandidate, StrategyOptions, StrategyResult,
    VectorSearchStrategy, create_search_strategy,
};
pub use similarity::{cosine_similarity, cosine_similarity_unit, normalise_vector};
pub use types::{ClusterId, VectorDimension, VectorError};
