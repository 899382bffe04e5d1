//! Spherical k-means for the IVF sidecar.
//!
//! Vectors are compared by cosine similarity and centroids are kept at unit
//! length. Seeding is k-means++ from a caller-supplied seed, so the same
//! commits always produce the same partitions. Assignment runs on rayon.

use crate::vector::similarity::{cosine_similarity_unchecked, normalise_in_place, normalise_vector};
use crate::vector::types::{ClusterId, VectorError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use thiserror::Error;

const MAX_ITERATIONS: usize = 25;

/// Mean cosine distance centroids may move and still count as settled.
const CONVERGENCE_TOLERANCE: f32 = 1e-4;

const EPSILON: f32 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Unit-length centroids, each of the input dimension.
    pub centroids: Vec<Vec<f32>>,

    /// Cluster assignment for each input vector.
    pub assignments: Vec<ClusterId>,

    pub iterations: usize,
}

#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error(
        "Empty vector set provided for clustering\nSuggestion: Index at least one commit before building the ANN sidecar"
    )]
    EmptyVectorSet,

    #[error("Invalid cluster count: {0}\nSuggestion: Use k between 1 and the number of vectors")]
    InvalidClusterCount(usize),

    #[error(
        "Dimension mismatch in vectors\nSuggestion: Ensure all vectors come from the same embedding model"
    )]
    DimensionMismatch,

    #[error(
        "Failed to initialize centroids\nSuggestion: Check that vectors contain valid floating-point values"
    )]
    InitializationFailed,

    #[error("Vector operation error: {0}")]
    VectorError(#[from] VectorError),
}

impl From<ClusteringError> for VectorError {
    fn from(err: ClusteringError) -> Self {
        match err {
            ClusteringError::VectorError(inner) => inner,
            other => VectorError::ClusteringFailed(other.to_string()),
        }
    }
}

/// Partition `vectors` into at most `k` clusters.
///
/// Stops when assignments repeat, when centroids move less than
/// [`CONVERGENCE_TOLERANCE`], or after [`MAX_ITERATIONS`] rounds. Fewer than
/// `k` centroids come back when the vectors have fewer distinct directions.
#[must_use]
pub fn kmeans_clustering(
    vectors: &[&[f32]],
    k: usize,
    seed: u64,
) -> Result<KMeansResult, ClusteringError> {
    if vectors.is_empty() {
        return Err(ClusteringError::EmptyVectorSet);
    }

    if k == 0 || k > vectors.len() {
        return Err(ClusteringError::InvalidClusterCount(k));
    }

    let dimension = vectors[0].len();
    if vectors.iter().any(|v| v.len() != dimension) {
        return Err(ClusteringError::DimensionMismatch);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = initialize_centroids_kmeans_plus_plus(vectors, k, &mut rng)?;
    let mut assignments: Vec<ClusterId> = Vec::new();
    let mut iterations = 0;

    loop {
        iterations += 1;

        let new_assignments = assign_all(vectors, &centroids);

        // No assignment changes
        let converged = new_assignments == assignments;
        assignments = new_assignments;

        if converged || iterations >= MAX_ITERATIONS {
            break;
        }

        let new_centroids = update_centroids(vectors, &assignments, centroids.len(), &mut rng);

        let centroid_movement = calculate_centroid_movement(&centroids, &new_centroids);
        centroids = new_centroids;

        if centroid_movement < CONVERGENCE_TOLERANCE {
            assignments = assign_all(vectors, &centroids);
            break;
        }
    }

    if iterations >= MAX_ITERATIONS {
        tracing::debug!(
            iterations,
            "k-means stopped at the iteration limit before converging"
        );
    }

    Ok(KMeansResult {
        centroids,
        assignments,
        iterations,
    })
}

/// Nearest centroid for every vector, computed in parallel.
pub fn assign_all(vectors: &[&[f32]], centroids: &[Vec<f32>]) -> Vec<ClusterId> {
    let centroid_refs: Vec<&[f32]> = centroids.iter().map(Vec::as_slice).collect();
    vectors
        .par_iter()
        .map(|vector| assign_to_nearest_centroid(vector, &centroid_refs))
        .collect()
}

pub fn assign_to_nearest_centroid(vector: &[f32], centroids: &[&[f32]]) -> ClusterId {
    let mut best_similarity = f32::NEG_INFINITY;
    let mut best_cluster = 0;

    for (i, centroid) in centroids.iter().enumerate() {
        let similarity = cosine_similarity_unchecked(vector, centroid);
        if similarity > best_similarity {
            best_similarity = similarity;
            best_cluster = i;
        }
    }

    ClusterId::from_index(best_cluster)
}

/// Updates centroids as the mean of their assigned vectors.
fn update_centroids(
    vectors: &[&[f32]],
    assignments: &[ClusterId],
    k: usize,
    rng: &mut StdRng,
) -> Vec<Vec<f32>> {
    let dimension = vectors[0].len();
    let mut new_centroids = vec![vec![0.0; dimension]; k];
    let mut cluster_sizes = vec![0usize; k];

    for (vector, cluster_id) in vectors.iter().zip(assignments.iter()) {
        let cluster_idx = cluster_id.index();
        for (sum, &value) in new_centroids[cluster_idx].iter_mut().zip(vector.iter()) {
            *sum += value;
        }
        cluster_sizes[cluster_idx] += 1;
    }

    for (centroid, &size) in new_centroids.iter_mut().zip(cluster_sizes.iter()) {
        if size == 0 {
            // Empty cluster: reseed from a random vector
            let random_idx = rng.random_range(0..vectors.len());
            *centroid = normalise_vector(vectors[random_idx]);
        } else {
            for value in centroid.iter_mut() {
                *value /= size as f32;
            }
            normalise_in_place(centroid);
        }
    }

    new_centroids
}

/// K-means++ seeding: each new centroid is drawn with probability
/// proportional to its squared cosine distance from the nearest chosen one.
fn initialize_centroids_kmeans_plus_plus(
    vectors: &[&[f32]],
    k: usize,
    rng: &mut StdRng,
) -> Result<Vec<Vec<f32>>, ClusteringError> {
    let mut centroids = Vec::with_capacity(k);

    let first_idx = rng.random_range(0..vectors.len());
    centroids.push(normalise_vector(vectors[first_idx]));

    let mut min_distances = vec![f32::MAX; vectors.len()];

    for _ in 1..k {
        let newest = centroids.last().map(Vec::as_slice).unwrap_or(&[]);
        let mut total_distance = 0.0f32;

        for (min_distance, vector) in min_distances.iter_mut().zip(vectors.iter()) {
            let distance = 1.0 - cosine_similarity_unchecked(vector, newest);
            let squared = distance * distance;
            if squared < *min_distance {
                *min_distance = squared;
            }
            total_distance += *min_distance;
        }

        if total_distance < EPSILON {
            // Every remaining vector coincides with a centroid
            break;
        }

        let target = rng.random::<f32>() * total_distance;
        let mut cumulative = 0.0;
        let mut chosen = vectors.len() - 1;
        for (i, &distance) in min_distances.iter().enumerate() {
            cumulative += distance;
            if cumulative >= target {
                chosen = i;
                break;
            }
        }
        centroids.push(normalise_vector(vectors[chosen]));
    }

    if centroids.is_empty() {
        return Err(ClusteringError::InitializationFailed);
    }

    Ok(centroids)
}

/// Mean cosine distance between matching centroids of two iterations.
fn calculate_centroid_movement(old: &[Vec<f32>], new: &[Vec<f32>]) -> f32 {
    old.iter()
        .zip(new.iter())
        .map(|(old_c, new_c)| 1.0 - cosine_similarity_unchecked(old_c, new_c))
        .sum::<f32>()
        / old.len().max(1) as f32
}
