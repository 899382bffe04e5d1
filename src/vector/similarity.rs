//! Cosine similarity and L2 normalisation.
//!
//! `cosine_similarity_unit` is a plain dot product. It is only meaningful
//! when both inputs were passed through [`normalise_vector`] first.

use crate::vector::types::VectorError;

/// Norms below this are treated as the zero vector.
const EPSILON: f32 = 1e-10;

fn ensure_same_length(a: &[f32], b: &[f32]) -> Result<(), VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

/// Returns a unit-length copy of `vector`, or all zeros for the zero vector.
#[must_use]
pub fn normalise_vector(vector: &[f32]) -> Vec<f32> {
    let mut normalised = vector.to_vec();
    normalise_in_place(&mut normalised);
    normalised
}

/// Normalizes a vector in-place to unit length.
pub fn normalise_in_place(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    } else {
        vector.iter_mut().for_each(|value| *value = 0.0);
    }
}

/// Cosine similarity in [-1, 1]; 0 when either side is the zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    ensure_same_length(a, b)?;
    Ok(cosine_similarity_unchecked(a, b))
}

/// Same as [`cosine_similarity`] for callers that already checked lengths.
pub(crate) fn cosine_similarity_unchecked(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

/// Dot product of two pre-normalised vectors.
pub fn cosine_similarity_unit(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    ensure_same_length(a, b)?;
    Ok(dot(a, b))
}

#[inline]
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
