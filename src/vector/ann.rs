//! IVF-flat approximate nearest-neighbour index.
//!
//! Rows are bucketed under the nearest of `k ≈ √n` k-means centroids. A query
//! scores every centroid, opens the `probes` closest buckets and ranks their
//! members by inner product. Keys are global row positions.
//!
//! The sidecar file holds centroids and bucket membership only. Vectors are
//! re-bound from the loaded index, so the two can never disagree on values.

use crate::topk::select_top_k_by_mapped_score;
use crate::vector::clustering::{assign_all, kmeans_clustering};
use crate::vector::similarity::dot;
use crate::vector::types::VectorError;
use bincode::{Decode, Encode};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;

const MAGIC_BYTES: &[u8; 4] = b"GSIV";
const STORAGE_VERSION: u32 = 1;
const HEADER_SIZE: usize = 8;

/// Upper bound on the number of clusters.
pub const MAX_CLUSTERS: usize = 1024;

/// Training sample per centroid.
const SAMPLE_PER_CLUSTER: usize = 64;

const TRAINING_SEED: u64 = 0x6769_7473_656d;

/// Metric recorded in the sidecar descriptor.
pub const ANN_METRIC: &str = "ip";

/// Approximate index keyed by global row position.
pub trait AnnIndexHandle: Send + Sync {
    /// Up to `limit` `(row, similarity)` pairs, best first.
    fn search(&self, query: &[f32], limit: usize) -> Vec<(usize, f32)>;

    /// Number of indexed rows.
    fn size(&self) -> usize;
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct IvfLayout {
    dimension: u32,
    count: u32,
    probes: u32,
    centroids: Vec<Vec<f32>>,
    lists: Vec<Vec<u32>>,
}

/// An IVF-flat index bound to its row vectors.
#[derive(Debug, Clone)]
pub struct IvfIndex {
    layout: IvfLayout,
    rows: Vec<f32>,
}

/// Cluster count for `n` rows.
pub fn cluster_count(n: usize) -> usize {
    ((n as f64).sqrt().round() as usize).clamp(1, MAX_CLUSTERS)
}

impl IvfIndex {
    /// Train on a seeded sample and assign every row. Rows should be unit length.
    pub fn build(rows: &[&[f32]], probes: usize) -> Result<Self, VectorError> {
        let first = rows.first().ok_or_else(|| {
            VectorError::ClusteringFailed("no vectors to build an ANN index from".to_string())
        })?;
        let dimension = first.len();
        if dimension == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        if let Some(bad) = rows.iter().find(|row| row.len() != dimension) {
            return Err(VectorError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        let k = cluster_count(rows.len());
        let sample_size = (k * SAMPLE_PER_CLUSTER).min(rows.len());
        let sample: Vec<&[f32]> = if sample_size == rows.len() {
            rows.to_vec()
        } else {
            let mut rng = StdRng::seed_from_u64(TRAINING_SEED);
            let mut picked = rand::seq::index::sample(&mut rng, rows.len(), sample_size).into_vec();
            picked.sort_unstable();
            picked.into_iter().map(|i| rows[i]).collect()
        };

        let clustering = kmeans_clustering(&sample, k, TRAINING_SEED)?;
        let assignments = assign_all(rows, &clustering.centroids);

        let mut lists = vec![Vec::new(); clustering.centroids.len()];
        for (row, cluster) in assignments.iter().enumerate() {
            lists[cluster.index()].push(row as u32);
        }

        tracing::debug!(
            rows = rows.len(),
            clusters = clustering.centroids.len(),
            iterations = clustering.iterations,
            "built IVF index"
        );

        let mut flat = Vec::with_capacity(rows.len() * dimension);
        for row in rows {
            flat.extend_from_slice(row);
        }

        Ok(Self {
            layout: IvfLayout {
                dimension: dimension as u32,
                count: rows.len() as u32,
                probes: probes.max(1) as u32,
                centroids: clustering.centroids,
                lists,
            },
            rows: flat,
        })
    }

    /// Write the sidecar: magic, version, then the bincode layout.
    pub fn save(&self, path: &Path) -> Result<(), VectorError> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        bytes.extend_from_slice(MAGIC_BYTES);
        bytes.extend_from_slice(&STORAGE_VERSION.to_le_bytes());
        let payload = bincode::encode_to_vec(&self.layout, bincode::config::standard())
            .map_err(|e| VectorError::Serialization(e.to_string()))?;
        bytes.extend_from_slice(&payload);
        crate::storage::write_atomic(path, &bytes)
            .map_err(|e| VectorError::Serialization(e.to_string()))
    }

    /// Read a sidecar and bind it to `rows`.
    ///
    /// Fails when the row count or dimension disagree with what was built.
    pub fn load(path: &Path, rows: &[&[f32]]) -> Result<Self, VectorError> {
        let bytes = std::fs::read(path)?;
        if bytes.len() < HEADER_SIZE || &bytes[0..4] != MAGIC_BYTES {
            return Err(VectorError::Serialization(format!(
                "{} is not a gitsem ANN sidecar",
                path.display()
            )));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != STORAGE_VERSION {
            return Err(VectorError::VersionMismatch {
                expected: STORAGE_VERSION,
                actual: version,
            });
        }

        let (layout, _): (IvfLayout, usize) =
            bincode::decode_from_slice(&bytes[HEADER_SIZE..], bincode::config::standard())
                .map_err(|e| VectorError::Serialization(e.to_string()))?;

        if layout.count as usize != rows.len() {
            return Err(VectorError::Serialization(format!(
                "sidecar covers {} rows, index has {}",
                layout.count,
                rows.len()
            )));
        }
        let dimension = layout.dimension as usize;
        if let Some(bad) = rows.iter().find(|row| row.len() != dimension) {
            return Err(VectorError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }
        if layout.centroids.len() != layout.lists.len()
            || layout.centroids.iter().any(|c| c.len() != dimension)
            || layout
                .lists
                .iter()
                .flatten()
                .any(|&row| row as usize >= rows.len())
        {
            return Err(VectorError::Serialization(
                "sidecar layout is inconsistent".to_string(),
            ));
        }

        let mut flat = Vec::with_capacity(rows.len() * dimension);
        for row in rows {
            flat.extend_from_slice(row);
        }

        Ok(Self { layout, rows: flat })
    }

    pub fn dimension(&self) -> usize {
        self.layout.dimension as usize
    }

    pub fn probes(&self) -> usize {
        self.layout.probes as usize
    }

    pub fn cluster_count(&self) -> usize {
        self.layout.centroids.len()
    }

    fn row(&self, row: usize) -> &[f32] {
        let dimension = self.dimension();
        &self.rows[row * dimension..(row + 1) * dimension]
    }
}

impl AnnIndexHandle for IvfIndex {
    fn search(&self, query: &[f32], limit: usize) -> Vec<(usize, f32)> {
        if query.len() != self.dimension() || limit == 0 {
            return Vec::new();
        }

        let probed = select_top_k_by_mapped_score(
            self.layout.centroids.iter().enumerate(),
            self.probes(),
            |(cluster, centroid)| (dot(query, centroid), cluster),
        );

        let members = probed
            .into_iter()
            .flat_map(|(_, cluster)| self.layout.lists[cluster].iter().copied());

        select_top_k_by_mapped_score(members, limit, |row| {
            let row = row as usize;
            (dot(query, self.row(row)), row)
        })
        .into_iter()
        .map(|(score, row)| (row, score))
        .collect()
    }

    fn size(&self) -> usize {
        self.layout.count as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::similarity::normalise_vector;
    use rand::Rng;
    use tempfile::TempDir;

    fn random_rows(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let raw: Vec<f32> = (0..dim).map(|_| rng.random::<f32>() - 0.5).collect();
                normalise_vector(&raw)
            })
            .collect()
    }

    #[test]
    fn test_cluster_count() {
        assert_eq!(cluster_count(1), 1);
        assert_eq!(cluster_count(100), 10);
        assert_eq!(cluster_count(10_000_000), MAX_CLUSTERS);
    }

    #[test]
    fn test_finds_exact_match_first() {
        let rows = random_rows(400, 16, 3);
        let refs: Vec<&[f32]> = rows.iter().map(|r| r.as_slice()).collect();
        let index = IvfIndex::build(&refs, 16).unwrap();
        assert_eq!(index.size(), 400);

        for target in [0usize, 57, 399] {
            let hits = index.search(&rows[target], 5);
            assert_eq!(hits[0].0, target);
            assert!((hits[0].1 - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_probing_every_cluster_is_exact() {
        let rows = random_rows(200, 8, 9);
        let refs: Vec<&[f32]> = rows.iter().map(|r| r.as_slice()).collect();
        let index = IvfIndex::build(&refs, MAX_CLUSTERS).unwrap();

        let query = &rows[10];
        let hits: Vec<usize> = index.search(query, 10).into_iter().map(|h| h.0).collect();
        let mut exact: Vec<(usize, f32)> =
            rows.iter().enumerate().map(|(i, r)| (i, dot(query, r))).collect();
        exact.sort_by(|a, b| b.1.total_cmp(&a.1));
        let expected: Vec<usize> = exact.into_iter().take(10).map(|h| h.0).collect();
        assert_eq!(hits, expected);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.ann.bin");
        let rows = random_rows(50, 4, 1);
        let refs: Vec<&[f32]> = rows.iter().map(|r| r.as_slice()).collect();

        let built = IvfIndex::build(&refs, 4).unwrap();
        built.save(&path).unwrap();

        let loaded = IvfIndex::load(&path, &refs).unwrap();
        assert_eq!(loaded.layout, built.layout);
        assert_eq!(loaded.search(&rows[7], 3), built.search(&rows[7], 3));

        // Bound to a different number of rows: stale
        assert!(IvfIndex::load(&path, &refs[..10]).is_err());
    }

    #[test]
    fn test_missing_sidecar_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.ann.bin");
        assert!(matches!(IvfIndex::load(&path, &[]), Err(VectorError::Io(_))));
    }

    #[test]
    fn test_rejects_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.ann.bin");
        std::fs::write(&path, b"not an index").unwrap();
        assert!(matches!(
            IvfIndex::load(&path, &[]),
            Err(VectorError::Serialization(_))
        ));

        let mut bytes = MAGIC_BYTES.to_vec();
        bytes.extend_from_slice(&99u32.to_le_bytes());
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            IvfIndex::load(&path, &[]),
            Err(VectorError::VersionMismatch { actual: 99, .. })
        ));
    }

    #[test]
    fn test_build_rejects_bad_input() {
        assert!(IvfIndex::build(&[], 4).is_err());
        let a = [1.0, 0.0];
        let b = [1.0];
        assert!(IvfIndex::build(&[&a, &b], 4).is_err());
    }
}
