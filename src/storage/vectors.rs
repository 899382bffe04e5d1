//! Memory-mapped compact vector rows with decode-on-access.
//!
//! The binary file is a flat row-major array of `count × dimension` elements.
//! Rows are decoded into `f32` the first time they are read and cached per
//! row, so repeated access to a float16 file does not re-decode.

use crate::error::{ErrorContext, GitsemError, GitsemResult};
use crate::types::VectorDtype;
use crate::vector::{decode_f16, decode_f32};
use memmap2::{Mmap, MmapOptions};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

enum VectorBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl VectorBytes {
    fn as_slice(&self) -> &[u8] {
        match self {
            VectorBytes::Mapped(mmap) => mmap,
            VectorBytes::Owned(bytes) => bytes,
        }
    }
}

/// Read-only view over a compact vector file.
pub struct CompactVectors {
    path: PathBuf,
    bytes: VectorBytes,
    dtype: VectorDtype,
    dimension: usize,
    count: usize,
    decoded: Vec<OnceLock<Vec<f32>>>,
}

impl CompactVectors {
    /// Map `path` and check its length against the declared shape.
    pub fn open(
        path: &Path,
        dtype: VectorDtype,
        dimension: usize,
        count: usize,
    ) -> GitsemResult<Self> {
        let expected = expected_len(path, dtype, dimension, count)?;
        let file = File::open(path).read_path(path)?;
        let actual = file.metadata().read_path(path)?.len();
        if actual != expected as u64 {
            return Err(GitsemError::format(
                path,
                format!(
                    "vector file is {actual} bytes, expected {expected} ({count} × {dimension} × {})",
                    dtype.element_size()
                ),
            ));
        }

        // Zero-length files cannot be mapped on every platform.
        let bytes = if expected == 0 {
            VectorBytes::Owned(Vec::new())
        } else {
            // SAFETY: the file is only ever replaced by rename, never truncated in place,
            // so the mapped inode stays valid for the lifetime of the map.
            let mmap = unsafe { MmapOptions::new().map(&file) }.read_path(path)?;
            VectorBytes::Mapped(mmap)
        };

        Ok(Self::with_bytes(path, bytes, dtype, dimension, count))
    }

    /// Wrap bytes already in memory.
    pub fn from_bytes(
        bytes: Vec<u8>,
        dtype: VectorDtype,
        dimension: usize,
        count: usize,
    ) -> GitsemResult<Self> {
        let path = Path::new("<memory>");
        let expected = expected_len(path, dtype, dimension, count)?;
        if bytes.len() != expected {
            return Err(GitsemError::format(
                path,
                format!("vector buffer is {} bytes, expected {expected}", bytes.len()),
            ));
        }
        Ok(Self::with_bytes(
            path,
            VectorBytes::Owned(bytes),
            dtype,
            dimension,
            count,
        ))
    }

    fn with_bytes(
        path: &Path,
        bytes: VectorBytes,
        dtype: VectorDtype,
        dimension: usize,
        count: usize,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            bytes,
            dtype,
            dimension,
            count,
            decoded: (0..count).map(|_| OnceLock::new()).collect(),
        }
    }

    /// Decoded row, or `None` past the end.
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        let cell = self.decoded.get(row)?;
        Some(cell.get_or_init(|| self.decode_row(row)).as_slice())
    }

    fn decode_row(&self, row: usize) -> Vec<f32> {
        let width = self.dimension * self.dtype.element_size();
        let start = row * width;
        let raw = &self.bytes.as_slice()[start..start + width];
        match self.dtype {
            VectorDtype::F32 => decode_f32(raw),
            VectorDtype::F16 => decode_f16(raw),
        }
    }

    /// Rows decoded so far.
    pub fn decoded_rows(&self) -> usize {
        self.decoded.iter().filter(|cell| cell.get().is_some()).count()
    }

    pub fn dtype(&self) -> VectorDtype {
        self.dtype
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for CompactVectors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompactVectors")
            .field("path", &self.path)
            .field("dtype", &self.dtype)
            .field("dimension", &self.dimension)
            .field("count", &self.count)
            .finish()
    }
}

fn expected_len(
    path: &Path,
    dtype: VectorDtype,
    dimension: usize,
    count: usize,
) -> GitsemResult<usize> {
    dimension
        .checked_mul(count)
        .and_then(|n| n.checked_mul(dtype.element_size()))
        .ok_or_else(|| GitsemError::format(path, "declared vector shape overflows"))
}

/// One commit's embedding: either owned, or a row of a compact file decoded on first read.
#[derive(Clone)]
pub enum Embedding {
    Owned(Vec<f32>),
    Row {
        store: Arc<CompactVectors>,
        row: usize,
    },
}

impl Embedding {
    pub fn as_slice(&self) -> &[f32] {
        match self {
            Embedding::Owned(values) => values,
            // Rows are range-checked when the index is loaded.
            Embedding::Row { store, row } => store.row(*row).unwrap_or(&[]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Embedding::Owned(values) => values.len(),
            Embedding::Row { store, .. } => store.dimension(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.as_slice().to_vec()
    }

    /// Whether the values have been materialised.
    pub fn is_decoded(&self) -> bool {
        match self {
            Embedding::Owned(_) => true,
            Embedding::Row { store, row } => store
                .decoded
                .get(*row)
                .is_some_and(|cell| cell.get().is_some()),
        }
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Embedding::Owned(values)
    }
}

impl PartialEq for Embedding {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl fmt::Debug for Embedding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Embedding::Owned(values) => write!(f, "Embedding::Owned(len={})", values.len()),
            Embedding::Row { store, row } => {
                write!(f, "Embedding::Row(row={row}, dim={})", store.dimension())
            }
        }
    }
}

impl Serialize for Embedding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Embedding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<f32>::deserialize(deserializer).map(Embedding::Owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{encode_f16, encode_f32};
    use tempfile::TempDir;

    #[test]
    fn test_open_validates_length() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.vec.f32");
        let mut bytes = Vec::new();
        encode_f32(&[1.0, 2.0, 3.0, 4.0], &mut bytes);
        std::fs::write(&path, &bytes).unwrap();

        let store = CompactVectors::open(&path, VectorDtype::F32, 2, 2).unwrap();
        assert_eq!(store.row(1), Some(&[3.0, 4.0][..]));
        assert_eq!(store.row(2), None);

        let err = CompactVectors::open(&path, VectorDtype::F32, 3, 2).unwrap_err();
        assert!(matches!(err, GitsemError::Format { .. }));
    }

    #[test]
    fn test_empty_file_opens() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.vec.f16");
        std::fs::write(&path, []).unwrap();
        let store = CompactVectors::open(&path, VectorDtype::F16, 384, 0).unwrap();
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_rows_decode_lazily_once() {
        let mut bytes = Vec::new();
        encode_f16(&[0.5, -0.25, 1.0, 0.0], &mut bytes);
        let store = Arc::new(CompactVectors::from_bytes(bytes, VectorDtype::F16, 2, 2).unwrap());

        let first = Embedding::Row {
            store: Arc::clone(&store),
            row: 0,
        };
        let second = Embedding::Row {
            store: Arc::clone(&store),
            row: 1,
        };
        assert_eq!(store.decoded_rows(), 0);
        assert!(!first.is_decoded());

        assert_eq!(first.as_slice(), &[0.5, -0.25]);
        assert_eq!(store.decoded_rows(), 1);
        assert!(!second.is_decoded());

        // Same allocation on repeated access
        let a = first.as_slice().as_ptr();
        let b = first.as_slice().as_ptr();
        assert_eq!(a, b);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn test_embedding_equality_and_serde() {
        let store = Arc::new(
            CompactVectors::from_bytes(
                {
                    let mut b = Vec::new();
                    encode_f32(&[0.1, 0.2], &mut b);
                    b
                },
                VectorDtype::F32,
                2,
                1,
            )
            .unwrap(),
        );
        let lazy = Embedding::Row { store, row: 0 };
        let owned = Embedding::from(vec![0.1, 0.2]);
        assert_eq!(lazy, owned);

        let json = serde_json::to_string(&lazy).unwrap();
        let back: Embedding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, owned);
    }
}
