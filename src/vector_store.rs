//! # VectorStore
//!
//! Exact nearest-neighbour search for the catalog, plus the two binary
//! artifacts that hold vectors on disk.
//!
//! ## Responsibilities
//! - **Indexing**: [`FlatIndex`] keeps every vector and answers k-NN queries by
//!   scanning all of them under squared Euclidean distance. Results are
//!   nearest first; equal distances are ordered by the lower vector id, so
//!   identical chunks always come back in build order.
//! - **Persistence**: the index dumps itself with `bincode` and records the
//!   name of the model that produced its vectors. [`EmbeddingMatrix`] is the
//!   raw row-major matrix of the same vectors, one row per chunk.
//!
//! ## Matrix layout
//! ```text
//! magic  "AWCVEC" 0x00 0x01      8 bytes
//! rows   u64 little-endian
//! dims   u64 little-endian
//! data   rows * dims f32 little-endian, row-major
//! ```
//!
//! ## Quick Example
//! ```
//! use awful_catalog::vector_store::FlatIndex;
//!
//! let vectors = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![5.0, 5.0]];
//! let index = FlatIndex::from_vectors("demo-model", 2, &vectors).unwrap();
//! let hits = index.search(&[0.9, 0.1], 2).unwrap();
//! assert_eq!(hits.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 0]);
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

const INDEX_FORMAT_VERSION: u32 = 1;
/// Decoding refuses indexes claiming more than 1 GiB of data.
const MAX_INDEX_BYTES: usize = 1 << 30;
const MATRIX_MAGIC: &[u8; 8] = b"AWCVEC\x00\x01";
const MATRIX_HEADER_LEN: usize = 8 + 8 + 8;

/// Squared Euclidean distance between two equal-length vectors.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// One search hit: the vector's position in the index and its squared distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

/// Flat (brute force) index over fixed-dimension vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    version: u32,
    /// Model that produced the vectors.
    model: String,
    dimension: usize,
    /// Row-major vector data, `len() * dimension` values.
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index.
    ///
    /// # Errors
    /// [`CatalogError::IndexCorrupt`] for a zero dimension.
    pub fn new(model: impl Into<String>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(CatalogError::corrupt("index dimension must be positive"));
        }
        Ok(Self {
            version: INDEX_FORMAT_VERSION,
            model: model.into(),
            dimension,
            data: Vec::new(),
        })
    }

    pub fn from_vectors(
        model: impl Into<String>,
        dimension: usize,
        vectors: &[Vec<f32>],
    ) -> Result<Self> {
        let mut index = Self::new(model, dimension)?;
        for vector in vectors {
            index.add(vector)?;
        }
        Ok(index)
    }

    /// Append a vector and return its id.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        if vector.len() != self.dimension {
            return Err(CatalogError::corrupt(format!(
                "dimension mismatch: vector has {}, index has {}",
                vector.len(),
                self.dimension
            )));
        }
        let id = self.len();
        self.data.extend_from_slice(vector);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        let start = id.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Raw row-major vector data.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// The `k` nearest vectors to `query`, nearest first, ties by lower id.
    /// Asking for more than [`len`](Self::len) returns every vector.
    ///
    /// # Errors
    /// [`CatalogError::IndexCorrupt`] when `query` has the wrong dimension.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(CatalogError::corrupt(format!(
                "dimension mismatch: query has {}, index has {}",
                query.len(),
                self.dimension
            )));
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(id, row)| Neighbor {
                id,
                distance: squared_l2(query, row),
            })
            .collect();
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        neighbors.truncate(k);
        Ok(neighbors)
    }

    /// Write the index to `path`.
    pub fn dump(&self, path: &Path) -> Result<()> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CatalogError::corrupt(format!("failed to encode index: {e}")))?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Read an index written by [`dump`](Self::dump).
    ///
    /// # Errors
    /// [`CatalogError::IndexCorrupt`] if the file cannot be decoded or is internally
    /// inconsistent; [`CatalogError::Io`] if it cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let (index, read): (FlatIndex, usize) =
            bincode::serde::decode_from_slice(
                &bytes,
                bincode::config::standard().with_limit::<MAX_INDEX_BYTES>(),
            )
            .map_err(|e| CatalogError::corrupt(format!("failed to decode {}: {e}", path.display())))?;

        if read != bytes.len() {
            return Err(CatalogError::corrupt(format!(
                "{} has {} trailing bytes",
                path.display(),
                bytes.len() - read
            )));
        }
        if index.version != INDEX_FORMAT_VERSION {
            return Err(CatalogError::corrupt(format!(
                "unsupported index format version {}",
                index.version
            )));
        }
        if index.dimension == 0 || index.data.len() % index.dimension != 0 {
            return Err(CatalogError::corrupt(format!(
                "{} values do not fill rows of dimension {}",
                index.data.len(),
                index.dimension
            )));
        }
        Ok(index)
    }
}

/// Row-major matrix of embedding vectors, one row per chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    rows: usize,
    dimension: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn from_rows(dimension: usize, rows: &[Vec<f32>]) -> Result<Self> {
        let mut data = Vec::with_capacity(rows.len() * dimension);
        for row in rows {
            if row.len() != dimension {
                return Err(CatalogError::corrupt(format!(
                    "dimension mismatch: row has {}, matrix has {}",
                    row.len(),
                    dimension
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            dimension,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(MATRIX_HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(MATRIX_MAGIC);
        bytes.extend_from_slice(&(self.rows as u64).to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u64).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MATRIX_HEADER_LEN || &bytes[..8] != MATRIX_MAGIC {
            return Err(CatalogError::corrupt("embedding matrix has no valid header"));
        }
        let read_u64 = |at: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(buf) as usize
        };
        let rows = read_u64(8);
        let dimension = read_u64(16);

        let expected = rows
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(MATRIX_HEADER_LEN));
        if expected != Some(bytes.len()) {
            return Err(CatalogError::corrupt(format!(
                "embedding matrix header says {rows}x{dimension} but file has {} bytes",
                bytes.len()
            )));
        }

        let data = bytes[MATRIX_HEADER_LEN..]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self {
            rows,
            dimension,
            data,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_bytes())?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_bytes(&fs::read(path)?)
    }
}
