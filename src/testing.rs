//! Deterministic embedders for unit tests; no model download involved.

use crate::embeddings::Embedder;
use crate::error::{CatalogError, Result};

/// Bag-of-words embedder: every lower-cased alphanumeric token is hashed into
/// one of `dimension` buckets, then the vector is L2-normalized. Equal texts get
/// equal vectors and texts sharing words end up close together.
pub struct HashingEmbedder {
    name: String,
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self::named("test/hashing", dimension)
    }

    pub fn named(name: &str, dimension: usize) -> Self {
        Self {
            name: name.to_string(),
            dimension,
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = blake3::hash(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&hash.as_bytes()[..8]);
            vector[(u64::from_le_bytes(bucket) % self.dimension as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(CatalogError::Encoding("cannot encode an empty batch".into()));
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Embedder whose model is never available.
pub struct FailingEmbedder {
    name: String,
}

impl FailingEmbedder {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        16
    }

    fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(CatalogError::Encoding("model unavailable".into()))
    }
}
