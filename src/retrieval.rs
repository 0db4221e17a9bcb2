//! # Retrieval
//!
//! [`Retriever`] ties extraction, embedding and the vector index together and
//! owns the on-disk artifact set. It has two operations that matter:
//!
//! - **build**: embed every chunk, index the vectors and persist the lot as a
//!   new *generation*, then switch the `CURRENT` pointer to it.
//! - **search**: load the active generation, embed the query with the same
//!   model, and return the nearest chunk texts in rank order.
//!
//! ## Layout
//! ```text
//! <index_dir>/
//!   CURRENT                          YAML manifest of the active generation
//!   gen-<timestamp>-<fingerprint>/
//!     metadata_chunks.txt
//!     metadata_embeddings.bin
//!     metadata.index
//! ```
//!
//! A generation is fully written before `CURRENT` is replaced (temp file +
//! rename), so a failed build leaves the previous generation active and a
//! reader never sees a half-written set. The generation that was active
//! before the latest build is kept for readers still using it; older ones are
//! deleted.
//!
//! Whether anything has been indexed is decided by `CURRENT` alone; there is
//! no in-memory flag.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::chunk_store::{Chunk, deserialize_chunks, serialize_chunks};
use crate::config::CatalogConfig;
use crate::embeddings::{Embedder, embed_all};
use crate::error::{CatalogError, Result};
use crate::metadata::{csv_files_in, extract_metadata};
use crate::vector_store::{EmbeddingMatrix, FlatIndex};

pub const CURRENT_FILE: &str = "CURRENT";
pub const CHUNKS_FILE: &str = "metadata_chunks.txt";
pub const EMBEDDINGS_FILE: &str = "metadata_embeddings.bin";
pub const INDEX_FILE: &str = "metadata.index";
const GENERATION_PREFIX: &str = "gen-";

/// Description of one persisted generation, stored in `CURRENT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Directory name of the generation inside the index directory.
    pub generation: String,
    pub model: String,
    pub dimension: usize,
    pub chunks: usize,
    /// RFC 3339 build time.
    pub built_at: String,
    /// blake3 of the chunk file.
    pub fingerprint: String,
    /// Source name of each chunk, in chunk order. The chunk file holds text only.
    pub sources: Vec<String>,
}

/// A fully loaded and cross-checked generation.
#[derive(Debug, Clone)]
pub struct IndexedCatalog {
    pub manifest: Manifest,
    pub chunks: Vec<Chunk>,
    pub index: FlatIndex,
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// 1-based rank.
    pub rank: usize,
    /// Squared L2 distance to the query.
    pub distance: f32,
    pub chunk: Chunk,
}

/// Answer-generation collaborator: gets the question and the retrieved context.
pub trait AnswerGenerator {
    fn answer(&self, question: &str, context: &str) -> Result<String>;
}

/// Build/search context over one index directory and one embedding model.
pub struct Retriever<E: Embedder> {
    embedder: E,
    index_dir: PathBuf,
    top_k: usize,
    batch_size: usize,
    show_progress: bool,
}

impl<E: Embedder> Retriever<E> {
    pub fn new(embedder: E, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            embedder,
            index_dir: index_dir.into(),
            top_k: 3,
            batch_size: 32,
            show_progress: false,
        }
    }

    /// Retriever using the index directory, `top_k`, batch size and progress
    /// setting from `config`.
    pub fn from_config(embedder: E, config: &CatalogConfig) -> Result<Self> {
        Ok(Self {
            embedder,
            index_dir: config.resolved_index_dir()?,
            top_k: config.top_k,
            batch_size: config.batch_size,
            show_progress: config.show_progress,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// `k` used when a caller does not pick one.
    pub fn default_top_k(&self) -> usize {
        self.top_k
    }

    /// Whether a build has ever completed in this index directory.
    pub fn is_indexed(&self) -> bool {
        is_indexed(&self.index_dir)
    }

    /// Profile each table and build the index from the profiles, in the given order.
    pub fn build_from_tables(&self, paths: &[PathBuf]) -> Result<Manifest> {
        let chunks = paths
            .iter()
            .enumerate()
            .map(|(id, path)| Ok(Chunk::from_profile(id, &extract_metadata(path)?)))
            .collect::<Result<Vec<_>>>()?;
        info!("Extracted metadata for {} datasets", chunks.len());
        self.build(&chunks)
    }

    /// Build from every `*.csv` in `dir`, in file-name order.
    pub fn build_from_dir(&self, dir: &Path) -> Result<Manifest> {
        self.build_from_tables(&csv_files_in(dir)?)
    }

    /// Embed and index `chunks`, replacing whatever was indexed before.
    ///
    /// Chunk ids are reassigned by position and texts are trimmed, matching
    /// what a later load reads back.
    ///
    /// # Errors
    /// - [`CatalogError::InvalidChunk`] for an empty chunk or one containing the delimiter.
    /// - [`CatalogError::Encoding`] for zero chunks or a model failure.
    /// - [`CatalogError::Io`] if the artifacts cannot be written.
    ///
    /// On error the previously active generation stays active.
    pub fn build(&self, chunks: &[Chunk]) -> Result<Manifest> {
        let chunks: Vec<Chunk> = chunks
            .iter()
            .enumerate()
            .map(|(id, chunk)| Chunk::new(id, chunk.source_name.clone(), chunk.text.trim()))
            .collect();
        if let Some(empty) = chunks.iter().find(|c| c.text.is_empty()) {
            return Err(CatalogError::InvalidChunk(empty.id));
        }
        let chunk_file = serialize_chunks(&chunks)?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_all(&self.embedder, &texts, self.batch_size, self.show_progress)?;
        let dimension = self.embedder.dimension();
        let matrix = EmbeddingMatrix::from_rows(dimension, &vectors)?;
        let index = FlatIndex::from_vectors(self.embedder.model_name(), dimension, &vectors)?;

        fs::create_dir_all(&self.index_dir)?;
        // An unreadable CURRENT only narrows what pruning keeps.
        let previous = self.read_manifest().unwrap_or_else(|e| {
            warn!("Ignoring unreadable {}: {}", CURRENT_FILE, e);
            None
        });
        let fingerprint = blake3::hash(chunk_file.as_bytes()).to_hex().to_string();
        let (generation, staging) = self.create_generation_dir(&fingerprint)?;

        let manifest = Manifest {
            generation,
            model: self.embedder.model_name().to_string(),
            dimension,
            chunks: chunks.len(),
            built_at: Utc::now().to_rfc3339(),
            fingerprint,
            sources: chunks.iter().map(|c| c.source_name.clone()).collect(),
        };

        let written = fs::write(staging.join(CHUNKS_FILE), &chunk_file)
            .map_err(CatalogError::from)
            .and_then(|_| matrix.save(&staging.join(EMBEDDINGS_FILE)))
            .and_then(|_| index.dump(&staging.join(INDEX_FILE)))
            .and_then(|_| self.write_manifest(&manifest));
        if let Err(e) = written {
            warn!("Build failed, discarding {}: {}", staging.display(), e);
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!("Could not remove {}: {}", staging.display(), cleanup);
            }
            return Err(e);
        }

        info!(
            "Index built: {} chunks, {} dimensions, generation {}",
            manifest.chunks, manifest.dimension, manifest.generation
        );
        self.prune_generations(&manifest.generation, previous.as_ref().map(|m| m.generation.as_str()));
        Ok(manifest)
    }

    /// Load and cross-check the active generation.
    ///
    /// # Errors
    /// - [`CatalogError::NotIndexed`] when no build has completed.
    /// - [`CatalogError::ModelMismatch`] when the index came from another model.
    /// - [`CatalogError::Alignment`] when chunk, vector and index counts or
    ///   contents disagree.
    /// - [`CatalogError::IndexCorrupt`] when an artifact is missing or unreadable.
    pub fn load(&self) -> Result<IndexedCatalog> {
        let manifest = self
            .read_manifest()?
            .ok_or_else(|| CatalogError::NotIndexed(self.index_dir.clone()))?;
        let dir = self.index_dir.join(&manifest.generation);
        debug!("Loading generation {}", dir.display());

        let chunk_file = fs::read_to_string(require(&dir, CHUNKS_FILE)?)?;
        let matrix = EmbeddingMatrix::load(&require(&dir, EMBEDDINGS_FILE)?)?;
        let index = FlatIndex::load(&require(&dir, INDEX_FILE)?)?;

        if index.model() != self.embedder.model_name() {
            return Err(CatalogError::ModelMismatch {
                built: index.model().to_string(),
                configured: self.embedder.model_name().to_string(),
            });
        }
        if blake3::hash(chunk_file.as_bytes()).to_hex().as_str() != manifest.fingerprint {
            return Err(CatalogError::Alignment(format!(
                "chunk file in {} does not match its manifest",
                manifest.generation
            )));
        }

        let mut chunks = deserialize_chunks(&chunk_file);
        check_alignment(&manifest, &chunks, &matrix, &index)?;
        for (chunk, source) in chunks.iter_mut().zip(&manifest.sources) {
            chunk.source_name = source.clone();
        }

        Ok(IndexedCatalog {
            manifest,
            chunks,
            index,
        })
    }

    /// The `k` chunks nearest to `query`, with rank and distance.
    pub fn search_chunks(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(CatalogError::InvalidTopK);
        }
        let catalog = self.load()?;
        let query_vector = self.embedder.embed_query(query)?;
        let neighbors = catalog.index.search(&query_vector, k)?;

        neighbors
            .into_iter()
            .enumerate()
            .map(|(rank, neighbor)| {
                let chunk = catalog.chunks.get(neighbor.id).cloned().ok_or_else(|| {
                    CatalogError::Alignment(format!("index returned unknown chunk {}", neighbor.id))
                })?;
                Ok(SearchHit {
                    rank: rank + 1,
                    distance: neighbor.distance,
                    chunk,
                })
            })
            .collect()
    }

    /// Texts of the `k` chunks nearest to `query`, nearest first. `k` larger
    /// than the collection returns every chunk.
    ///
    /// # Errors
    /// [`CatalogError::InvalidTopK`] for `k == 0`, plus everything [`load`](Self::load)
    /// and the embedder can return. Never an empty list in place of an error.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<String>> {
        Ok(self
            .search_chunks(query, k)?
            .into_iter()
            .map(|hit| hit.chunk.text)
            .collect())
    }

    /// Retrieved chunk texts joined by newlines, ready to hand to an answer model.
    pub fn context(&self, query: &str, k: usize) -> Result<String> {
        Ok(self.search(query, k)?.join("\n"))
    }

    /// Retrieve context for `question` and pass both to `generator`.
    pub fn ask(
        &self,
        question: &str,
        k: usize,
        generator: &dyn AnswerGenerator,
    ) -> Result<String> {
        let context = self.context(question, k)?;
        generator.answer(question, &context)
    }

    fn read_manifest(&self) -> Result<Option<Manifest>> {
        let path = self.index_dir.join(CURRENT_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        serde_yaml::from_str(&content)
            .map(Some)
            .map_err(|e| CatalogError::corrupt(format!("unreadable {}: {e}", path.display())))
    }

    /// Replace `CURRENT` atomically.
    fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        let yaml = serde_yaml::to_string(manifest).map_err(|e| CatalogError::corrupt(e.to_string()))?;
        let mut staged = NamedTempFile::new_in(&self.index_dir)?;
        staged.write_all(yaml.as_bytes())?;
        staged.as_file().sync_all()?;
        staged
            .persist(self.index_dir.join(CURRENT_FILE))
            .map_err(|e| e.error)?;
        Ok(())
    }

    fn create_generation_dir(&self, fingerprint: &str) -> Result<(String, PathBuf)> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
        let base = format!("{GENERATION_PREFIX}{stamp}-{}", &fingerprint[..12]);
        let mut attempt = 0;
        loop {
            let name = if attempt == 0 {
                base.clone()
            } else {
                format!("{base}-{attempt}")
            };
            let path = self.index_dir.join(&name);
            match fs::create_dir(&path) {
                Ok(()) => return Ok((name, path)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Remove generations other than the active one and the one it replaced.
    fn prune_generations(&self, active: &str, previous: Option<&str>) {
        let entries = match fs::read_dir(&self.index_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not list {}: {}", self.index_dir.display(), e);
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(GENERATION_PREFIX) || name == active || Some(name.as_str()) == previous {
                continue;
            }
            debug!("Removing stale generation {}", name);
            if let Err(e) = fs::remove_dir_all(entry.path()) {
                warn!("Could not remove stale generation {}: {}", name, e);
            }
        }
    }
}

/// Whether `index_dir` has an active generation. Needs no embedder, so callers
/// can check before loading a model.
pub fn is_indexed(index_dir: &Path) -> bool {
    index_dir.join(CURRENT_FILE).is_file()
}

fn require(dir: &Path, file: &str) -> Result<PathBuf> {
    let path = dir.join(file);
    if path.is_file() {
        Ok(path)
    } else {
        Err(CatalogError::corrupt(format!("missing artifact {}", path.display())))
    }
}

fn check_alignment(
    manifest: &Manifest,
    chunks: &[Chunk],
    matrix: &EmbeddingMatrix,
    index: &FlatIndex,
) -> Result<()> {
    if chunks.len() != matrix.rows() || chunks.len() != index.len() || chunks.len() != manifest.chunks {
        return Err(CatalogError::Alignment(format!(
            "{} chunks, {} vectors, {} indexed entries, manifest expects {}",
            chunks.len(),
            matrix.rows(),
            index.len(),
            manifest.chunks
        )));
    }
    if manifest.sources.len() != chunks.len() {
        return Err(CatalogError::Alignment(format!(
            "manifest names {} sources for {} chunks",
            manifest.sources.len(),
            chunks.len()
        )));
    }
    if matrix.dimension() != index.dimension() || index.dimension() != manifest.dimension {
        return Err(CatalogError::corrupt(format!(
            "dimension mismatch: vectors have {}, index has {}, manifest expects {}",
            matrix.dimension(),
            index.dimension(),
            manifest.dimension
        )));
    }
    if matrix.as_slice() != index.as_slice() {
        return Err(CatalogError::Alignment(
            "vector matrix does not match the indexed vectors".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk_store::{CHUNK_DELIMITER, chunks_from_texts};
    use crate::testing::{FailingEmbedder, HashingEmbedder};
    use std::cell::RefCell;
    use tempfile::TempDir;

    const A_CSV: &str = "Dataset: a.csv\nNumber of rows: 10\nNumber of columns: 2\nColumns:\n  - id: type=int64, nulls=0";
    const B_CSV: &str = "Dataset: b.csv\nNumber of rows: 500\nNumber of columns: 3\nColumns:\n  - price: type=float64, nulls=4";
    const C_CSV: &str = "Dataset: c.csv\nNumber of rows: 7\nNumber of columns: 1\nColumns:\n  - city: type=object, nulls=0";

    fn retriever(dir: &TempDir) -> Retriever<HashingEmbedder> {
        Retriever::new(HashingEmbedder::new(64), dir.path()).with_batch_size(2)
    }

    fn sample_chunks() -> Vec<Chunk> {
        chunks_from_texts([A_CSV, B_CSV, C_CSV])
    }

    fn generations(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(GENERATION_PREFIX))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_search_before_build_is_not_indexed() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        assert!(!retriever.is_indexed());
        assert!(matches!(
            retriever.search("anything", 3),
            Err(CatalogError::NotIndexed(_))
        ));
    }

    #[test]
    fn test_build_then_search_returns_best_match_first() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        let manifest = retriever.build(&sample_chunks()).unwrap();

        assert!(retriever.is_indexed());
        assert_eq!(manifest.chunks, 3);
        assert_eq!(manifest.model, "test/hashing");

        let results = retriever.search(B_CSV, 1).unwrap();
        assert_eq!(results, vec![B_CSV.to_string()]);
        let hits = retriever.search_chunks(C_CSV, 2).unwrap();
        assert_eq!(hits[0].chunk.source_name, "c.csv");
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn test_artifacts_are_aligned_after_build() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        retriever.build(&sample_chunks()).unwrap();

        let catalog = retriever.load().unwrap();
        let generation = dir.path().join(&catalog.manifest.generation);
        let matrix = EmbeddingMatrix::load(&generation.join(EMBEDDINGS_FILE)).unwrap();
        assert_eq!(catalog.chunks, sample_chunks());
        assert_eq!(catalog.index.len(), 3);
        assert_eq!(matrix.rows(), 3);
        assert_eq!(matrix.dimension(), 64);
    }

    #[test]
    fn test_k_larger_than_collection_returns_all_chunks_once() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        retriever.build(&sample_chunks()).unwrap();

        let mut results = retriever.search("rows columns", 10).unwrap();
        assert_eq!(results.len(), 3);
        results.sort();
        results.dedup();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_zero_k_is_rejected() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        retriever.build(&sample_chunks()).unwrap();
        assert!(matches!(
            retriever.search("rows", 0),
            Err(CatalogError::InvalidTopK)
        ));
    }

    #[test]
    fn test_empty_query_still_returns_results() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        retriever.build(&sample_chunks()).unwrap();
        assert_eq!(retriever.search("", 2).unwrap().len(), 2);
    }

    #[test]
    fn test_identical_chunks_come_back_in_build_order() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        retriever
            .build(&chunks_from_texts(["other words", "same text", "same text"]))
            .unwrap();

        let hits = retriever.search_chunks("same text", 2).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.chunk.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_rebuilding_with_same_input_gives_same_results() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        let queries = ["which dataset has the most rows?", "price nulls", "city"];

        retriever.build(&sample_chunks()).unwrap();
        let first: Vec<Vec<String>> = queries.iter().map(|q| retriever.search(q, 2).unwrap()).collect();
        retriever.build(&sample_chunks()).unwrap();
        let second: Vec<Vec<String>> = queries.iter().map(|q| retriever.search(q, 2).unwrap()).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_rebuild_replaces_previous_chunks() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        retriever.build(&sample_chunks()).unwrap();
        retriever.build(&chunks_from_texts([C_CSV])).unwrap();

        assert_eq!(retriever.search("rows", 5).unwrap(), vec![C_CSV.to_string()]);
    }

    #[test]
    fn test_old_generations_are_pruned() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        let mut manifests = Vec::new();
        for _ in 0..4 {
            manifests.push(retriever.build(&sample_chunks()).unwrap());
        }

        let mut expected = vec![manifests[2].generation.clone(), manifests[3].generation.clone()];
        expected.sort();
        assert_eq!(generations(&dir), expected);
    }

    #[test]
    fn test_failed_build_leaves_previous_index_intact() {
        let dir = TempDir::new().unwrap();
        let good = retriever(&dir);
        good.build(&sample_chunks()).unwrap();
        let before = generations(&dir);

        let broken = Retriever::new(FailingEmbedder::named("test/hashing"), dir.path());
        assert!(matches!(
            broken.build(&chunks_from_texts([A_CSV])),
            Err(CatalogError::Encoding(_))
        ));

        assert_eq!(generations(&dir), before);
        assert_eq!(good.search("rows", 5).unwrap().len(), 3);
    }

    #[test]
    fn test_invalid_chunks_are_rejected_before_embedding() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        let with_delimiter = format!("a\n{CHUNK_DELIMITER}\nb");

        assert!(matches!(
            retriever.build(&chunks_from_texts(["fine", with_delimiter.as_str()])),
            Err(CatalogError::InvalidChunk(1))
        ));
        assert!(matches!(
            retriever.build(&chunks_from_texts(["fine", "   "])),
            Err(CatalogError::InvalidChunk(1))
        ));
        assert!(matches!(
            retriever.build(&[]),
            Err(CatalogError::Encoding(_))
        ));
        assert!(!retriever.is_indexed());
    }

    #[test]
    fn test_extra_chunk_is_an_alignment_error() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        let manifest = retriever.build(&sample_chunks()).unwrap();

        let tampered = serialize_chunks(&chunks_from_texts([A_CSV, B_CSV, C_CSV, "extra"])).unwrap();
        let chunk_path = dir.path().join(&manifest.generation).join(CHUNKS_FILE);
        fs::write(&chunk_path, &tampered).unwrap();

        // Make the fingerprint agree so the count check is what fires.
        let mut current = manifest.clone();
        current.fingerprint = blake3::hash(tampered.as_bytes()).to_hex().to_string();
        retriever.write_manifest(&current).unwrap();

        assert!(matches!(
            retriever.search("rows", 1),
            Err(CatalogError::Alignment(_))
        ));
    }

    #[test]
    fn test_mismatched_vector_matrix_is_an_alignment_error() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        let manifest = retriever.build(&sample_chunks()).unwrap();

        let short = EmbeddingMatrix::from_rows(64, &[vec![0.0; 64], vec![0.0; 64]]).unwrap();
        short
            .save(&dir.path().join(&manifest.generation).join(EMBEDDINGS_FILE))
            .unwrap();

        assert!(matches!(
            retriever.load(),
            Err(CatalogError::Alignment(_))
        ));
    }

    #[test]
    fn test_vector_matrix_of_other_width_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        let manifest = retriever.build(&sample_chunks()).unwrap();

        let narrow = EmbeddingMatrix::from_rows(32, &[vec![0.0; 32], vec![0.0; 32], vec![0.0; 32]]).unwrap();
        narrow
            .save(&dir.path().join(&manifest.generation).join(EMBEDDINGS_FILE))
            .unwrap();

        assert!(matches!(
            retriever.load(),
            Err(CatalogError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn test_rebuild_recovers_from_unreadable_current() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        retriever.build(&sample_chunks()).unwrap();
        fs::write(dir.path().join(CURRENT_FILE), ": : not yaml [").unwrap();
        assert!(matches!(
            retriever.search("rows", 1),
            Err(CatalogError::IndexCorrupt(_))
        ));

        let manifest = retriever.build(&chunks_from_texts([C_CSV])).unwrap();

        assert_eq!(generations(&dir), vec![manifest.generation]);
        assert_eq!(retriever.search("rows", 5).unwrap(), vec![C_CSV.to_string()]);
    }

    #[test]
    fn test_source_names_survive_persistence() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        retriever
            .build(&[
                Chunk::new(0, "sales.csv", "quarterly revenue by region"),
                Chunk::new(1, "", "staff headcount"),
            ])
            .unwrap();

        let hits = retriever.search_chunks("quarterly revenue by region", 2).unwrap();
        assert_eq!(hits[0].chunk.id, 0);
        assert_eq!(hits[0].chunk.source_name, "sales.csv");
        assert_eq!(hits[1].chunk.source_name, "");
        assert_eq!(retriever.load().unwrap().manifest.sources, vec!["sales.csv", ""]);
    }

    #[test]
    fn test_missing_sources_in_manifest_is_an_alignment_error() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        let mut manifest = retriever.build(&sample_chunks()).unwrap();
        manifest.sources.pop();
        retriever.write_manifest(&manifest).unwrap();

        assert!(matches!(
            retriever.load(),
            Err(CatalogError::Alignment(_))
        ));
    }

    #[test]
    fn test_is_indexed_without_an_embedder() {
        let dir = TempDir::new().unwrap();
        assert!(!is_indexed(dir.path()));
        retriever(&dir).build(&sample_chunks()).unwrap();
        assert!(is_indexed(dir.path()));
    }

    #[test]
    fn test_corrupt_index_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        let manifest = retriever.build(&sample_chunks()).unwrap();

        fs::write(dir.path().join(&manifest.generation).join(INDEX_FILE), b"\xff\xff").unwrap();
        assert!(matches!(
            retriever.search("rows", 1),
            Err(CatalogError::IndexCorrupt(_))
        ));

        fs::remove_file(dir.path().join(&manifest.generation).join(INDEX_FILE)).unwrap();
        assert!(matches!(
            retriever.search("rows", 1),
            Err(CatalogError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn test_searching_with_a_different_model_is_refused() {
        let dir = TempDir::new().unwrap();
        retriever(&dir).build(&sample_chunks()).unwrap();

        let other = Retriever::new(HashingEmbedder::named("test/other", 64), dir.path());
        assert!(matches!(
            other.search("rows", 1),
            Err(CatalogError::ModelMismatch { .. })
        ));
    }

    #[test]
    fn test_build_from_dir_indexes_profiles() {
        let data = TempDir::new().unwrap();
        fs::write(data.path().join("small.csv"), "id,name\n1,x\n2,y\n").unwrap();
        fs::write(data.path().join("prices.csv"), "sku,price\na,1.5\nb,\n").unwrap();
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);

        let manifest = retriever.build_from_dir(data.path()).unwrap();
        assert_eq!(manifest.chunks, 2);

        let hits = retriever.search_chunks("sku price float64", 1).unwrap();
        assert_eq!(hits[0].chunk.source_name, "prices.csv");
        assert!(hits[0].chunk.text.starts_with("Dataset: prices.csv\nNumber of rows: 2"));
    }

    #[test]
    fn test_build_from_tables_propagates_parse_errors() {
        let data = TempDir::new().unwrap();
        let bad = data.path().join("bad.csv");
        fs::write(&bad, "a,b\n1\n").unwrap();
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);

        assert!(matches!(
            retriever.build_from_tables(&[bad]),
            Err(CatalogError::Parse { .. })
        ));
        assert!(!retriever.is_indexed());
    }

    struct RecordingGenerator {
        seen: RefCell<Option<(String, String)>>,
    }

    impl AnswerGenerator for RecordingGenerator {
        fn answer(&self, question: &str, context: &str) -> Result<String> {
            *self.seen.borrow_mut() = Some((question.to_string(), context.to_string()));
            Ok("b.csv has the most rows".to_string())
        }
    }

    #[test]
    fn test_ask_hands_joined_context_to_generator() {
        let dir = TempDir::new().unwrap();
        let retriever = retriever(&dir);
        retriever.build(&sample_chunks()).unwrap();

        let generator = RecordingGenerator {
            seen: RefCell::new(None),
        };
        let answer = retriever.ask("most rows?", 2, &generator).unwrap();
        assert_eq!(answer, "b.csv has the most rows");

        let (question, context) = generator.seen.borrow().clone().unwrap();
        assert_eq!(question, "most rows?");
        assert_eq!(context, retriever.search("most rows?", 2).unwrap().join("\n"));
    }

    #[test]
    #[ignore = "downloads all-MiniLM-L6-v2 from the Hugging Face Hub"]
    fn test_most_rows_question_prefers_larger_dataset() {
        use crate::embeddings::SentenceEmbeddingsModel;

        let dir = TempDir::new().unwrap();
        let model = SentenceEmbeddingsModel::from_config(&CatalogConfig::default()).unwrap();
        let retriever = Retriever::new(model, dir.path());
        retriever.build(&chunks_from_texts([A_CSV, B_CSV])).unwrap();

        let results = retriever.search("which dataset has the most rows?", 1).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].contains("b.csv"));
    }
}
