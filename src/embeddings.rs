//! # Embeddings
//!
//! Sentence embedding model used for both indexing and querying. Vectors are
//! only comparable when they come from the same model, so the model is chosen
//! once, by name, in [`CatalogConfig`](crate::config::CatalogConfig), and that
//! name is recorded in every index built with it.
//!
//! [`SentenceEmbeddingsModel`] runs a BERT-family model with Candle (pure Rust):
//! tokenize with padding to the longest text in the batch, run the encoder,
//! mean-pool over the attention mask, then L2-normalize. The default model,
//! `sentence-transformers/all-MiniLM-L6-v2`, produces 384-d vectors.
//!
//! ## Model resolution
//! - `model_dir` set: `config.json`, `tokenizer.json` and `model.safetensors`
//!   are read from that directory, no network access.
//! - otherwise the files are fetched (and cached) from the Hugging Face Hub
//!   at `embedding_model` / `model_revision`.

use std::error::Error;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use indicatif::{ProgressBar, ProgressStyle};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};

/// Longest token sequence fed to the encoder; longer texts are truncated.
const MAX_SEQUENCE_TOKENS: usize = 512;

type LoadResult<T> = std::result::Result<T, Box<dyn Error>>;

/// Anything that maps texts to equal-length dense vectors.
pub trait Embedder {
    /// Identity of the model; indexes built with one name can only be queried with it.
    fn model_name(&self) -> &str;

    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    /// Embed `texts`, returning one vector per text in input order.
    ///
    /// # Errors
    /// [`CatalogError::Encoding`] for an empty batch or a model failure.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::Encoding("model returned no vector for the query".into()))
    }
}

/// Sentence embeddings model using Candle (pure Rust)
pub struct SentenceEmbeddingsModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_name: String,
    dimension: usize,
}

impl SentenceEmbeddingsModel {
    /// Load the model named by `config`, from `model_dir` when set, otherwise from the Hub.
    ///
    /// # Errors
    /// [`CatalogError::ModelLoad`] if the files cannot be found, downloaded or parsed.
    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        let model_name = config.embedding_model.clone();
        let loaded = match &config.model_dir {
            Some(dir) => Self::load_from_dir(&model_name, dir),
            None => Self::load_from_hub(&model_name, &config.model_revision),
        };
        loaded.map_err(|e| CatalogError::ModelLoad {
            model: model_name,
            reason: e.to_string(),
        })
    }

    fn load_from_hub(model_id: &str, revision: &str) -> LoadResult<Self> {
        info!("Resolving embedding model {} ({}) from Hugging Face", model_id, revision);
        let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, revision.to_string());
        let api = Api::new()?;
        let api_repo = api.repo(repo);

        let config_filename = api_repo.get("config.json")?;
        let tokenizer_filename = api_repo.get("tokenizer.json")?;
        let weights_filename = api_repo.get("model.safetensors")?;

        Self::load_from_files(model_id, &config_filename, &tokenizer_filename, weights_filename)
    }

    fn load_from_dir(model_id: &str, dir: &Path) -> LoadResult<Self> {
        if !exists_nonempty_dir(dir) {
            return Err(format!(
                "model_dir points to a non-existent/empty directory: {}",
                dir.display()
            )
            .into());
        }
        info!("Loading embedding model {} from {}", model_id, dir.display());
        Self::load_from_files(
            model_id,
            &dir.join("config.json"),
            &dir.join("tokenizer.json"),
            dir.join("model.safetensors"),
        )
    }

    fn load_from_files(
        model_id: &str,
        config_filename: &Path,
        tokenizer_filename: &Path,
        weights_filename: PathBuf,
    ) -> LoadResult<Self> {
        let device = Device::Cpu;

        let config = std::fs::read_to_string(config_filename)?;
        let dimension = serde_json::from_str::<serde_json::Value>(&config)?
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .ok_or("config.json has no hidden_size")? as usize;
        let config: Config = serde_json::from_str(&config)?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| format!("Failed to load tokenizer: {}", e))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer.with_truncation(Some(TruncationParams {
            max_length: MAX_SEQUENCE_TOKENS,
            ..Default::default()
        }))
        .map_err(|e| format!("Failed to configure tokenizer: {}", e))?;

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_filename], DTYPE, &device)? };
        let model = BertModel::load(vb, &config)?;

        debug!("Embedding model {} loaded ({} dimensions)", model_id, dimension);
        Ok(Self {
            model,
            tokenizer,
            device,
            model_name: model_id.to_string(),
            dimension,
        })
    }

    fn forward_batch(&self, texts: &[String]) -> LoadResult<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| format!("Tokenization error: {}", e))?;

        let ids = encodings
            .iter()
            .map(|e| Tensor::new(e.get_ids(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let type_ids = encodings
            .iter()
            .map(|e| Tensor::new(e.get_type_ids(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let masks = encodings
            .iter()
            .map(|e| Tensor::new(e.get_attention_mask(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()?;

        let token_ids = Tensor::stack(&ids, 0)?;
        let token_type_ids = Tensor::stack(&type_ids, 0)?;
        let attention_mask = Tensor::stack(&masks, 0)?;

        // [batch, seq_len, hidden]
        let output = self
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = mean_pooling(&output, &attention_mask)?;
        let normalized = normalize(&pooled)?;

        Ok(normalized.to_vec2::<f32>()?)
    }
}

impl Embedder for SentenceEmbeddingsModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(CatalogError::Encoding("cannot encode an empty batch".into()));
        }
        self.forward_batch(texts)
            .map_err(|e| CatalogError::Encoding(e.to_string()))
    }
}

/// Mean pooling over token embeddings, counting only unmasked tokens.
fn mean_pooling(embeddings: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    // [batch, seq_len, 1] so it broadcasts over the hidden dimension
    let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
    let sum = embeddings.broadcast_mul(&mask)?.sum(1)?;
    let count = mask.sum(1)?.clamp(1f32, f32::INFINITY)?;
    sum.broadcast_div(&count)
}

/// L2 normalize each row.
fn normalize(tensor: &Tensor) -> candle_core::Result<Tensor> {
    let norm = tensor
        .sqr()?
        .sum_keepdim(1)?
        .sqrt()?
        .clamp(1e-12f32, f32::INFINITY)?;
    tensor.broadcast_div(&norm)
}

fn exists_nonempty_dir(p: &Path) -> bool {
    p.is_dir()
        && std::fs::read_dir(p)
            .map(|mut it| it.next().is_some())
            .unwrap_or(false)
}

/// Embed any number of texts in batches of `batch_size`, optionally showing a
/// progress bar, and check every vector has the embedder's dimension.
pub fn embed_all<E: Embedder + ?Sized>(
    embedder: &E,
    texts: &[String],
    batch_size: usize,
    show_progress: bool,
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Err(CatalogError::Encoding("cannot encode an empty batch".into()));
    }

    let bar = if show_progress {
        let bar = ProgressBar::new(texts.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message("Embedding");
        bar
    } else {
        ProgressBar::hidden()
    };

    let dimension = embedder.dimension();
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let embedded = embedder.embed(batch)?;
        if embedded.len() != batch.len() {
            return Err(CatalogError::Encoding(format!(
                "model returned {} vectors for {} texts",
                embedded.len(),
                batch.len()
            )));
        }
        if let Some(bad) = embedded.iter().find(|v| v.len() != dimension) {
            return Err(CatalogError::Encoding(format!(
                "model returned a {}-d vector, expected {}",
                bad.len(),
                dimension
            )));
        }
        vectors.extend(embedded);
        bar.inc(batch.len() as u64);
    }
    bar.finish_and_clear();

    Ok(vectors)
}
