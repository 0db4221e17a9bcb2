//! # Chunk store
//!
//! In memory a chunk is a typed [`Chunk`] record. On disk the collection is a
//! single UTF-8 file in which every chunk is followed by a delimiter line of
//! forty hyphens:
//!
//! ```text
//! Dataset: a.csv
//! Number of rows: 10
//! ...
//! ----------------------------------------
//! Dataset: b.csv
//! ...
//! ----------------------------------------
//! ```
//!
//! Reading splits on the delimiter, trims each piece and drops empty pieces,
//! so leading/trailing whitespace inside a chunk does not survive a round trip.

use std::fs;
use std::path::Path;

use crate::error::{CatalogError, Result};
use crate::metadata::DatasetProfile;

/// Line separating chunks in the chunk file.
pub const CHUNK_DELIMITER: &str = "----------------------------------------";

/// One unit of retrieval. `id` is the chunk's position in its collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: usize,
    pub source_name: String,
    pub text: String,
}

impl Chunk {
    pub fn new(id: usize, source_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            source_name: source_name.into(),
            text: text.into(),
        }
    }

    pub fn from_profile(id: usize, profile: &DatasetProfile) -> Self {
        Self::new(id, profile.name.clone(), profile.to_string())
    }
}

/// Number raw chunk texts by position. The source name is read back from a
/// leading `Dataset: <name>` line when there is one.
pub fn chunks_from_texts<I, S>(texts: I) -> Vec<Chunk>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    texts
        .into_iter()
        .enumerate()
        .map(|(id, text)| {
            let text = text.into();
            let source_name = source_name_of(&text).unwrap_or_default();
            Chunk::new(id, source_name, text)
        })
        .collect()
}

fn source_name_of(text: &str) -> Option<String> {
    text.lines()
        .next()
        .and_then(|line| line.strip_prefix("Dataset: "))
        .map(|name| name.trim().to_string())
}

/// Join chunk texts into the chunk file format.
///
/// # Errors
/// [`CatalogError::InvalidChunk`] if a chunk contains the delimiter.
pub fn serialize_chunks(chunks: &[Chunk]) -> Result<String> {
    let mut out = String::new();
    for chunk in chunks {
        if chunk.text.contains(CHUNK_DELIMITER) {
            return Err(CatalogError::InvalidChunk(chunk.id));
        }
        out.push_str(&chunk.text);
        out.push('\n');
        out.push_str(CHUNK_DELIMITER);
        out.push('\n');
    }
    Ok(out)
}

/// Split a chunk file back into chunks, numbered by position.
pub fn deserialize_chunks(content: &str) -> Vec<Chunk> {
    chunks_from_texts(
        content
            .split(CHUNK_DELIMITER)
            .map(str::trim)
            .filter(|piece| !piece.is_empty()),
    )
}

pub fn write_chunks(path: &Path, chunks: &[Chunk]) -> Result<()> {
    fs::write(path, serialize_chunks(chunks)?)?;
    Ok(())
}

pub fn read_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let content = fs::read_to_string(path)?;
    Ok(deserialize_chunks(&content))
}
