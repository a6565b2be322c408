use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// Configuration for document chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks
    pub chunk_overlap: usize,
    /// Maximum total chunks to collect per source
    pub max_chunks: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            max_chunks: 200,
        }
    }
}

/// A text chunk with source information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    /// Source identifier (filename)
    pub source: String,
    /// Chunk index within the source
    pub chunk_index: usize,
}

/// Splits documents into overlapping character-window chunks for
/// ingestion.
#[derive(Debug, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split text into overlapping chunks.
    pub fn split(&self, text: &str, source: &str) -> Vec<TextChunk> {
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let max_chunks = self.config.max_chunks;

        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();

        let mut chunks = Vec::new();
        if total_chars == 0 {
            return chunks;
        }

        let step = chunk_size.saturating_sub(overlap).max(1);
        let mut start = 0;
        let mut chunk_index = 0;

        while start < total_chars && chunks.len() < max_chunks {
            let end = (start + chunk_size).min(total_chars);
            let chunk_text: String = chars[start..end].iter().collect();
            let trimmed = chunk_text.trim();

            if !trimmed.is_empty() {
                chunks.push(TextChunk {
                    text: trimmed.to_string(),
                    source: source.to_string(),
                    chunk_index,
                });
                chunk_index += 1;
            }

            start += step;
        }

        chunks
    }

    /// Collect chunks from every `.md` and `.txt` file directly under
    /// `dir`.
    pub fn collect_from_dir(&self, dir: &Path) -> Result<Vec<TextChunk>, ApiError> {
        let entries = fs::read_dir(dir).map_err(|err| {
            ApiError::Config(format!("failed to read {}: {}", dir.display(), err))
        })?;

        let mut all_chunks = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| {
                ApiError::Config(format!("failed to read {}: {}", dir.display(), err))
            })?;
            let path = entry.path();

            let is_text = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("txt"))
                .unwrap_or(false);
            if !path.is_file() || !is_text {
                continue;
            }

            let source = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("unknown")
                .to_string();

            match fs::read_to_string(&path) {
                Ok(text) => all_chunks.extend(self.split(&text, &source)),
                Err(err) => {
                    tracing::warn!("Skipping {}: {}", path.display(), err);
                }
            }
        }

        Ok(all_chunks)
    }
}
