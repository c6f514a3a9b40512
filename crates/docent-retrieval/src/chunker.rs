use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A contiguous window of document text.
///
/// Offsets count characters (Unicode scalar values), not bytes; `end_offset`
/// is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: usize,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Chunk {
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

impl ChunkerConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` if `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge {
                size: self.chunk_size,
                overlap: self.chunk_overlap,
            });
        }
        Ok(())
    }
}

/// Fixed-window character splitter. Construction validates the window.
#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn new(config: ChunkerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Split `text` into overlapping windows.
    ///
    /// Text no longer than `chunk_size` (including the empty string) yields a
    /// single chunk. Otherwise the window start advances by
    /// `chunk_size - chunk_overlap` and stops once a window reaches the end.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let size = self.config.chunk_size;
        let step = size - self.config.chunk_overlap;

        // Byte offset of every char start, plus the end of the text.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let len = bounds.len() - 1;

        if len <= size {
            return vec![Chunk {
                id: 0,
                text: text.to_owned(),
                start_offset: 0,
                end_offset: len,
            }];
        }

        let mut chunks = Vec::with_capacity(expected_count(len, size, self.config.chunk_overlap));
        let mut start = 0;
        loop {
            let end = (start + size).min(len);
            chunks.push(Chunk {
                id: chunks.len(),
                text: text[bounds[start]..bounds[end]].to_owned(),
                start_offset: start,
                end_offset: end,
            });
            if end == len {
                break;
            }
            start += step;
        }

        tracing::debug!(
            chars = len,
            chunk_size = size,
            chunk_overlap = self.config.chunk_overlap,
            chunks = chunks.len(),
            "document chunked"
        );
        chunks
    }
}

/// Split `text` into chunks of `size` characters overlapping by `overlap`.
///
/// # Errors
///
/// Returns `ConfigError` if `size == 0` or `overlap >= size`.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>, ConfigError> {
    let chunker = TextChunker::new(ChunkerConfig {
        chunk_size: size,
        chunk_overlap: overlap,
    })?;
    Ok(chunker.split(text))
}

/// `ceil((len - overlap) / (size - overlap))` for `len > size`, else 1.
#[must_use]
pub fn expected_count(len: usize, size: usize, overlap: usize) -> usize {
    if len <= size {
        return 1;
    }
    (len - overlap).div_ceil(size - overlap)
}
