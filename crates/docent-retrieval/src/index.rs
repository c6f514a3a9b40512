//! Flat exact-search embedding index over one document's chunks.

use std::cmp::Ordering;

use docent_llm::LlmProvider;

use crate::chunker::Chunk;
use crate::error::{ConfigError, EmbeddingError, RetrievalError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    pub chunk_id: usize,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexStats {
    pub chunk_count: usize,
    pub dims: usize,
    pub average_chunk_chars: f64,
}

/// Immutable after [`EmbeddingIndex::build`]; vectors are stored unit-normalized
/// so a dot product is the cosine similarity.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    vectors: Vec<Vec<f32>>,
    dims: usize,
    total_chars: usize,
}

impl EmbeddingIndex {
    /// Embed every chunk through `embedder` and store one vector per chunk id.
    ///
    /// An empty chunk list produces an empty index without calling the embedder.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError` if the provider fails, a vector is empty, or
    /// vector lengths disagree.
    pub async fn build<E: LlmProvider>(
        embedder: &E,
        chunks: &[Chunk],
    ) -> Result<Self, EmbeddingError> {
        let mut vectors = Vec::with_capacity(chunks.len());
        let mut dims = 0;

        for chunk in chunks {
            let vector = embedder.embed(&chunk.text).await?;
            if vector.is_empty() {
                return Err(EmbeddingError::EmptyVector { chunk_id: chunk.id });
            }
            if dims == 0 {
                dims = vector.len();
            } else if vector.len() != dims {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dims,
                    actual: vector.len(),
                });
            }
            vectors.push(normalize(vector));
        }

        let index = Self {
            vectors,
            dims,
            total_chars: chunks.iter().map(Chunk::char_len).sum(),
        };
        tracing::debug!(
            provider = embedder.name(),
            chunks = index.len(),
            dims,
            "embedding index built"
        );
        Ok(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[must_use]
    pub fn dims(&self) -> usize {
        self.dims
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> IndexStats {
        let average_chunk_chars = if self.vectors.is_empty() {
            0.0
        } else {
            self.total_chars as f64 / self.vectors.len() as f64
        };
        IndexStats {
            chunk_count: self.vectors.len(),
            dims: self.dims,
            average_chunk_chars,
        }
    }

    /// Return the `k` chunks most similar to `query`, best first.
    ///
    /// Ties are broken by lower chunk id. An empty index returns no results
    /// without embedding the query.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ZeroTopK` for `k == 0`, or `EmbeddingError` if the
    /// query cannot be embedded or its dimension differs from the index.
    pub async fn search<E: LlmProvider>(
        &self,
        embedder: &E,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        if k == 0 {
            return Err(ConfigError::ZeroTopK.into());
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = embedder.embed(query).await.map_err(EmbeddingError::from)?;
        if query_vector.is_empty() {
            return Err(EmbeddingError::EmptyQueryVector.into());
        }
        if query_vector.len() != self.dims {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dims,
                actual: query_vector.len(),
            }
            .into());
        }

        Ok(self.rank(&normalize(query_vector), k))
    }

    fn rank(&self, query: &[f32], k: usize) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(chunk_id, v)| SearchResult {
                chunk_id,
                score: dot(query, v),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        results.truncate(k);
        results
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scale to unit length. Zero vectors stay zero and score 0 against everything.
fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = dot(&v, &v).sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}
