//! Error types for docent-retrieval.

use docent_llm::LlmError;

/// Invalid chunking, search or pipeline parameters. Raised before any I/O.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },

    #[error("top_k must be greater than zero")]
    ZeroTopK,

    #[error("similarity_threshold must be a finite value in [-1, 1], got {0}")]
    InvalidThreshold(f32),

    #[error("concurrency must be greater than zero")]
    ZeroConcurrency,
}

/// Errors produced while turning text into vectors.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// The embedding capability itself failed.
    #[error("embedding provider failed: {0}")]
    Provider(#[from] LlmError),

    /// A chunk embedded to a zero-length vector.
    #[error("embedding for chunk {chunk_id} is empty")]
    EmptyVector { chunk_id: usize },

    /// The query embedded to a zero-length vector.
    #[error("query embedding is empty")]
    EmptyQueryVector,

    /// A vector's length differs from the index dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors returned by search and context assembly.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_message_names_both_values() {
        let err = ConfigError::OverlapTooLarge {
            size: 100,
            overlap: 100,
        };
        assert_eq!(
            err.to_string(),
            "chunk_overlap (100) must be smaller than chunk_size (100)"
        );
    }

    #[test]
    fn retrieval_error_is_transparent() {
        let err = RetrievalError::from(ConfigError::ZeroTopK);
        assert_eq!(err.to_string(), "top_k must be greater than zero");

        let err = RetrievalError::from(EmbeddingError::DimensionMismatch {
            expected: 3,
            actual: 2,
        });
        assert!(err.to_string().contains("expected 3, got 2"));
    }
}
