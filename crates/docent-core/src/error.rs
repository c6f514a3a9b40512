use docent_llm::LlmError;
use docent_retrieval::{ConfigError, EmbeddingError, RetrievalError};

/// The generation capability could not produce any output for a question.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation provider failed: {0}")]
    Provider(#[from] LlmError),
}

/// Request-level failure of [`crate::Pipeline::process`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("document text is empty")]
    EmptyDocument,

    #[error("no questions supplied")]
    NoQuestions,

    #[error("processing cancelled")]
    Cancelled,
}

impl From<RetrievalError> for PipelineError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::Config(e) => Self::Config(e),
            RetrievalError::Embedding(e) => Self::Embedding(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_errors_keep_their_category() {
        let err = PipelineError::from(RetrievalError::Config(ConfigError::ZeroTopK));
        assert!(matches!(err, PipelineError::Config(ConfigError::ZeroTopK)));

        let err = PipelineError::from(RetrievalError::Embedding(
            EmbeddingError::EmptyQueryVector,
        ));
        assert!(matches!(err, PipelineError::Embedding(_)));
    }

    #[test]
    fn generation_error_display_wraps_provider() {
        let err = GenerationError::from(LlmError::RateLimited);
        assert_eq!(err.to_string(), "generation provider failed: rate limited");
        let err = PipelineError::from(err);
        assert_eq!(
            err.to_string(),
            "generation failed: generation provider failed: rate limited"
        );
    }
}
