//! Request entry point: chunk, index, then answer each question.

use std::sync::Arc;

use docent_llm::{LlmError, LlmProvider};
use docent_retrieval::{Chunk, EmbeddingError, EmbeddingIndex, TextChunker, assemble};
use futures::{StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::answer::AnswerOutcome;
use crate::config::{Config, GenerationErrorPolicy};
use crate::engine::{DecisionEngine, EngineOptions};
use crate::error::PipelineError;

const LOG_QUESTION_CHARS: usize = 100;

/// Owns the injected capabilities and validated settings; each `process` call
/// builds its own chunks and index and drops them on return.
pub struct Pipeline<E: LlmProvider, G: LlmProvider> {
    embedder: Arc<E>,
    engine: DecisionEngine<G>,
    chunker: TextChunker,
    top_k: usize,
    similarity_threshold: f32,
    concurrency: usize,
    on_generation_error: GenerationErrorPolicy,
}

impl<E: LlmProvider, G: LlmProvider> Pipeline<E, G> {
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if `config` fails validation, or
    /// `PipelineError::Embedding` if `embedder` cannot embed text.
    pub fn new(embedder: Arc<E>, generator: Arc<G>, config: &Config) -> Result<Self, PipelineError> {
        config.validate()?;
        if !embedder.supports_embeddings() {
            return Err(EmbeddingError::from(LlmError::EmbedUnsupported {
                provider: embedder.name().to_owned(),
            })
            .into());
        }
        Ok(Self {
            embedder,
            engine: DecisionEngine::new(generator, EngineOptions::from(&config.answer)),
            chunker: TextChunker::new(config.chunker())?,
            top_k: config.retrieval.top_k,
            similarity_threshold: config.retrieval.similarity_threshold,
            concurrency: config.answer.concurrency,
            on_generation_error: config.answer.on_generation_error,
        })
    }

    /// Answer every question against `document`, returning one outcome per
    /// question in input order.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` for an empty document or question list, an
    /// embedding failure, or a generation failure under the `abort` policy.
    pub async fn process(
        &self,
        document: &str,
        questions: &[String],
    ) -> Result<Vec<AnswerOutcome>, PipelineError> {
        self.process_with_cancel(document, questions, &CancellationToken::new())
            .await
    }

    /// Like [`Pipeline::process`], but stops as soon as `cancel` fires.
    /// In-flight provider calls are dropped and partial answers discarded.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Cancelled` on cancellation, otherwise as
    /// [`Pipeline::process`].
    pub async fn process_with_cancel(
        &self,
        document: &str,
        questions: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<AnswerOutcome>, PipelineError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("processing cancelled");
                Err(PipelineError::Cancelled)
            }
            result = self.run(document, questions) => result,
        }
    }

    async fn run(
        &self,
        document: &str,
        questions: &[String],
    ) -> Result<Vec<AnswerOutcome>, PipelineError> {
        if document.trim().is_empty() {
            return Err(PipelineError::EmptyDocument);
        }
        if questions.is_empty() {
            return Err(PipelineError::NoQuestions);
        }

        let chunks = self.chunker.split(document);
        let index = EmbeddingIndex::build(self.embedder.as_ref(), &chunks).await?;
        let stats = index.stats();
        tracing::info!(
            chunks = stats.chunk_count,
            dims = stats.dims,
            avg_chunk_chars = stats.average_chunk_chars,
            questions = questions.len(),
            "document indexed"
        );

        let outcomes: Vec<AnswerOutcome> = futures::stream::iter(questions.iter().enumerate())
            .map(|(idx, question)| {
                self.answer_one(&index, &chunks, question)
                    .instrument(tracing::info_span!("question", idx))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        tracing::info!(answered = outcomes.len() - failed, failed, "questions processed");
        Ok(outcomes)
    }

    async fn answer_one(
        &self,
        index: &EmbeddingIndex,
        chunks: &[Chunk],
        question: &str,
    ) -> Result<AnswerOutcome, PipelineError> {
        tracing::debug!(question = %truncate(question, LOG_QUESTION_CHARS), "answering");

        let context = assemble(
            index,
            self.embedder.as_ref(),
            chunks,
            question,
            self.top_k,
            self.similarity_threshold,
        )
        .await?;
        tracing::debug!(context_chunks = ?context.chunk_ids(), "context selected");

        match self.engine.decide(&context, question).await {
            Ok(answer) => Ok(AnswerOutcome::Answered { answer }),
            Err(e) => match self.on_generation_error {
                GenerationErrorPolicy::Flag => {
                    tracing::warn!("question flagged as failed: {e}");
                    Ok(AnswerOutcome::Failed {
                        error: e.to_string(),
                    })
                }
                GenerationErrorPolicy::Abort => Err(PipelineError::Generation(e)),
            },
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use docent_llm::mock::MockProvider;

    use super::*;
    use crate::answer::Answer;

    fn config() -> Config {
        let mut config = Config::default();
        config.retrieval.chunk_size = 60;
        config.retrieval.chunk_overlap = 10;
        config.retrieval.similarity_threshold = 0.3;
        config
    }

    const DOCUMENT: &str = "The grace period for premium payment is thirty days. \
        Pre-existing diseases have a waiting period of thirty-six months. \
        Cataract surgery has a waiting period of two years. \
        Room rent is capped at one percent of the sum insured.";

    fn questions(qs: &[&str]) -> Vec<String> {
        qs.iter().map(|q| (*q).to_owned()).collect()
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 100), "short");
    }

    #[test]
    fn new_rejects_invalid_config() {
        let mut config = Config::default();
        config.retrieval.chunk_overlap = config.retrieval.chunk_size;
        let provider = Arc::new(MockProvider::default());
        let result = Pipeline::new(Arc::clone(&provider), provider, &config);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn new_rejects_embedder_without_embeddings() {
        let embedder = Arc::new(MockProvider::default().without_embeddings());
        let generator = Arc::new(MockProvider::default());
        let result = Pipeline::new(Arc::clone(&embedder), generator, &config());
        assert!(matches!(
            result,
            Err(PipelineError::Embedding(EmbeddingError::Provider(
                LlmError::EmbedUnsupported { .. }
            )))
        ));
        assert_eq!(embedder.embed_calls(), 0);
    }

    #[tokio::test]
    async fn empty_inputs_are_rejected() {
        let provider = Arc::new(MockProvider::default());
        let pipeline = Pipeline::new(Arc::clone(&provider), Arc::clone(&provider), &config()).unwrap();

        let err = pipeline.process("  \n ", &questions(&["q"])).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDocument));

        let err = pipeline.process(DOCUMENT, &[]).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoQuestions));
        assert_eq!(provider.embed_calls(), 0);
    }

    #[tokio::test]
    async fn one_outcome_per_question_in_order() {
        let provider = Arc::new(
            MockProvider::default()
                .respond_when("QUESTION: What is the grace", r#"{"answer": "thirty days"}"#)
                .respond_when("QUESTION: Cataract", r#"{"answer": "two years"}"#),
        );
        let mut config = config();
        config.answer.response_mode = crate::config::ResponseMode::PlainText;
        config.answer.concurrency = 2;
        let pipeline = Pipeline::new(Arc::clone(&provider), Arc::clone(&provider), &config).unwrap();

        let outcomes = pipeline
            .process(
                DOCUMENT,
                &questions(&["What is the grace period?", "Cataract waiting period?"]),
            )
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].answer(), Some(&Answer::Plain("thirty days".into())));
        assert_eq!(outcomes[1].answer(), Some(&Answer::Plain("two years".into())));
        assert_eq!(provider.chat_calls(), 2);
    }

    #[tokio::test]
    async fn generation_failure_is_flagged_by_default() {
        let provider = Arc::new(MockProvider::default().fail_chat_containing("QUESTION: cataract"));
        let pipeline = Pipeline::new(Arc::clone(&provider), Arc::clone(&provider), &config()).unwrap();

        let outcomes = pipeline
            .process(DOCUMENT, &questions(&["grace period?", "cataract?", "room rent?"]))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[0].is_failed());
        assert!(outcomes[1].is_failed());
        assert!(!outcomes[2].is_failed());
    }

    #[tokio::test]
    async fn generation_failure_aborts_under_abort_policy() {
        let provider = Arc::new(MockProvider::failing());
        let mut config = config();
        config.answer.on_generation_error = GenerationErrorPolicy::Abort;
        let pipeline = Pipeline::new(Arc::clone(&provider), Arc::clone(&provider), &config).unwrap();

        let err = pipeline
            .process(DOCUMENT, &questions(&["grace period?"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));
    }

    #[tokio::test]
    async fn embedding_failure_is_fatal() {
        let provider = Arc::new(MockProvider::default().fail_embed());
        let pipeline = Pipeline::new(Arc::clone(&provider), Arc::clone(&provider), &config()).unwrap();
        let err = pipeline
            .process(DOCUMENT, &questions(&["q"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Embedding(_)));
        assert_eq!(provider.chat_calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_token_returns_cancelled() {
        let provider = Arc::new(MockProvider::default().with_delay(5_000));
        let pipeline = Pipeline::new(Arc::clone(&provider), Arc::clone(&provider), &config()).unwrap();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = pipeline
            .process_with_cancel(DOCUMENT, &questions(&["q"]), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }
}
