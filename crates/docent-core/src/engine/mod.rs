//! Decision engine: prompt the generator with assembled context and turn its
//! output into a validated answer.

pub mod parse;
pub mod prompts;

use std::sync::Arc;

use docent_llm::LlmProvider;
use docent_retrieval::AssembledContext;

use crate::answer::{Answer, StructuredAnswer};
use crate::config::{AnswerConfig, ResponseMode};
use crate::error::GenerationError;

pub use parse::ParsedOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub response_mode: ResponseMode,
    pub normalize_decision: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            response_mode: ResponseMode::Structured,
            normalize_decision: true,
        }
    }
}

impl From<&AnswerConfig> for EngineOptions {
    fn from(config: &AnswerConfig) -> Self {
        Self {
            response_mode: config.response_mode,
            normalize_decision: config.normalize_decision,
        }
    }
}

pub struct DecisionEngine<G: LlmProvider> {
    generator: Arc<G>,
    options: EngineOptions,
}

impl<G: LlmProvider> DecisionEngine<G> {
    #[must_use]
    pub fn new(generator: Arc<G>, options: EngineOptions) -> Self {
        Self { generator, options }
    }

    #[must_use]
    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Ask the generator one question over `context`.
    ///
    /// Output that does not match the answer schema never fails: it yields the
    /// fallback answer built from the raw text.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` if the generator cannot be reached.
    pub async fn decide(
        &self,
        context: &AssembledContext,
        query: &str,
    ) -> Result<Answer, GenerationError> {
        let mode = self.options.response_mode;
        let messages = prompts::build_messages(mode, &context.render(), query);

        let raw = self.generator.chat(&messages).await.map_err(|e| {
            tracing::error!(provider = self.generator.name(), "generation failed: {e}");
            GenerationError::from(e)
        })?;

        match parse::parse_output(&raw, mode) {
            ParsedOutput::Valid(answer) => Ok(self.finish(answer, context)),
            ParsedOutput::Invalid { raw, reason } => {
                tracing::warn!(%reason, "model output failed validation, using fallback answer");
                Ok(parse::fallback(raw, mode))
            }
        }
    }

    fn finish(&self, answer: Answer, context: &AssembledContext) -> Answer {
        match answer {
            Answer::Structured(a) => Answer::Structured(self.finish_structured(a, context)),
            plain @ Answer::Plain(_) => plain,
        }
    }

    fn finish_structured(
        &self,
        mut answer: StructuredAnswer,
        context: &AssembledContext,
    ) -> StructuredAnswer {
        if self.options.normalize_decision {
            answer.decision = answer.decision.map(|d| parse::normalize_decision(&d));
        }
        answer.amount = parse::normalize_amount(answer.amount);

        let too_short = answer
            .source_clause
            .as_ref()
            .is_none_or(|c| c.chars().count() < parse::MIN_SOURCE_CLAUSE_CHARS);
        if too_short
            && let Some(best) = context.best_chunk()
            && let Some(sentence) = parse::first_sentence(&best.text)
        {
            tracing::debug!(chunk_id = best.chunk_id, "source clause backfilled from best chunk");
            answer.source_clause = Some(sentence);
        }
        answer
    }
}
