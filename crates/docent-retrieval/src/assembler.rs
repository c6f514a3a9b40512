//! Context assembly: thresholded search plus neighbour expansion.

use std::collections::BTreeMap;
use std::fmt::Write;

use docent_llm::LlmProvider;

use crate::chunker::Chunk;
use crate::error::{ConfigError, RetrievalError};
use crate::index::EmbeddingIndex;

pub const EMPTY_CONTEXT: &str = "No relevant context found in the document.";
const SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, PartialEq)]
pub struct ContextChunk {
    pub chunk_id: usize,
    pub text: String,
    /// `None` when the chunk was pulled in only as a neighbour.
    pub score: Option<f32>,
}

/// Chunks selected for one query, deduplicated and in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContext {
    chunks: Vec<ContextChunk>,
}

impl AssembledContext {
    /// Build a context from already selected chunks; they are sorted and deduplicated by id.
    #[must_use]
    pub fn new(mut chunks: Vec<ContextChunk>) -> Self {
        chunks.sort_by_key(|c| c.chunk_id);
        chunks.dedup_by_key(|c| c.chunk_id);
        Self { chunks }
    }

    #[must_use]
    pub fn chunks(&self) -> &[ContextChunk] {
        &self.chunks
    }

    #[must_use]
    pub fn chunk_ids(&self) -> Vec<usize> {
        self.chunks.iter().map(|c| c.chunk_id).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The highest-scoring directly retrieved chunk.
    #[must_use]
    pub fn best_chunk(&self) -> Option<&ContextChunk> {
        self.chunks
            .iter()
            .filter(|c| c.score.is_some())
            .max_by(|a, b| {
                a.score
                    .partial_cmp(&b.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    // prefer the lower id on ties
                    .then_with(|| b.chunk_id.cmp(&a.chunk_id))
            })
    }

    #[must_use]
    pub fn render(&self) -> String {
        if self.chunks.is_empty() {
            return EMPTY_CONTEXT.to_owned();
        }

        let mut out = String::new();
        for (n, chunk) in self.chunks.iter().enumerate() {
            if n > 0 {
                out.push_str(SEPARATOR);
            }
            let _ = write!(out, "[Context {} | chunk {} | relevance ", n + 1, chunk.chunk_id);
            match chunk.score {
                Some(score) => {
                    let _ = write!(out, "{score:.3}");
                }
                None => out.push_str("neighbour"),
            }
            out.push_str("]\n");
            out.push_str(&chunk.text);
        }
        out
    }
}

/// Select context for `query`.
///
/// Keeps search hits scoring at least `threshold`. When none qualify the single
/// best hit is kept, so a non-empty index never yields an empty context. Each
/// kept chunk is widened with its immediate neighbours.
///
/// # Errors
///
/// Returns `ConfigError` for `k == 0` or a threshold outside `[-1, 1]`, and
/// `EmbeddingError` if the query cannot be embedded.
pub async fn assemble<E: LlmProvider>(
    index: &EmbeddingIndex,
    embedder: &E,
    chunks: &[Chunk],
    query: &str,
    k: usize,
    threshold: f32,
) -> Result<AssembledContext, RetrievalError> {
    validate_threshold(threshold)?;

    let hits = index.search(embedder, query, k).await?;
    let best = hits.first().copied();

    let mut selected: Vec<_> = hits.into_iter().filter(|h| h.score >= threshold).collect();
    if selected.is_empty()
        && let Some(best) = best
    {
        tracing::warn!(
            best_score = best.score,
            threshold,
            "no chunk met the similarity threshold, keeping best match"
        );
        selected.push(best);
    }

    let mut picked: BTreeMap<usize, Option<f32>> = BTreeMap::new();
    for hit in &selected {
        picked.insert(hit.chunk_id, Some(hit.score));
    }
    for hit in &selected {
        let id = hit.chunk_id;
        if id > 0 {
            picked.entry(id - 1).or_insert(None);
        }
        if id + 1 < chunks.len() {
            picked.entry(id + 1).or_insert(None);
        }
    }

    let context_chunks: Vec<ContextChunk> = picked
        .into_iter()
        .filter_map(|(id, score)| {
            chunks.get(id).map(|c| ContextChunk {
                chunk_id: id,
                text: c.text.clone(),
                score,
            })
        })
        .collect();

    tracing::debug!(
        hits = selected.len(),
        context_chunks = context_chunks.len(),
        "context assembled"
    );

    Ok(AssembledContext {
        chunks: context_chunks,
    })
}

/// # Errors
///
/// Returns `ConfigError::InvalidThreshold` unless `threshold` is finite and in `[-1, 1]`.
pub fn validate_threshold(threshold: f32) -> Result<(), ConfigError> {
    if threshold.is_finite() && (-1.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold(threshold))
    }
}

#[cfg(test)]
mod tests {
    use docent_llm::mock::MockProvider;

    use super::*;
    use crate::chunker::chunk;

    /// Provider where chunk `i` scores exactly `scores[i]` against the query "q".
    fn scored_provider(scores: &[f32]) -> (MockProvider, Vec<Chunk>) {
        let mut provider = MockProvider::default().with_embedding("q", vec![1.0, 0.0]);
        let mut chunks = Vec::new();
        for (id, s) in scores.iter().enumerate() {
            let text = format!("chunk-{id}");
            provider = provider.with_embedding(text.clone(), vec![*s, (1.0 - s * s).sqrt()]);
            chunks.push(Chunk {
                id,
                start_offset: id * 10,
                end_offset: id * 10 + text.len(),
                text,
            });
        }
        (provider, chunks)
    }

    async fn assemble_scores(scores: &[f32], k: usize, threshold: f32) -> AssembledContext {
        let (provider, chunks) = scored_provider(scores);
        let index = EmbeddingIndex::build(&provider, &chunks).await.unwrap();
        assemble(&index, &provider, &chunks, "q", k, threshold)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn threshold_then_neighbour_expansion() {
        let ctx = assemble_scores(&[0.9, 0.3, 0.1], 3, 0.5).await;
        assert_eq!(ctx.chunk_ids(), vec![0, 1]);
        assert!(ctx.chunks()[0].score.is_some());
        assert_eq!(ctx.chunks()[1].score, None);
    }

    #[tokio::test]
    async fn falls_back_to_best_hit_below_threshold() {
        let ctx = assemble_scores(&[0.2, 0.4, 0.1, 0.05], 3, 0.9).await;
        assert_eq!(ctx.chunk_ids(), vec![0, 1, 2]);
        let best = ctx.best_chunk().unwrap();
        assert_eq!(best.chunk_id, 1);
    }

    #[tokio::test]
    async fn overlapping_neighbours_are_deduplicated_in_order() {
        let ctx = assemble_scores(&[0.1, 0.8, 0.2, 0.85, 0.1, 0.0], 2, 0.5).await;
        assert_eq!(ctx.chunk_ids(), vec![0, 1, 2, 3, 4]);
        let direct: Vec<usize> = ctx
            .chunks()
            .iter()
            .filter(|c| c.score.is_some())
            .map(|c| c.chunk_id)
            .collect();
        assert_eq!(direct, vec![1, 3]);
        assert_eq!(ctx.best_chunk().unwrap().chunk_id, 3);
    }

    #[tokio::test]
    async fn direct_hit_keeps_score_when_also_a_neighbour() {
        let ctx = assemble_scores(&[0.9, 0.8, 0.0], 2, 0.5).await;
        assert_eq!(ctx.chunk_ids(), vec![0, 1, 2]);
        assert!(ctx.chunks()[0].score.is_some());
        assert!(ctx.chunks()[1].score.is_some());
        assert_eq!(ctx.chunks()[2].score, None);
    }

    #[tokio::test]
    async fn empty_index_gives_empty_context() {
        let provider = MockProvider::default();
        let index = EmbeddingIndex::build(&provider, &[]).await.unwrap();
        let ctx = assemble(&index, &provider, &[], "q", 3, 0.7).await.unwrap();
        assert!(ctx.is_empty());
        assert_eq!(ctx.render(), EMPTY_CONTEXT);
        assert!(ctx.best_chunk().is_none());
    }

    #[tokio::test]
    async fn non_empty_index_never_yields_empty_context() {
        let provider = MockProvider::default();
        let chunks = chunk(&"lorem ipsum dolor sit amet ".repeat(20), 50, 10).unwrap();
        let index = EmbeddingIndex::build(&provider, &chunks).await.unwrap();
        let ctx = assemble(&index, &provider, &chunks, "zzz unrelated", 3, 1.0)
            .await
            .unwrap();
        assert!(!ctx.is_empty());
    }

    #[tokio::test]
    async fn invalid_threshold_is_rejected_before_embedding() {
        let (provider, chunks) = scored_provider(&[0.5]);
        let index = EmbeddingIndex::build(&provider, &chunks).await.unwrap();
        let calls = provider.embed_calls();
        for bad in [f32::NAN, f32::INFINITY, 1.5, -1.01] {
            let err = assemble(&index, &provider, &chunks, "q", 3, bad)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                RetrievalError::Config(ConfigError::InvalidThreshold(_))
            ));
        }
        assert_eq!(provider.embed_calls(), calls);
    }

    #[test]
    fn render_marks_scores_and_neighbours() {
        let ctx = AssembledContext {
            chunks: vec![
                ContextChunk {
                    chunk_id: 0,
                    text: "Grace period is thirty days.".into(),
                    score: Some(0.9),
                },
                ContextChunk {
                    chunk_id: 1,
                    text: "Premiums are payable yearly.".into(),
                    score: None,
                },
            ],
        };
        insta::assert_snapshot!(ctx.render(), @r"
        [Context 1 | chunk 0 | relevance 0.900]
        Grace period is thirty days.

        ---

        [Context 2 | chunk 1 | relevance neighbour]
        Premiums are payable yearly.
        ");
    }
}
