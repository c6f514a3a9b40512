//! Test-only mock provider with scripted chat replies and deterministic embeddings.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::provider::{LlmProvider, Message};

pub const DEFAULT_DIMS: usize = 64;

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<String>>>,
    /// `(needle, reply)` pairs matched against the last message, checked before the queue.
    rules: Vec<(String, String)>,
    pub default_response: String,
    /// Exact-text embedding overrides; other text gets a hashed bag-of-words vector.
    embeddings: HashMap<String, Vec<f32>>,
    pub dims: usize,
    pub supports_embeddings: bool,
    pub fail_chat: bool,
    /// Fail chat only when the last message contains this text.
    pub fail_chat_containing: Option<String>,
    pub fail_embed: bool,
    /// Milliseconds to sleep before returning a chat response.
    pub delay_ms: u64,
    chat_calls: Arc<AtomicUsize>,
    embed_calls: Arc<AtomicUsize>,
    transcripts: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            rules: Vec::new(),
            default_response: "mock response".into(),
            embeddings: HashMap::new(),
            dims: DEFAULT_DIMS,
            supports_embeddings: true,
            fail_chat: false,
            fail_chat_containing: None,
            fail_embed: false,
            delay_ms: 0,
            chat_calls: Arc::new(AtomicUsize::new(0)),
            embed_calls: Arc::new(AtomicUsize::new(0)),
            transcripts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    /// Reply with `response` whenever the last message contains `needle`.
    #[must_use]
    pub fn respond_when(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.push((needle.into(), response.into()));
        self
    }

    #[must_use]
    pub fn with_embedding(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.embeddings.insert(text.into(), vector);
        self
    }

    #[must_use]
    pub fn with_dims(mut self, dims: usize) -> Self {
        self.dims = dims;
        self
    }

    #[must_use]
    pub fn fail_chat_containing(mut self, needle: impl Into<String>) -> Self {
        self.fail_chat_containing = Some(needle.into());
        self
    }

    /// Make every `embed` call fail.
    #[must_use]
    pub fn fail_embed(mut self) -> Self {
        self.fail_embed = true;
        self
    }

    /// Report no embedding support; `embed` returns `EmbedUnsupported`.
    #[must_use]
    pub fn without_embeddings(mut self) -> Self {
        self.supports_embeddings = false;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    #[must_use]
    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Every message list passed to `chat`, in call order.
    #[must_use]
    pub fn transcripts(&self) -> Vec<Vec<Message>> {
        self.transcripts.lock().unwrap().clone()
    }

    fn hashed_embedding(&self, text: &str) -> Vec<f32> {
        let dims = self.dims.max(1);
        let mut v = vec![0.0f32; dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let lower = word.to_lowercase();
            let bucket = usize::try_from(fnv1a(lower.as_bytes()) % dims as u64).unwrap_or(0);
            v[bucket] += 1.0;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[dims - 1] = 1.0;
        }
        v
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, crate::LlmError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.transcripts.lock().unwrap().push(messages.to_vec());
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail_chat {
            return Err(crate::LlmError::Other("mock LLM error".into()));
        }
        let last = messages.last().map_or("", |m| m.content.as_str());
        if let Some(needle) = &self.fail_chat_containing
            && last.contains(needle.as_str())
        {
            return Err(crate::LlmError::Other("mock LLM error".into()));
        }
        if let Some((_, reply)) = self.rules.iter().find(|(n, _)| last.contains(n.as_str())) {
            return Ok(reply.clone());
        }
        let mut responses = self.responses.lock().unwrap();
        Ok(responses
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone()))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, crate::LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if !self.supports_embeddings {
            return Err(crate::LlmError::EmbedUnsupported {
                provider: "mock".into(),
            });
        }
        if self.fail_embed {
            return Err(crate::LlmError::Other("mock embedding error".into()));
        }
        Ok(self
            .embeddings
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.hashed_embedding(text)))
    }

    fn supports_embeddings(&self) -> bool {
        self.supports_embeddings
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
