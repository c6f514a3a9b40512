use super::{Config, Secret};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_retrieval();
        self.apply_env_overrides_answer();
        self.apply_env_overrides_llm();
        self.apply_env_secrets();
    }

    fn apply_env_overrides_retrieval(&mut self) {
        if let Ok(v) = std::env::var("DOCENT_CHUNK_SIZE") {
            if let Ok(size) = v.parse::<usize>() {
                self.retrieval.chunk_size = size;
            } else {
                tracing::warn!("ignoring invalid DOCENT_CHUNK_SIZE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_CHUNK_OVERLAP") {
            if let Ok(overlap) = v.parse::<usize>() {
                self.retrieval.chunk_overlap = overlap;
            } else {
                tracing::warn!("ignoring invalid DOCENT_CHUNK_OVERLAP value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_TOP_K") {
            if let Ok(k) = v.parse::<usize>() {
                self.retrieval.top_k = k;
            } else {
                tracing::warn!("ignoring invalid DOCENT_TOP_K value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_SIMILARITY_THRESHOLD") {
            if let Ok(threshold) = v.parse::<f32>() {
                self.retrieval.similarity_threshold = threshold;
            } else {
                tracing::warn!("ignoring invalid DOCENT_SIMILARITY_THRESHOLD value: {v}");
            }
        }
    }

    fn apply_env_overrides_answer(&mut self) {
        if let Ok(v) = std::env::var("DOCENT_RESPONSE_MODE") {
            if let Ok(mode) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.answer.response_mode = mode;
            } else {
                tracing::warn!("ignoring invalid DOCENT_RESPONSE_MODE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_ON_GENERATION_ERROR") {
            if let Ok(policy) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.answer.on_generation_error = policy;
            } else {
                tracing::warn!("ignoring invalid DOCENT_ON_GENERATION_ERROR value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_CONCURRENCY") {
            if let Ok(n) = v.parse::<usize>() {
                self.answer.concurrency = n;
            } else {
                tracing::warn!("ignoring invalid DOCENT_CONCURRENCY value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_NORMALIZE_DECISION") {
            if let Ok(enabled) = v.parse::<bool>() {
                self.answer.normalize_decision = enabled;
            } else {
                tracing::warn!("ignoring invalid DOCENT_NORMALIZE_DECISION value: {v}");
            }
        }
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("DOCENT_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid DOCENT_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_MAX_TOKENS") {
            if let Ok(tokens) = v.parse::<u32>() {
                self.llm.max_tokens = tokens;
            } else {
                tracing::warn!("ignoring invalid DOCENT_LLM_MAX_TOKENS value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_TEMPERATURE") {
            if let Ok(t) = v.parse::<f32>() {
                self.llm.temperature = t;
            } else {
                tracing::warn!("ignoring invalid DOCENT_LLM_TEMPERATURE value: {v}");
            }
        }
    }

    fn apply_env_secrets(&mut self) {
        let key = std::env::var("DOCENT_OPENAI_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty());
        if let Some(key) = key {
            self.secrets.openai_api_key = Some(Secret::new(key));
        }
    }
}
