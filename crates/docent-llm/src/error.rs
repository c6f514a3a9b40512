#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("{provider} request failed with status {status}")]
    Status { provider: String, status: u16 },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: String },

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display() {
        let err = LlmError::Status {
            provider: "openai".into(),
            status: 401,
        };
        assert_eq!(err.to_string(), "openai request failed with status 401");
    }

    #[test]
    fn embed_unsupported_names_provider() {
        let err = LlmError::EmbedUnsupported {
            provider: "ollama".into(),
        };
        assert_eq!(err.to_string(), "embedding not supported by ollama");
    }
}
