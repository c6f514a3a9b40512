use serde::{Deserialize, Serialize};

/// Value used for every field of a structured answer that could not be parsed.
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredAnswer {
    pub decision: Option<String>,
    pub amount: Option<String>,
    pub justification: String,
    pub source_clause: Option<String>,
}

impl StructuredAnswer {
    /// Answer built when model output fails validation: the raw text becomes
    /// the justification and every other field is `"unknown"`.
    #[must_use]
    pub fn fallback(raw: impl Into<String>) -> Self {
        Self {
            decision: Some(UNKNOWN.into()),
            amount: Some(UNKNOWN.into()),
            justification: raw.into(),
            source_clause: Some(UNKNOWN.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Structured(StructuredAnswer),
    Plain(String),
}

impl Answer {
    /// One-line `"<decision> - <justification>"` rendering.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Structured(a) => match a.decision.as_deref() {
                Some(decision) => format!("{decision} - {}", a.justification),
                None => a.justification.clone(),
            },
            Self::Plain(text) => text.clone(),
        }
    }
}

/// Per-question result handed back to the caller, in question order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerOutcome {
    Answered { answer: Answer },
    Failed { error: String },
}

impl AnswerOutcome {
    #[must_use]
    pub fn answer(&self) -> Option<&Answer> {
        match self {
            Self::Answered { answer } => Some(answer),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
