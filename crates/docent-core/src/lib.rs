//! Question answering over a single document: configuration, decision engine
//! and the per-request pipeline.

pub mod answer;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;

pub use answer::{Answer, AnswerOutcome, StructuredAnswer};
pub use config::Config;
pub use engine::{DecisionEngine, EngineOptions, ParsedOutput};
pub use error::{GenerationError, PipelineError};
pub use pipeline::Pipeline;
