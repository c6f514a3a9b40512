//! Retrieval layer: character chunking, flat cosine index and context assembly.

pub mod assembler;
pub mod chunker;
pub mod error;
pub mod index;

pub use assembler::{AssembledContext, ContextChunk, EMPTY_CONTEXT, assemble};
pub use chunker::{Chunk, ChunkerConfig, TextChunker, chunk};
pub use error::{ConfigError, EmbeddingError, RetrievalError};
pub use index::{EmbeddingIndex, IndexStats, SearchResult};
