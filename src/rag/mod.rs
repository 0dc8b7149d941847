//! Codebase ingestion into a vector store and retrieval-augmented question answering.

pub mod assistant;
pub mod splitter;
pub mod store;

pub use assistant::{CodebaseAssistant, RagError};
pub use store::{JsonVectorStore, VectorStore};
