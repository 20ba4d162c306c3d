//! Retrieval engine for RAGbot
//!
//! This crate provides the directory loader, text chunking, embedding
//! providers, the persistent vector store, the vector index with its query
//! engine and the prompt composer.

mod chunker;
mod embedder;
mod index;
mod loader;
mod prompt;
mod query;
mod vector_store;


pub use chunker::TextChunker;
pub use embedder::{
    EMBEDDING_TIMEOUT, EmbeddingConfig, EmbeddingProviderKind, HashEmbedder, OllamaEmbedder,
    OpenAiEmbedder, build_embedder,
};
pub use index::{IndexOrigin, VectorIndex};
pub use loader::DirectoryLoader;
pub use prompt::{GUIDELINES, RESPONSE_FORMAT, TASK_STATEMENT, compose_prompt};
pub use query::{EMPTY_RESPONSE, QueryEngine, build_context};
pub use vector_store::PersistentVectorStore;

// Re-export core types for convenience
pub use ragbot_core::{
    Document, DocumentLoader, Embedder, Error, IndexingConfig, QueryResult, Result, Retriever,
    SearchConfig, SearchResult, VectorDocument, VectorStore,
};
