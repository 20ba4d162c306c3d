//! Core traits and types for RAGbot
//!
//! This crate defines the capability-facing interfaces used across the
//! workspace: document loaders, embedders, vector stores, retrievers and
//! language model clients. Every heavy collaborator sits behind one of these
//! traits so tests can substitute deterministic fakes.

pub mod document;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod rag;
pub mod vector_store;


pub use document::{Document, DocumentLoader, IndexingConfig};
pub use embedding::Embedder;
pub use error::{Error, Result};
pub use llm::{ChatMessage, Completion, CompletionConfig, LanguageModelClient, Role};
pub use rag::{QueryResult, Retriever};
pub use vector_store::{SearchConfig, SearchResult, VectorDocument, VectorStore};
