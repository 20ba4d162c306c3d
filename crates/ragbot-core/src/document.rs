//! Document loader trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A source document read from disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source: String,
    pub metadata: serde_json::Value,
}

/// Configuration for turning documents into indexed chunks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            batch_size: 10,
        }
    }
}

/// Trait for document sources
///
/// A loader produces every document it can find in one call. It reads and
/// never writes.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load all documents
    async fn load(&self) -> Result<Vec<Document>>;
}
