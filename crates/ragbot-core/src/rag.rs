//! Retriever trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Result, VectorDocument};

/// Context retrieved for one user query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub context: String,
    pub sources: Vec<VectorDocument>,
}

impl std::fmt::Display for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.context)
    }
}

/// Trait for query engines that turn a user query into context
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve context for a query
    async fn query(&self, text: &str) -> Result<QueryResult>;
}
