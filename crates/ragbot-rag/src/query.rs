//! Query engine turning user questions into retrieved context

use async_trait::async_trait;
use tracing::debug;

use ragbot_core::{
    Embedder, Error, QueryResult, Result, Retriever, SearchConfig, VectorDocument, VectorStore,
};

use crate::index::VectorIndex;

/// Context returned when no chunk matches the query
pub const EMPTY_RESPONSE: &str = "Empty Response";

/// Retriever bound to a vector index
pub struct QueryEngine<'a, S: VectorStore + ?Sized, E: Embedder + ?Sized> {
    index: &'a VectorIndex<S, E>,
    config: SearchConfig,
}

impl<'a, S: VectorStore + ?Sized, E: Embedder + ?Sized> QueryEngine<'a, S, E> {
    pub fn new(index: &'a VectorIndex<S, E>, config: SearchConfig) -> Self {
        Self { index, config }
    }
}

/// Join retrieved chunk texts into one context block
pub fn build_context(sources: &[VectorDocument]) -> String {
    if sources.is_empty() {
        return EMPTY_RESPONSE.to_string();
    }

    sources
        .iter()
        .map(|doc| doc.content.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl<S: VectorStore + ?Sized, E: Embedder + ?Sized> Retriever for QueryEngine<'_, S, E> {
    async fn query(&self, text: &str) -> Result<QueryResult> {
        let result = self
            .index
            .retrieve(text, &self.config)
            .await
            .map_err(Error::into_retrieval)?;

        debug!(
            matches = result.total,
            top_k = self.config.top_k,
            "retrieved context"
        );

        Ok(QueryResult {
            context: build_context(&result.documents),
            sources: result.documents,
        })
    }
}
