//! Vector index built once per storage location

use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info};

use ragbot_core::{
    Document, DocumentLoader, Embedder, Error, IndexingConfig, Result, SearchConfig,
    SearchResult, VectorDocument, VectorStore,
};

use crate::chunker::TextChunker;
use crate::query::QueryEngine;

/// How the index came to exist at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    /// Persisted records were found and reused
    Loaded,
    /// Documents were loaded, embedded and persisted in this run
    Built,
}

/// A searchable index over document chunks
pub struct VectorIndex<S: VectorStore + ?Sized, E: Embedder + ?Sized> {
    store: Arc<S>,
    embedder: Arc<E>,
    origin: IndexOrigin,
    size: usize,
}

impl<S: VectorStore + ?Sized, E: Embedder + ?Sized> VectorIndex<S, E> {
    /// Load the index if the store already holds records, otherwise build it
    ///
    /// The loader and the embedder are not touched when persisted records
    /// exist.
    pub async fn initialize<L: DocumentLoader + ?Sized>(
        store: Arc<S>,
        embedder: Arc<E>,
        loader: &L,
        config: &IndexingConfig,
    ) -> Result<Self> {
        let existing = store.count().await.map_err(Error::into_index_build)?;
        if existing > 0 {
            info!(chunks = existing, "loaded existing index");
            return Ok(Self {
                store,
                embedder,
                origin: IndexOrigin::Loaded,
                size: existing,
            });
        }

        info!("no persisted index found, building from documents");
        let documents = loader.load().await.map_err(Error::into_index_build)?;
        Self::from_documents(store, embedder, &documents, config).await
    }

    /// Build the index from an explicit document list
    pub async fn from_documents(
        store: Arc<S>,
        embedder: Arc<E>,
        documents: &[Document],
        config: &IndexingConfig,
    ) -> Result<Self> {
        let chunker = TextChunker::from_config(config);
        let mut chunks: Vec<VectorDocument> = Vec::new();

        for document in documents {
            let pieces = chunker.split(&document.content);
            let total = pieces.len();
            debug!(document = %document.source, chunks = total, "chunked document");

            for (index, content) in pieces.into_iter().enumerate() {
                chunks.push(VectorDocument {
                    id: chunk_id(&document.id, index),
                    content,
                    embedding: None,
                    metadata: chunk_metadata(document, index, total),
                    score: None,
                });
            }
        }

        if chunks.is_empty() {
            return Err(Error::IndexBuild(
                "Documents produced no text to index".to_string(),
            ));
        }

        let batch_size = config.batch_size.max(1);
        for batch in chunks.chunks_mut(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = embedder
                .embed_batch(&texts)
                .await
                .map_err(Error::into_index_build)?;

            if embeddings.len() != batch.len() {
                return Err(Error::IndexBuild(format!(
                    "Embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }

            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.embedding = Some(embedding);
            }
            debug!(batch = batch.len(), "embedded batch");
        }

        let chunk_count = chunks.len();
        store
            .store_batch(chunks)
            .await
            .map_err(Error::into_index_build)?;
        let size = store.count().await.map_err(Error::into_index_build)?;

        info!(
            documents = documents.len(),
            chunks = chunk_count,
            size,
            "built index"
        );

        Ok(Self {
            store,
            embedder,
            origin: IndexOrigin::Built,
            size,
        })
    }

    pub fn origin(&self) -> IndexOrigin {
        self.origin
    }

    /// Number of chunks in the index
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Embed a query and return the closest chunks
    pub async fn retrieve(&self, query: &str, config: &SearchConfig) -> Result<SearchResult> {
        let vector = self.embedder.embed(query).await?;
        self.store.search_by_vector(&vector, config).await
    }

    pub fn as_query_engine(&self, config: SearchConfig) -> QueryEngine<'_, S, E> {
        QueryEngine::new(self, config)
    }
}

fn chunk_id(document_id: &str, index: usize) -> String {
    format!("{:x}", md5::compute(format!("{}:{}", document_id, index)))
}

fn chunk_metadata(document: &Document, index: usize, total: usize) -> Value {
    let mut metadata = match &document.metadata {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    metadata.insert("document_id".to_string(), json!(document.id));
    metadata.insert("title".to_string(), json!(document.title));
    metadata.insert("chunk_index".to_string(), json!(index));
    metadata.insert("total_chunks".to_string(), json!(total));
    Value::Object(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashEmbedder;
    use crate::vector_store::PersistentVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        inner: HashEmbedder,
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                inner: HashEmbedder::new(256),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(texts.len(), Ordering::SeqCst);
            self.inner.embed_batch(texts).await
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn model_name(&self) -> &str {
            self.inner.model_name()
        }
    }

    struct FixedLoader {
        documents: Vec<Document>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DocumentLoader for FixedLoader {
        async fn load(&self) -> Result<Vec<Document>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.documents.clone())
        }
    }

    struct FailingLoader;

    #[async_trait]
    impl DocumentLoader for FailingLoader {
        async fn load(&self) -> Result<Vec<Document>> {
            Err(Error::DocumentLoader("No files found in ./documents.".to_string()))
        }
    }

    fn document(id: &str, content: &str) -> Document {
        Document {
            id: id.to_string(),
            title: format!("{}.txt", id),
            content: content.to_string(),
            source: format!("documents/{}.txt", id),
            metadata: json!({"file_name": format!("{}.txt", id)}),
        }
    }

    fn loader() -> FixedLoader {
        FixedLoader {
            documents: vec![
                document("france", "Paris is the capital of France. It lies on the Seine."),
                document("plants", "Photosynthesis converts light into chemical energy."),
                document("rust", "Rust guarantees memory safety without a garbage collector."),
            ],
            calls: AtomicUsize::new(0),
        }
    }

    fn open_store(dir: &std::path::Path) -> Arc<PersistentVectorStore> {
        Arc::new(PersistentVectorStore::open(dir, "test", "hash-embedding-256", 256).unwrap())
    }

    #[tokio::test]
    async fn test_build_then_load_without_embedding() {
        let tmp = tempfile::tempdir().unwrap();
        let config = IndexingConfig::default();

        {
            let embedder = Arc::new(CountingEmbedder::new());
            let loader = loader();
            let index = VectorIndex::initialize(open_store(tmp.path()), embedder.clone(), &loader, &config)
                .await
                .unwrap();
            assert_eq!(index.origin(), IndexOrigin::Built);
            assert_eq!(index.len(), 3);
            assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        }

        let embedder = Arc::new(CountingEmbedder::new());
        let loader = loader();
        let index = VectorIndex::initialize(open_store(tmp.path()), embedder.clone(), &loader, &config)
            .await
            .unwrap();

        assert_eq!(index.origin(), IndexOrigin::Loaded);
        assert_eq!(index.len(), 3);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_building_twice_keeps_size() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path());
        let embedder = Arc::new(HashEmbedder::new(256));
        let documents = loader().documents;
        let config = IndexingConfig::default();

        let first = VectorIndex::from_documents(store.clone(), embedder.clone(), &documents, &config)
            .await
            .unwrap();
        let second = VectorIndex::from_documents(store, embedder, &documents, &config)
            .await
            .unwrap();

        assert_eq!(first.len(), second.len());
    }

    #[tokio::test]
    async fn test_batches_respect_batch_size() {
        let tmp = tempfile::tempdir().unwrap();
        let embedder = Arc::new(CountingEmbedder::new());
        let long = (0..30)
            .map(|i| format!("Sentence {} about something else entirely.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let documents = vec![document("long", &long)];
        let config = IndexingConfig {
            chunk_size: 100,
            chunk_overlap: 0,
            batch_size: 4,
        };

        let index = VectorIndex::from_documents(open_store(tmp.path()), embedder.clone(), &documents, &config)
            .await
            .unwrap();

        assert!(index.len() > 4);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), index.len());
    }

    #[tokio::test]
    async fn test_chunk_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path());
        let documents = vec![document("france", "Paris is the capital of France.")];

        VectorIndex::from_documents(
            store.clone(),
            Arc::new(HashEmbedder::new(256)),
            &documents,
            &IndexingConfig::default(),
        )
        .await
        .unwrap();

        let chunk = store.get(&chunk_id("france", 0)).await.unwrap().unwrap();
        assert_eq!(chunk.metadata["document_id"], "france");
        assert_eq!(chunk.metadata["title"], "france.txt");
        assert_eq!(chunk.metadata["file_name"], "france.txt");
        assert_eq!(chunk.metadata["chunk_index"], 0);
        assert_eq!(chunk.metadata["total_chunks"], 1);
    }

    #[tokio::test]
    async fn test_loader_failure_is_index_build_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = VectorIndex::initialize(
            open_store(tmp.path()),
            Arc::new(HashEmbedder::new(256)),
            &FailingLoader,
            &IndexingConfig::default(),
        )
        .await
        .err()
        .unwrap();

        assert!(matches!(err, Error::IndexBuild(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_retrieve_finds_related_chunk() {
        let tmp = tempfile::tempdir().unwrap();
        let index = VectorIndex::from_documents(
            open_store(tmp.path()),
            Arc::new(HashEmbedder::new(256)),
            &loader().documents,
            &IndexingConfig::default(),
        )
        .await
        .unwrap();

        let result = index
            .retrieve("What is the capital of France?", &SearchConfig { top_k: 1, score_threshold: None })
            .await
            .unwrap();

        assert_eq!(result.total, 1);
        assert!(result.documents[0].content.contains("Paris"));
    }
}
