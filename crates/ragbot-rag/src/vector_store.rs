//! File-backed vector store

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use ragbot_core::{Error, Result, SearchConfig, SearchResult, VectorDocument, VectorStore};

#[derive(Debug, Serialize, Deserialize)]
struct CollectionFile {
    collection: String,
    embedding_model: String,
    dimensions: usize,
    documents: Vec<VectorDocument>,
}

/// Persistent vector store keeping one collection per JSON file
///
/// The collection file lives at `<dir>/<collection>.json`. An exclusive lock
/// on `<dir>/<collection>.lock` is held for as long as the store is alive, so
/// a second process cannot open the same collection.
pub struct PersistentVectorStore {
    data_file: PathBuf,
    collection: String,
    embedding_model: String,
    dimensions: usize,
    documents: RwLock<HashMap<String, VectorDocument>>,
    _lock: File,
}

impl PersistentVectorStore {
    /// Open a collection, loading whatever it already holds
    ///
    /// Fails with a configuration error when the persisted vectors were made
    /// by a different embedding model.
    pub fn open(
        dir: impl AsRef<Path>,
        collection: &str,
        embedding_model: &str,
        dimensions: usize,
    ) -> Result<Self> {
        Self::open_inner(dir.as_ref(), collection, embedding_model, dimensions, false)
    }

    /// Open a collection and discard its persisted contents
    pub fn open_fresh(
        dir: impl AsRef<Path>,
        collection: &str,
        embedding_model: &str,
        dimensions: usize,
    ) -> Result<Self> {
        Self::open_inner(dir.as_ref(), collection, embedding_model, dimensions, true)
    }

    fn open_inner(
        dir: &Path,
        collection: &str,
        embedding_model: &str,
        dimensions: usize,
        fresh: bool,
    ) -> Result<Self> {
        if collection.is_empty()
            || collection
                .chars()
                .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        {
            return Err(Error::Configuration(format!(
                "Invalid collection name '{}': use letters, digits, '-' or '_'",
                collection
            )));
        }

        fs::create_dir_all(dir).map_err(|e| {
            Error::Configuration(format!("Cannot create storage directory {}: {}", dir.display(), e))
        })?;

        let lock = Self::acquire_lock(dir, collection)?;
        let data_file = dir.join(format!("{}.json", collection));

        let documents = if data_file.exists() && !fresh {
            let data = Self::load_from_file(&data_file)?;
            // An empty collection carries no vectors to be incompatible with.
            if !data.documents.is_empty()
                && (data.embedding_model != embedding_model || data.dimensions != dimensions)
            {
                return Err(Error::Configuration(format!(
                    "Collection '{}' was built with embedding model '{}' ({} dimensions) but the configured embedder is '{}' ({} dimensions); rebuild the index to switch models",
                    collection, data.embedding_model, data.dimensions, embedding_model, dimensions
                )));
            }
            data.documents
                .into_iter()
                .map(|doc| (doc.id.clone(), doc))
                .collect()
        } else {
            HashMap::new()
        };

        info!(
            collection,
            path = %data_file.display(),
            documents = documents.len(),
            "opened vector store"
        );

        let store = Self {
            data_file,
            collection: collection.to_string(),
            embedding_model: embedding_model.to_string(),
            dimensions,
            documents: RwLock::new(documents),
            _lock: lock,
        };

        if fresh {
            let docs = store.read_docs()?;
            store.save_to_file(&docs)?;
        }

        Ok(store)
    }

    fn acquire_lock(dir: &Path, collection: &str) -> Result<File> {
        let lock_path = dir.join(format!("{}.lock", collection));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        match file.try_lock() {
            Ok(()) => Ok(file),
            Err(TryLockError::WouldBlock) => Err(Error::VectorStore(format!(
                "Collection '{}' in {} is locked by another process",
                collection,
                dir.display()
            ))),
            Err(TryLockError::Error(e)) => Err(Error::Io(e)),
        }
    }

    /// Load documents from file
    fn load_from_file(path: &Path) -> Result<CollectionFile> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            Error::VectorStore(format!("Corrupt collection file {}: {}", path.display(), e))
        })
    }

    /// Save documents to file, replacing it atomically
    fn save_to_file(&self, documents: &HashMap<String, VectorDocument>) -> Result<()> {
        let mut sorted: Vec<VectorDocument> = documents.values().cloned().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let data = CollectionFile {
            collection: self.collection.clone(),
            embedding_model: self.embedding_model.clone(),
            dimensions: self.dimensions,
            documents: sorted,
        };

        let dir = self.data_file.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, &data)?;
        tmp.flush()?;
        tmp.persist(&self.data_file).map_err(|e| Error::Io(e.error))?;

        debug!(documents = data.documents.len(), "saved collection");
        Ok(())
    }

    fn read_docs(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, VectorDocument>>> {
        self.documents
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))
    }

    fn write_docs(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, VectorDocument>>> {
        self.documents
            .write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))
    }

    fn validate(&self, document: &VectorDocument) -> Result<()> {
        match document.embedding {
            Some(ref embedding) if embedding.len() == self.dimensions => Ok(()),
            Some(ref embedding) => Err(Error::VectorStore(format!(
                "Document {} has a {}-dimensional embedding, collection expects {}",
                document.id,
                embedding.len(),
                self.dimensions
            ))),
            None => Err(Error::VectorStore(format!(
                "Document {} has no embedding",
                document.id
            ))),
        }
    }

    /// Simple cosine similarity calculation
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for PersistentVectorStore {
    async fn store(&self, document: VectorDocument) -> Result<String> {
        self.validate(&document)?;
        let id = document.id.clone();

        let mut docs = self.write_docs()?;
        docs.insert(id.clone(), document);
        self.save_to_file(&docs)?;

        Ok(id)
    }

    async fn store_batch(&self, documents: Vec<VectorDocument>) -> Result<Vec<String>> {
        for document in &documents {
            self.validate(document)?;
        }

        let mut ids = Vec::with_capacity(documents.len());
        let mut docs = self.write_docs()?;

        for document in documents {
            let id = document.id.clone();
            docs.insert(id.clone(), document);
            ids.push(id);
        }

        self.save_to_file(&docs)?;
        Ok(ids)
    }

    async fn search_by_vector(&self, vector: &[f32], config: &SearchConfig) -> Result<SearchResult> {
        if vector.len() != self.dimensions {
            return Err(Error::VectorStore(format!(
                "Query vector has {} dimensions, collection expects {}",
                vector.len(),
                self.dimensions
            )));
        }

        let docs = self.read_docs()?;

        let mut results: Vec<VectorDocument> = docs
            .values()
            .filter_map(|doc| {
                let embedding = doc.embedding.as_ref()?;
                let score = Self::cosine_similarity(vector, embedding);
                Some(VectorDocument {
                    id: doc.id.clone(),
                    content: doc.content.clone(),
                    embedding: None,
                    metadata: doc.metadata.clone(),
                    score: Some(score),
                })
            })
            .filter(|doc| match config.score_threshold {
                Some(threshold) => doc.score.unwrap_or(0.0) >= threshold,
                None => true,
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .partial_cmp(&a.score.unwrap_or(0.0))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        results.truncate(config.top_k);
        let total = results.len();

        Ok(SearchResult {
            documents: results,
            total,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<VectorDocument>> {
        let docs = self.read_docs()?;
        Ok(docs.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut docs = self.write_docs()?;
        let removed = docs.remove(id).is_some();
        if removed {
            self.save_to_file(&docs)?;
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<()> {
        let mut docs = self.write_docs()?;
        docs.clear();
        self.save_to_file(&docs)
    }

    async fn count(&self) -> Result<usize> {
        let docs = self.read_docs()?;
        Ok(docs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, content: &str, embedding: Vec<f32>) -> VectorDocument {
        VectorDocument {
            id: id.to_string(),
            content: content.to_string(),
            embedding: Some(embedding),
            metadata: json!({"title": id}),
            score: None,
        }
    }

    #[tokio::test]
    async fn test_store_and_reopen() {
        let tmp = tempfile::tempdir().unwrap();

        {
            let store = PersistentVectorStore::open(tmp.path(), "docs", "test-model", 2).unwrap();
            assert_eq!(store.count().await.unwrap(), 0);
            store
                .store_batch(vec![
                    doc("a", "alpha", vec![1.0, 0.0]),
                    doc("b", "beta", vec![0.0, 1.0]),
                ])
                .await
                .unwrap();
            assert_eq!(store.count().await.unwrap(), 2);
        }

        let store = PersistentVectorStore::open(tmp.path(), "docs", "test-model", 2).unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
        let a = store.get("a").await.unwrap().unwrap();
        assert_eq!(a.content, "alpha");
        assert_eq!(a.embedding, Some(vec![1.0, 0.0]));
    }

    #[tokio::test]
    async fn test_upsert_by_id() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PersistentVectorStore::open(tmp.path(), "docs", "m", 2).unwrap();

        store.store(doc("a", "first", vec![1.0, 0.0])).await.unwrap();
        store.store(doc("a", "second", vec![1.0, 0.0])).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get("a").await.unwrap().unwrap().content, "second");
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PersistentVectorStore::open(tmp.path(), "docs", "m", 2).unwrap();
        store
            .store_batch(vec![
                doc("near", "near", vec![0.9, 0.1]),
                doc("far", "far", vec![0.0, 1.0]),
                doc("exact", "exact", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let config = SearchConfig {
            top_k: 2,
            score_threshold: None,
        };
        let result = store.search_by_vector(&[1.0, 0.0], &config).await.unwrap();

        let ids: Vec<_> = result.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
        assert_eq!(result.total, 2);
        assert!(result.documents.iter().all(|d| d.embedding.is_none()));
        assert!((result.documents[0].score.unwrap() - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_threshold() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PersistentVectorStore::open(tmp.path(), "docs", "m", 2).unwrap();
        store
            .store_batch(vec![doc("x", "x", vec![1.0, 0.0]), doc("y", "y", vec![0.0, 1.0])])
            .await
            .unwrap();

        let config = SearchConfig {
            top_k: 10,
            score_threshold: Some(0.5),
        };
        let result = store.search_by_vector(&[1.0, 0.0], &config).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.documents[0].id, "x");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PersistentVectorStore::open(tmp.path(), "docs", "m", 3).unwrap();

        assert!(store.store(doc("a", "a", vec![1.0, 0.0])).await.is_err());
        assert!(
            store
                .search_by_vector(&[1.0, 0.0], &SearchConfig::default())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_second_open_is_locked() {
        let tmp = tempfile::tempdir().unwrap();
        let _first = PersistentVectorStore::open(tmp.path(), "docs", "m", 2).unwrap();

        let err = PersistentVectorStore::open(tmp.path(), "docs", "m", 2)
            .err()
            .unwrap();
        assert!(matches!(err, Error::VectorStore(_)));
        assert!(err.to_string().contains("locked"));

        // Other collections in the same directory are independent.
        assert!(PersistentVectorStore::open(tmp.path(), "other", "m", 2).is_ok());
    }

    #[tokio::test]
    async fn test_lock_released_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        drop(PersistentVectorStore::open(tmp.path(), "docs", "m", 2).unwrap());
        assert!(PersistentVectorStore::open(tmp.path(), "docs", "m", 2).is_ok());
    }

    #[tokio::test]
    async fn test_model_mismatch_is_configuration_error() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = PersistentVectorStore::open(tmp.path(), "docs", "model-a", 2).unwrap();
            store.store(doc("a", "a", vec![1.0, 0.0])).await.unwrap();
        }

        let err = PersistentVectorStore::open(tmp.path(), "docs", "model-b", 2)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Configuration(_)));

        let fresh = PersistentVectorStore::open_fresh(tmp.path(), "docs", "model-b", 2).unwrap();
        assert_eq!(fresh.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_collection_accepts_other_model() {
        let tmp = tempfile::tempdir().unwrap();
        drop(PersistentVectorStore::open_fresh(tmp.path(), "docs", "model-a", 2).unwrap());

        let store = PersistentVectorStore::open(tmp.path(), "docs", "model-b", 3).unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        store.store(doc("a", "a", vec![1.0, 0.0, 0.0])).await.unwrap();
        drop(store);

        // The rewritten file now belongs to the new model.
        let store = PersistentVectorStore::open(tmp.path(), "docs", "model-b", 3).unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_and_delete() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = PersistentVectorStore::open(tmp.path(), "docs", "m", 2).unwrap();
            store
                .store_batch(vec![doc("a", "a", vec![1.0, 0.0]), doc("b", "b", vec![0.0, 1.0])])
                .await
                .unwrap();
            assert!(store.delete("a").await.unwrap());
            assert!(!store.delete("a").await.unwrap());
            assert_eq!(store.count().await.unwrap(), 1);
            store.clear().await.unwrap();
        }

        let store = PersistentVectorStore::open(tmp.path(), "docs", "m", 2).unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[test]
    fn test_invalid_collection_name() {
        let tmp = tempfile::tempdir().unwrap();
        let err = PersistentVectorStore::open(tmp.path(), "../escape", "m", 2)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
