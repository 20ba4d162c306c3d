//! Application configuration

use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use ragbot_core::{Error, IndexingConfig, Result, SearchConfig};
use ragbot_rag::EmbeddingConfig;

pub const DEFAULT_DOCUMENTS_DIR: &str = "./documents";
pub const DEFAULT_STORAGE_DIR: &str = "./chroma_db";
pub const DEFAULT_COLLECTION: &str = "my-docs-collection";

/// Settings for one RAGbot run
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub documents_dir: PathBuf,
    pub storage_dir: PathBuf,
    pub collection: String,
    pub top_k: usize,
    pub score_threshold: Option<f32>,
    pub indexing: IndexingConfig,
    pub embedding: EmbeddingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let search = SearchConfig::default();
        Self {
            documents_dir: PathBuf::from(DEFAULT_DOCUMENTS_DIR),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            collection: DEFAULT_COLLECTION.to_string(),
            top_k: search.top_k,
            score_threshold: search.score_threshold,
            indexing: IndexingConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            documents_dir: lookup("RAGBOT_DOCUMENTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.documents_dir),
            storage_dir: lookup("RAGBOT_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            collection: lookup("RAGBOT_COLLECTION").unwrap_or(defaults.collection),
            top_k: parse_var(&lookup, "RAGBOT_TOP_K")?.unwrap_or(defaults.top_k),
            score_threshold: parse_var(&lookup, "RAGBOT_SCORE_THRESHOLD")?,
            indexing: IndexingConfig {
                chunk_size: parse_var(&lookup, "RAGBOT_CHUNK_SIZE")?
                    .unwrap_or(defaults.indexing.chunk_size),
                chunk_overlap: parse_var(&lookup, "RAGBOT_CHUNK_OVERLAP")?
                    .unwrap_or(defaults.indexing.chunk_overlap),
                batch_size: parse_var(&lookup, "RAGBOT_BATCH_SIZE")?
                    .unwrap_or(defaults.indexing.batch_size),
            },
            embedding: EmbeddingConfig::from_vars(&lookup)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values no run can work with
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::Configuration("top_k must be at least 1".to_string()));
        }
        if self.indexing.chunk_size == 0 {
            return Err(Error::Configuration(
                "RAGBOT_CHUNK_SIZE must be at least 1".to_string(),
            ));
        }
        if self.indexing.batch_size == 0 {
            return Err(Error::Configuration(
                "RAGBOT_BATCH_SIZE must be at least 1".to_string(),
            ));
        }
        if self.collection.trim().is_empty() {
            return Err(Error::Configuration(
                "Collection name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            top_k: self.top_k,
            score_threshold: self.score_threshold,
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value.trim().parse().map(Some).map_err(|_| {
            Error::Configuration(format!("Invalid value '{}' for {}", value, key))
        }),
    }
}
