//! Embedding providers
//!
//! Three providers sit behind the core `Embedder` trait: a local hashing
//! embedder that needs no network, an OpenAI-compatible HTTP provider and an
//! Ollama provider. The provider is chosen by configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use ragbot_core::{Embedder, Error, Result};

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Hash,
    OpenAi,
    Ollama,
}

impl std::str::FromStr for EmbeddingProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hash" | "local" => Ok(EmbeddingProviderKind::Hash),
            "openai" => Ok(EmbeddingProviderKind::OpenAi),
            "ollama" => Ok(EmbeddingProviderKind::Ollama),
            other => Err(Error::Configuration(format!(
                "Unknown embedding provider '{}' (expected hash, openai or ollama)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EmbeddingProviderKind::Hash => "hash",
            EmbeddingProviderKind::OpenAi => "openai",
            EmbeddingProviderKind::Ollama => "ollama",
        };
        f.write_str(name)
    }
}

/// Configuration for the embedding provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hash,
            model: None,
            endpoint: None,
            api_key: None,
            dimensions: None,
        }
    }
}

impl EmbeddingConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = match lookup("RAGBOT_EMBEDDING_PROVIDER") {
            Some(value) => value.parse()?,
            None => EmbeddingProviderKind::Hash,
        };

        let dimensions = lookup("RAGBOT_EMBEDDING_DIMENSIONS")
            .map(|value| {
                value.trim().parse::<usize>().ok().filter(|d| *d > 0).ok_or_else(|| {
                    Error::Configuration(format!(
                        "RAGBOT_EMBEDDING_DIMENSIONS must be a positive integer, got '{}'",
                        value
                    ))
                })
            })
            .transpose()?;

        let config = Self {
            provider,
            model: lookup("RAGBOT_EMBEDDING_MODEL"),
            endpoint: lookup("RAGBOT_EMBEDDING_URL"),
            api_key: lookup("OPENAI_API_KEY"),
            dimensions,
        };

        if config.provider == EmbeddingProviderKind::OpenAi && config.api_key.is_none() {
            return Err(Error::Configuration(
                "OPENAI_API_KEY environment variable not found (required by the openai embedding provider)"
                    .to_string(),
            ));
        }

        Ok(config)
    }
}

/// Build the configured embedder
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.provider {
        EmbeddingProviderKind::Hash => Arc::new(HashEmbedder::new(
            config.dimensions.unwrap_or(HashEmbedder::DEFAULT_DIMENSIONS),
        )),
        EmbeddingProviderKind::OpenAi => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                Error::Configuration("OPENAI_API_KEY environment variable not found".to_string())
            })?;
            Arc::new(OpenAiEmbedder::new(
                api_key,
                config.model.clone(),
                config.endpoint.clone(),
                config.dimensions,
            )?)
        }
        EmbeddingProviderKind::Ollama => Arc::new(OllamaEmbedder::new(
            config.model.clone(),
            config.endpoint.clone(),
            config.dimensions,
        )?),
    };

    debug!(
        provider = %config.provider,
        model = embedder.model_name(),
        dimensions = embedder.dimensions(),
        "embedder ready"
    );
    Ok(embedder)
}

/// Request timeout for remote embedding providers
pub const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(60);

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Embedding(e.to_string()))
}

fn map_request_error(provider: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Embedding(format!("{} request timed out: {}", provider, err))
    } else {
        Error::Embedding(format!("{} request failed: {}", provider, err))
    }
}

fn check_dimensions(vectors: &[Vec<f32>], expected: usize, model: &str) -> Result<()> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(v) => Err(Error::Embedding(format!(
            "Model {} returned a {}-dimensional vector, expected {}",
            model,
            v.len(),
            expected
        ))),
        None => Ok(()),
    }
}

/// Local embedder built from hashed word and bigram features
///
/// Deterministic across runs and platforms, so vectors persisted by one run
/// stay comparable with query vectors of the next.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
    model_name: String,
}

impl HashEmbedder {
    pub const DEFAULT_DIMENSIONS: usize = 384;

    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model_name: format!("hash-embedding-{}", dimensions),
        }
    }

    fn bucket(&self, feature: &str) -> (usize, usize, usize) {
        let digest = md5::compute(feature.as_bytes()).0;
        let word = |i: usize| {
            u32::from_le_bytes([digest[i], digest[i + 1], digest[i + 2], digest[i + 3]]) as usize
        };
        (
            word(0) % self.dimensions,
            word(4) % self.dimensions,
            word(8) % self.dimensions,
        )
    }

    /// Generate the embedding for one text
    fn embed_text(&self, text: &str) -> Vec<f32> {
        let normalized = text.to_lowercase();
        let words: Vec<&str> = normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut embedding = vec![0.0f32; self.dimensions];

        for word in &words {
            let (a, b, c) = self.bucket(word);
            embedding[a] += 1.0;
            embedding[b] += 0.7;
            embedding[c] += 0.5;
        }

        for pair in words.windows(2) {
            let (a, _, _) = self.bucket(&format!("{} {}", pair[0], pair[1]));
            embedding[a] += 0.8;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in embedding.iter_mut() {
                *value /= magnitude;
            }
        }

        embedding
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI embedding provider
///
/// Works with OpenAI's API and any compatible endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAiEmbedder {
    pub const DEFAULT_MODEL: &'static str = "text-embedding-ada-002";
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Create a new OpenAI provider
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `model` - Model name (defaults to "text-embedding-ada-002")
    /// * `endpoint` - API endpoint (defaults to "https://api.openai.com/v1")
    /// * `dims` - Embedding dimensions (1536 for text-embedding-ada-002)
    pub fn new(
        api_key: String,
        model: Option<String>,
        endpoint: Option<String>,
        dims: Option<usize>,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(EMBEDDING_TIMEOUT)?,
            endpoint: endpoint.unwrap_or_else(|| Self::DEFAULT_ENDPOINT.to_string()),
            api_key,
            model: model.unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            dims: dims.unwrap_or(1536),
        })
    }

    /// Replace the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = http_client(timeout)?;
        Ok(self)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("Empty response from OpenAI".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.endpoint.trim_end_matches('/'));
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_request_error("OpenAI", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("OpenAI API error {status}: {body}")));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| map_request_error("OpenAI", e))?;
        let vectors: Vec<Vec<f32>> = result.data.into_iter().map(|d| d.embedding).collect();

        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "OpenAI returned {} embeddings for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        check_dimensions(&vectors, self.dims, &self.model)?;
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama embedding provider
pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dims: usize,
}

impl OllamaEmbedder {
    pub const DEFAULT_MODEL: &'static str = "nomic-embed-text";
    pub const DEFAULT_ENDPOINT: &'static str = "http://localhost:11434";

    /// Create a new Ollama provider
    ///
    /// # Arguments
    /// * `model` - Model name (defaults to "nomic-embed-text")
    /// * `endpoint` - Ollama endpoint (defaults to "http://localhost:11434")
    /// * `dims` - Embedding dimensions (768 for nomic-embed-text)
    pub fn new(
        model: Option<String>,
        endpoint: Option<String>,
        dims: Option<usize>,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(EMBEDDING_TIMEOUT)?,
            endpoint: endpoint.unwrap_or_else(|| Self::DEFAULT_ENDPOINT.to_string()),
            model: model.unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            dims: dims.unwrap_or(768),
        })
    }

    /// Replace the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = http_client(timeout)?;
        Ok(self)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("Empty response from Ollama".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.endpoint.trim_end_matches('/'));
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_request_error("Ollama", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("Ollama API error {status}: {body}")));
        }

        let result: OllamaEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| map_request_error("Ollama", e))?;

        check_dimensions(&result.embeddings, self.dims, &self.model)?;
        Ok(result.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_hash_embedder_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed("Paris is the capital of France").await.unwrap();
        let b = embedder.embed("Paris is the capital of France").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hash_embedder_similarity_ranks_related_text_higher() {
        let embedder = HashEmbedder::default();
        let query = embedder.embed("What is the capital of France?").await.unwrap();
        let related = embedder.embed("Paris is the capital of France.").await.unwrap();
        let unrelated = embedder.embed("Photosynthesis converts light into sugar.").await.unwrap();

        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_hash_embedder_empty_text() {
        let embedder = HashEmbedder::new(8);
        let v = embedder.embed("   ").await.unwrap();
        assert_eq!(v, vec![0.0; 8]);
        assert_eq!(embedder.model_name(), "hash-embedding-8");
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let embedder = HashEmbedder::default();
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let batch = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(batch[0], embedder.embed("alpha").await.unwrap());
        assert_eq!(batch[1], embedder.embed("beta").await.unwrap());
    }

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!("hash".parse::<EmbeddingProviderKind>().unwrap(), EmbeddingProviderKind::Hash);
        assert_eq!("OpenAI".parse::<EmbeddingProviderKind>().unwrap(), EmbeddingProviderKind::OpenAi);
        assert_eq!(" ollama ".parse::<EmbeddingProviderKind>().unwrap(), EmbeddingProviderKind::Ollama);
        assert!("chroma".parse::<EmbeddingProviderKind>().is_err());
    }

    #[test]
    fn test_config_defaults_to_hash() {
        let config = EmbeddingConfig::from_vars(|_| None).unwrap();
        assert_eq!(config.provider, EmbeddingProviderKind::Hash);
        let embedder = build_embedder(&config).unwrap();
        assert_eq!(embedder.dimensions(), HashEmbedder::DEFAULT_DIMENSIONS);
    }

    #[test]
    fn test_openai_requires_api_key() {
        let env: HashMap<&str, &str> = [("RAGBOT_EMBEDDING_PROVIDER", "openai")].into();
        let err = EmbeddingConfig::from_vars(|k| env.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_openai_config() {
        let env: HashMap<&str, &str> = [
            ("RAGBOT_EMBEDDING_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk-test"),
            ("RAGBOT_EMBEDDING_MODEL", "text-embedding-3-small"),
        ]
        .into();
        let config = EmbeddingConfig::from_vars(|k| env.get(k).map(|v| v.to_string())).unwrap();
        let embedder = build_embedder(&config).unwrap();
        assert_eq!(embedder.model_name(), "text-embedding-3-small");
        assert_eq!(embedder.dimensions(), 1536);
    }

    #[test]
    fn test_invalid_dimensions() {
        let env: HashMap<&str, &str> = [("RAGBOT_EMBEDDING_DIMENSIONS", "zero")].into();
        let err = EmbeddingConfig::from_vars(|k| env.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(err.to_string().contains("RAGBOT_EMBEDDING_DIMENSIONS"));
    }

    /// Accept connections and never answer
    async fn silent_endpoint() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_ollama_request_times_out() {
        let endpoint = silent_endpoint().await;
        let embedder = OllamaEmbedder::new(None, Some(endpoint), None)
            .unwrap()
            .with_timeout(Duration::from_millis(200))
            .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(10), embedder.embed("hi"))
            .await
            .expect("embedder should give up on its own");

        let err = result.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
        assert!(err.to_string().contains("timed out"), "{err}");
    }

    #[tokio::test]
    async fn test_openai_request_times_out() {
        let endpoint = silent_endpoint().await;
        let embedder = OpenAiEmbedder::new("sk-test".to_string(), None, Some(endpoint), None)
            .unwrap()
            .with_timeout(Duration::from_millis(200))
            .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(10), embedder.embed("hi"))
            .await
            .expect("embedder should give up on its own");

        assert!(result.unwrap_err().to_string().contains("timed out"));
    }

    #[test]
    fn test_check_dimensions() {
        assert!(check_dimensions(&[vec![0.0; 3]], 3, "m").is_ok());
        assert!(check_dimensions(&[vec![0.0; 3], vec![0.0; 2]], 3, "m").is_err());
    }
}
