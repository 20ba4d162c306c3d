//! Groq configuration

use ragbot_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Configuration for the Groq client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
}

impl GroqConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GROQ_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::Configuration("GROQ_API_KEY environment variable not found".to_string())
            })?;

        let api_url = lookup("GROQ_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let model = lookup("GROQ_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let config = Self {
            api_key,
            api_url,
            model,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create configuration with explicit values
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Check that the endpoint is an absolute http(s) URL
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.api_url).map_err(|e| {
            Error::Configuration(format!("Invalid GROQ_API_URL '{}': {}", self.api_url, e))
        })?;

        match parsed.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(Error::Configuration(format!(
                "Unsupported scheme '{}' in GROQ_API_URL",
                scheme
            ))),
        }
    }

    /// Chat completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_api_key_fails_fast() {
        let env = vars(&[]);
        let err = GroqConfig::from_vars(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let env = vars(&[("GROQ_API_KEY", "   ")]);
        assert!(GroqConfig::from_vars(|k| env.get(k).cloned()).is_err());
    }

    #[test]
    fn test_defaults_applied() {
        let env = vars(&[("GROQ_API_KEY", "gsk_test")]);
        let config = GroqConfig::from_vars(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.api_key, "gsk_test");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_overrides_applied() {
        let env = vars(&[
            ("GROQ_API_KEY", "gsk_test"),
            ("GROQ_API_URL", "http://localhost:8080/v1/"),
            ("GROQ_MODEL", "llama-3.3-70b-versatile"),
        ]);
        let config = GroqConfig::from_vars(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.model, "llama-3.3-70b-versatile");
        assert_eq!(
            config.completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_invalid_url_rejected() {
        let env = vars(&[("GROQ_API_KEY", "gsk_test"), ("GROQ_API_URL", "not a url")]);
        let err = GroqConfig::from_vars(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let env = vars(&[("GROQ_API_KEY", "gsk_test"), ("GROQ_API_URL", "ftp://example.com")]);
        assert!(GroqConfig::from_vars(|k| env.get(k).cloned()).is_err());
    }
}
