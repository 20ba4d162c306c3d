//! Groq chat completions client

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use ragbot_core::{
    ChatMessage, Completion, CompletionConfig, Error, LanguageModelClient, Result,
};

use crate::config::GroqConfig;

/// Groq client speaking the OpenAI-compatible chat completions protocol
pub struct GroqClient {
    config: GroqConfig,
    client: Client,
    current_model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl GroqClient {
    /// Model constants
    pub const LLAMA_3_1_8B_INSTANT: &'static str = "llama-3.1-8b-instant";
    pub const LLAMA_3_3_70B_VERSATILE: &'static str = "llama-3.3-70b-versatile";

    /// Create a new Groq client from configuration
    pub fn new(config: GroqConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Service(e.to_string()))?;

        let current_model = config.model.clone();

        Ok(Self {
            config,
            client,
            current_model,
        })
    }

    /// Create a new Groq client from environment variables
    pub fn from_env() -> Result<Self> {
        let config = GroqConfig::from_env()?;
        Self::new(config)
    }

    /// Set the model to use for completions
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.current_model = model_id.into();
        self
    }

    /// Perform the actual completion request
    async fn perform_completion(
        &self,
        messages: &[ChatMessage],
        config: &CompletionConfig,
    ) -> Result<Completion> {
        let request_body = ChatRequest {
            model: &self.current_model,
            messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            stop: (!config.stop_sequences.is_empty()).then_some(config.stop_sequences.as_slice()),
        };

        let url = self.config.completions_url();
        debug!(model = %self.current_model, messages = messages.len(), "sending chat completion");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(error_for_status(status, retry_after, &error_text));
        }

        let response_text = response.text().await.map_err(map_transport_error)?;
        let completion = parse_completion(&response_text, &self.current_model)?;

        debug!(tokens = ?completion.tokens_used, "chat completion received");
        Ok(completion)
    }
}

#[async_trait]
impl LanguageModelClient for GroqClient {
    async fn connect(&mut self) -> Result<()> {
        let url = format!("{}/models", self.config.api_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, None, &error_text));
        }

        debug!(model = %self.current_model, "Groq credential accepted");
        Ok(())
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        config: &CompletionConfig,
    ) -> Result<Completion> {
        let completion_future = self.perform_completion(messages, config);

        match timeout(config.timeout, completion_future).await {
            Ok(result) => result,
            Err(_) => Err(Error::Service("Request timed out".to_string())),
        }
    }

    fn model_id(&self) -> &str {
        &self.current_model
    }
}

fn map_transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Service(format!("Request timed out: {}", err))
    } else {
        Error::Service(err.to_string())
    }
}

/// Map a non-success HTTP status to the matching error kind
pub(crate) fn error_for_status(status: StatusCode, retry_after: Option<String>, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Authentication(format!("Groq rejected the credential ({}): {}", status, message))
        }
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimit {
            message: format!("Groq API rate limit ({}): {}", status, message),
            retry_after,
        },
        _ => Error::Service(format!(
            "Groq API request failed with status {}: {}",
            status, message
        )),
    }
}

/// Decode a chat completions response body
pub(crate) fn parse_completion(body: &str, model_id: &str) -> Result<Completion> {
    let data: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("{}: {}", e, body)))?;

    let text = data
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| Error::MalformedResponse("Response contained no choices".to_string()))?;

    if text.trim().is_empty() {
        return Err(Error::MalformedResponse(
            "Empty response from Groq API".to_string(),
        ));
    }

    Ok(Completion {
        text: text.trim().to_string(),
        model_id: model_id.to_string(),
        tokens_used: data.usage.and_then(|u| u.total_tokens),
    })
}
