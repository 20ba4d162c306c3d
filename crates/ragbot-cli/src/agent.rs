//! Conversational agent

use tracing::debug;

use ragbot_core::{ChatMessage, CompletionConfig, LanguageModelClient, Result};

pub const AGENT_NAME: &str = "RAGbot";
pub const SYSTEM_MESSAGE: &str = "You are a RAG chatbot";

/// Stateless agent: every reply is one request with no history
pub struct ConversationalAgent<L: LanguageModelClient> {
    name: String,
    system_message: String,
    llm: L,
    config: CompletionConfig,
}

impl<L: LanguageModelClient> ConversationalAgent<L> {
    pub fn new(llm: L) -> Self {
        Self {
            name: AGENT_NAME.to_string(),
            system_message: SYSTEM_MESSAGE.to_string(),
            llm,
            config: CompletionConfig::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[cfg(test)]
    pub(crate) fn llm(&self) -> &L {
        &self.llm
    }

    /// The messages sent for one prompt
    pub fn messages(&self, prompt: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_message.as_str()),
            ChatMessage::user(prompt),
        ]
    }

    /// Send the prompt to the model and return the reply text
    pub async fn reply(&self, prompt: &str) -> Result<String> {
        let messages = self.messages(prompt);
        let completion = self.llm.complete(&messages, &self.config).await?;
        debug!(
            agent = %self.name,
            model = %completion.model_id,
            tokens = ?completion.tokens_used,
            "agent replied"
        );
        Ok(completion.text)
    }
}
