//! CLI interface for RAGbot
//!
//! The conversational agent, the chat loop and the terminal helpers used by
//! the `ragbot` binary.

mod agent;
mod chat;
mod config;
mod ui;

#[cfg(test)]
mod tests;

pub use agent::{AGENT_NAME, ConversationalAgent, SYSTEM_MESSAGE};
pub use chat::{
    ChatSession, EXIT_COMMANDS, FAREWELL_MESSAGE, LineReader, LineSource, SessionSummary,
    WELCOME_MESSAGE, is_exit_command,
};
pub use config::{AppConfig, DEFAULT_COLLECTION, DEFAULT_DOCUMENTS_DIR, DEFAULT_STORAGE_DIR};
pub use ui::{TerminalInput, display_banner};

// Re-export core types
pub use ragbot_core::{Error, Result};
