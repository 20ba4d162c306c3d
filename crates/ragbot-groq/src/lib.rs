//! Groq integration for RAGbot
//!
//! This crate provides the Groq implementation of the LanguageModelClient trait.

mod client;
mod config;


pub use client::GroqClient;
pub use config::{GroqConfig, DEFAULT_API_URL, DEFAULT_MODEL};

// Re-export core types for convenience
pub use ragbot_core::{
    ChatMessage, Completion, CompletionConfig, Error, LanguageModelClient, Result,
};
