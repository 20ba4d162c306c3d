//! Interactive chat loop

use async_trait::async_trait;
use colored::*;
use std::io::{BufRead, Write};
use tracing::{info, warn};

use ragbot_core::{LanguageModelClient, Result, Retriever};
use ragbot_rag::compose_prompt;

use crate::agent::ConversationalAgent;

pub const EXIT_COMMANDS: &[&str] = &["exit", "quit", "bye"];
pub const WELCOME_MESSAGE: &str =
    "Welcome to RAGbot! Type 'exit', 'quit', or 'bye' to end the conversation.";
pub const FAREWELL_MESSAGE: &str = "Goodbye! Have a great day!!";

/// Whether the input ends the conversation
pub fn is_exit_command(input: &str) -> bool {
    let normalized = input.trim().to_lowercase();
    EXIT_COMMANDS.contains(&normalized.as_str())
}

/// Source of user input lines
#[async_trait]
pub trait LineReader: Send {
    /// Read one line; `None` at end of input
    async fn read_line(&mut self) -> Result<Option<String>>;
}

/// Line reader over any buffered reader, used for piped stdin
pub struct LineSource<B: BufRead + Send> {
    inner: B,
}

impl<B: BufRead + Send> LineSource<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<B: BufRead + Send> LineReader for LineSource<B> {
    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self.inner.read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Counts reported when the loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub turns: usize,
    pub failures: usize,
}

/// One chat session: retrieve, compose, ask, print
pub struct ChatSession<R: Retriever, L: LanguageModelClient> {
    retriever: R,
    agent: ConversationalAgent<L>,
}

impl<R: Retriever, L: LanguageModelClient> ChatSession<R, L> {
    pub fn new(retriever: R, agent: ConversationalAgent<L>) -> Self {
        Self { retriever, agent }
    }

    /// Answer a single query
    pub async fn process_turn(&self, input: &str) -> Result<String> {
        let result = self.retriever.query(input).await?;
        let prompt = compose_prompt(&result.context, input);
        self.agent.reply(&prompt).await
    }

    /// Run the loop until an exit keyword or end of input
    ///
    /// A failed turn is reported and the loop goes on. Only I/O errors on
    /// the reader or writer end the loop early.
    pub async fn run<I, W>(&self, input: &mut I, out: &mut W) -> Result<SessionSummary>
    where
        I: LineReader + ?Sized,
        W: Write + ?Sized,
    {
        let mut summary = SessionSummary::default();
        let label = format!("{}:", self.agent.name());

        writeln!(out, "{}", WELCOME_MESSAGE.cyan())?;
        out.flush()?;

        // Blank lines and exit keywords are matched trimmed; the question
        // itself goes to retrieval as typed.
        while let Some(line) = input.read_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if is_exit_command(&line) {
                break;
            }

            summary.turns += 1;
            match self.process_turn(&line).await {
                Ok(reply) => {
                    writeln!(out, "{} {}", label.green().bold(), reply)?;
                }
                Err(e) => {
                    summary.failures += 1;
                    if e.is_agent_error() {
                        warn!(error = %e, "language model request failed");
                    } else {
                        warn!(error = %e, "turn failed");
                    }
                    writeln!(
                        out,
                        "{} Sorry, I couldn't answer that ({})",
                        label.red().bold(),
                        e
                    )?;
                }
            }
            out.flush()?;
        }

        writeln!(out, "{}", FAREWELL_MESSAGE.cyan())?;
        out.flush()?;

        info!(turns = summary.turns, failures = summary.failures, "session ended");
        Ok(summary)
    }
}
