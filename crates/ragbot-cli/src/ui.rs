//! Terminal UI for the chat loop

use async_trait::async_trait;
use colored::*;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, size},
};
use std::io::{self, Write};

use ragbot_core::Result;

use crate::chat::LineReader;

const PROMPT: &str = "You:";

/// Display startup banner
pub fn display_banner(model: &str, documents: &str, chunks: usize) {
    let terminal_width = size().map(|(w, _)| w as usize).unwrap_or(80);
    let banner_width = std::cmp::min(67, terminal_width.saturating_sub(4)).max(40);
    let inner = banner_width - 2;

    let top_border = format!("┌{}┐", "─".repeat(inner));
    let bottom_border = format!("└{}┘", "─".repeat(inner));
    let empty_line = format!("│{}│", " ".repeat(inner));

    let lines = [
        format!("Model: {}", model),
        format!("Documents: {}", documents),
        format!("Indexed chunks: {}", chunks),
    ];

    println!();
    println!("{}", top_border.blue());
    println!("{}", empty_line.blue());
    println!("{}", boxed_line("RAGbot", inner).blue().bold());
    println!("{}", boxed_line("Answers grounded in your documents", inner).blue());
    println!("{}", empty_line.blue());
    for line in &lines {
        println!("{}", boxed_line(line, inner).blue());
    }
    println!("{}", empty_line.blue());
    println!("{}", bottom_border.blue());
    println!();
}

fn boxed_line(text: &str, inner: usize) -> String {
    let max = inner.saturating_sub(4);
    let text: String = if text.chars().count() > max {
        let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    } else {
        text.to_string()
    };
    let padding = inner.saturating_sub(text.chars().count() + 2);
    format!("│  {}{}│", text, " ".repeat(padding))
}

/// Raw-mode line editor with history recall on the arrow keys
#[derive(Debug, Default)]
pub struct TerminalInput {
    history: Vec<String>,
}

impl TerminalInput {
    pub fn new() -> Self {
        Self::default()
    }

    fn redraw(input: &str) -> io::Result<()> {
        print!("\r\x1b[2K{} {}", PROMPT.green().bold(), input);
        io::stdout().flush()
    }

    /// Read keys until Enter; `None` on Ctrl-D with an empty line or Ctrl-C
    fn read_raw(&mut self) -> io::Result<Option<String>> {
        let mut input = String::new();
        let mut history_index: Option<usize> = None;

        Self::redraw(&input)?;

        loop {
            let Event::Key(key_event) = event::read()? else {
                continue;
            };
            if key_event.kind != KeyEventKind::Press {
                continue;
            }

            match key_event.code {
                KeyCode::Enter => {
                    print!("\r\n");
                    io::stdout().flush()?;
                    if !input.trim().is_empty() {
                        self.history.push(input.clone());
                    }
                    return Ok(Some(input));
                }
                KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                    print!("\r\n");
                    io::stdout().flush()?;
                    return Ok(None);
                }
                KeyCode::Char('d') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                    if input.is_empty() {
                        print!("\r\n");
                        io::stdout().flush()?;
                        return Ok(None);
                    }
                }
                KeyCode::Char(c) => {
                    input.push(c);
                    Self::redraw(&input)?;
                }
                KeyCode::Backspace => {
                    if input.pop().is_some() {
                        Self::redraw(&input)?;
                    }
                }
                KeyCode::Up => {
                    if !self.history.is_empty() {
                        let new_index = match history_index {
                            None => self.history.len() - 1,
                            Some(idx) if idx > 0 => idx - 1,
                            Some(idx) => idx,
                        };
                        history_index = Some(new_index);
                        input = self.history[new_index].clone();
                        Self::redraw(&input)?;
                    }
                }
                KeyCode::Down => {
                    if let Some(idx) = history_index {
                        if idx + 1 < self.history.len() {
                            history_index = Some(idx + 1);
                            input = self.history[idx + 1].clone();
                        } else {
                            history_index = None;
                            input.clear();
                        }
                        Self::redraw(&input)?;
                    }
                }
                KeyCode::Esc => {
                    history_index = None;
                    input.clear();
                    Self::redraw(&input)?;
                }
                _ => {}
            }
        }
    }
}

#[async_trait]
impl LineReader for TerminalInput {
    async fn read_line(&mut self) -> Result<Option<String>> {
        enable_raw_mode()?;
        let result = self.read_raw();
        disable_raw_mode()?;
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxed_line_pads_to_width() {
        let line = boxed_line("RAGbot", 20);
        assert_eq!(line.chars().count(), 22);
        assert!(line.starts_with("│  RAGbot"));
        assert!(line.ends_with('│'));
    }

    #[test]
    fn test_boxed_line_truncates_long_text() {
        let line = boxed_line(&"x".repeat(100), 20);
        assert_eq!(line.chars().count(), 22);
        assert!(line.contains('…'));
    }
}
