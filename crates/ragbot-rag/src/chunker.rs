//! Sentence-aware text chunking

use regex::Regex;
use std::sync::LazyLock;

use ragbot_core::IndexingConfig;

static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?\n]+(?:[.!?]+|\n|$)").expect("valid regex"));

/// Splits text into overlapping chunks of at most `chunk_size` characters
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// Create a chunker; the overlap is clamped below the chunk size
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    pub fn from_config(config: &IndexingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split text into chunks
    ///
    /// Sentences are kept whole when they fit. A sentence longer than the
    /// chunk size is split on words, and a word longer than the chunk size on
    /// characters. Whitespace inside a chunk is normalized to single spaces.
    pub fn split(&self, text: &str) -> Vec<String> {
        let units = self.units(text);
        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_len = 0;

        for unit in units {
            let unit_len = unit.chars().count();

            if !current.is_empty() && current_len + 1 + unit_len > self.chunk_size {
                chunks.push(current.join(" "));

                // Carry trailing units forward as overlap, keeping room for the new unit.
                let mut carried: Vec<String> = Vec::new();
                let mut carried_len = 0;
                for prev in current.iter().rev() {
                    let prev_len = prev.chars().count();
                    let extra = if carried.is_empty() { prev_len } else { prev_len + 1 };
                    if carried_len + extra > self.chunk_overlap
                        || carried_len + extra + 1 + unit_len > self.chunk_size
                    {
                        break;
                    }
                    carried.push(prev.clone());
                    carried_len += extra;
                }
                carried.reverse();

                current = carried;
                current_len = carried_len;
            }

            current_len += if current.is_empty() { unit_len } else { unit_len + 1 };
            current.push(unit);
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        chunks
    }

    /// Break text into units no longer than the chunk size
    fn units(&self, text: &str) -> Vec<String> {
        let mut units = Vec::new();

        for sentence in SENTENCE.find_iter(text) {
            let sentence = sentence.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
            if sentence.is_empty() {
                continue;
            }

            if sentence.chars().count() <= self.chunk_size {
                units.push(sentence);
                continue;
            }

            for word in sentence.split(' ') {
                let chars: Vec<char> = word.chars().collect();
                if chars.len() <= self.chunk_size {
                    units.push(word.to_string());
                } else {
                    units.extend(
                        chars
                            .chunks(self.chunk_size)
                            .map(|piece| piece.iter().collect::<String>()),
                    );
                }
            }
        }

        units
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::from_config(&IndexingConfig::default())
    }
}
