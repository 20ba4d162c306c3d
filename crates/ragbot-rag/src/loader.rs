//! Directory document loader

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulldown_cmark::{Event, Parser, TagEnd};
use regex::Regex;
use scraper::Html;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;
use tracing::{debug, warn};

use ragbot_core::{Document, DocumentLoader, Error, Result};

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid regex"));
static INLINE_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("valid regex"));

const BLOCK_ELEMENTS: &[&str] = &[
    "title", "body", "h1", "h2", "h3", "h4", "h5", "h6", "p", "ul", "ol", "li", "dl", "dt",
    "dd", "table", "tr", "td", "th", "caption", "pre", "div", "blockquote", "section",
    "article", "header", "footer", "nav", "main", "aside", "figure", "figcaption", "form",
];

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Loads every file of a local directory as one document
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    input_dir: PathBuf,
    recursive: bool,
    exclude_hidden: bool,
    required_exts: Option<Vec<String>>,
    num_files_limit: Option<usize>,
}

impl DirectoryLoader {
    /// Create a loader for a directory
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            recursive: false,
            exclude_hidden: true,
            required_exts: None,
            num_files_limit: None,
        }
    }

    /// Descend into subdirectories
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Skip dot-files and dot-directories
    pub fn exclude_hidden(mut self, exclude_hidden: bool) -> Self {
        self.exclude_hidden = exclude_hidden;
        self
    }

    /// Only load files with one of these extensions
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.required_exts = Some(
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        );
        self
    }

    /// Stop after this many files
    pub fn with_file_limit(mut self, limit: usize) -> Self {
        self.num_files_limit = Some(limit);
        self
    }

    /// List the files to load, sorted by path
    fn collect_files(&self) -> Result<Vec<PathBuf>> {
        if !self.input_dir.exists() {
            return Err(Error::Configuration(format!(
                "Directory {} does not exist.",
                self.input_dir.display()
            )));
        }
        if !self.input_dir.is_dir() {
            return Err(Error::Configuration(format!(
                "{} is not a directory.",
                self.input_dir.display()
            )));
        }

        let mut files = Vec::new();
        let mut pending = vec![self.input_dir.clone()];

        while let Some(dir) = pending.pop() {
            let entries = fs::read_dir(&dir).map_err(|e| {
                Error::DocumentLoader(format!("Cannot read directory {}: {}", dir.display(), e))
            })?;

            for entry in entries {
                let path = entry?.path();

                if self.exclude_hidden && is_hidden(&path) {
                    continue;
                }

                if path.is_dir() {
                    if self.recursive {
                        pending.push(path);
                    }
                    continue;
                }

                if let Some(ref exts) = self.required_exts {
                    let ext = extension_of(&path);
                    if !exts.iter().any(|e| *e == ext) {
                        continue;
                    }
                }

                files.push(path);
            }
        }

        files.sort();

        if let Some(limit) = self.num_files_limit {
            files.truncate(limit);
        }

        if files.is_empty() {
            return Err(Error::DocumentLoader(format!(
                "No files found in {}.",
                self.input_dir.display()
            )));
        }

        Ok(files)
    }

    /// Read one file; `None` when it holds no text
    async fn read_document(&self, path: &Path) -> Result<Option<Document>> {
        let bytes = tokio::fs::read(path).await?;
        let ext = extension_of(path);

        let content = match ext.as_str() {
            "pdf" => pdf_extract::extract_text_from_mem(&bytes).map_err(|e| {
                Error::DocumentLoader(format!("Failed to extract text from {}: {}", path.display(), e))
            })?,
            "md" | "markdown" => markdown_to_text(&String::from_utf8_lossy(&bytes)),
            "html" | "htm" => html_to_text(&String::from_utf8_lossy(&bytes)),
            _ => String::from_utf8_lossy(&bytes).into_owned(),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        let file_meta = tokio::fs::metadata(path).await?;
        let relative = path.strip_prefix(&self.input_dir).unwrap_or(path);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Some(Document {
            id: format!("{:x}", md5::compute(relative.to_string_lossy().as_bytes())),
            title: file_name.clone(),
            content,
            source: path.display().to_string(),
            metadata: json!({
                "file_path": path.display().to_string(),
                "file_name": file_name,
                "file_type": mime_type(&ext),
                "file_size": file_meta.len(),
                "creation_date": format_date(file_meta.created().ok()),
                "last_modified_date": format_date(file_meta.modified().ok()),
            }),
        }))
    }
}

#[async_trait]
impl DocumentLoader for DirectoryLoader {
    async fn load(&self) -> Result<Vec<Document>> {
        let files = self.collect_files()?;
        let mut documents = Vec::with_capacity(files.len());

        for path in files {
            match self.read_document(&path).await {
                Ok(Some(document)) => {
                    debug!(path = %path.display(), chars = document.content.len(), "loaded document");
                    documents.push(document);
                }
                Ok(None) => warn!(path = %path.display(), "skipping file without text"),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable file"),
            }
        }

        if documents.is_empty() {
            return Err(Error::DocumentLoader(format!(
                "No documents could be loaded from {}",
                self.input_dir.display()
            )));
        }

        Ok(documents)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn mime_type(ext: &str) -> Option<&'static str> {
    match ext {
        "txt" | "text" | "log" => Some("text/plain"),
        "md" | "markdown" => Some("text/markdown"),
        "html" | "htm" => Some("text/html"),
        "pdf" => Some("application/pdf"),
        "csv" => Some("text/csv"),
        "json" => Some("application/json"),
        _ => None,
    }
}

fn format_date(time: Option<SystemTime>) -> Option<String> {
    time.map(|t| DateTime::<Utc>::from(t).format("%Y-%m-%d").to_string())
}

/// Render markdown to plain text, one blank line between blocks
pub(crate) fn markdown_to_text(markdown: &str) -> String {
    let mut text = String::new();

    for event in Parser::new(markdown) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock,
            ) => text.push_str("\n\n"),
            _ => {}
        }
    }

    BLANK_LINES.replace_all(text.trim(), "\n\n").into_owned()
}

/// Strip an HTML page down to its visible text
///
/// Text from different block elements lands on different lines; inline
/// markup inside one block stays on the same line.
pub(crate) fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();
    let mut current_block = None;

    for node in document.tree.root().descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };

        let mut block = None;
        let mut hidden = false;
        for ancestor in node.ancestors() {
            let Some(element) = ancestor.value().as_element() else {
                continue;
            };
            if HIDDEN_ELEMENTS.contains(&element.name()) {
                hidden = true;
                break;
            }
            if block.is_none() && BLOCK_ELEMENTS.contains(&element.name()) {
                block = Some(ancestor.id());
            }
        }
        if hidden {
            continue;
        }

        if fragment.trim().is_empty() {
            text.push(' ');
            continue;
        }

        if block != current_block {
            text.push('\n');
            current_block = block;
        }
        text.push_str(fragment);
    }

    text.lines()
        .map(|line| INLINE_SPACE.replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
