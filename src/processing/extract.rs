//! PDF text extraction.
//!
//! Files are read page by page with `lopdf`. A file that fails to load or decode is logged and
//! skipped so one bad upload never sinks the batch.

use super::types::ExtractError;
use lopdf::Document;
use std::path::{Path, PathBuf};

/// Result of extracting a document set.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Text of every readable page, in file then page order.
    pub text: String,
    /// Files that produced output (possibly empty).
    pub files_read: usize,
    /// Files skipped because they could not be read.
    pub files_skipped: usize,
}

impl ExtractionReport {
    /// Whether no usable text was found.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Extract and concatenate text from every file in `paths`.
pub fn extract_text(paths: &[PathBuf]) -> ExtractionReport {
    let mut report = ExtractionReport::default();

    for path in paths {
        match extract_file(path) {
            Ok(text) => {
                tracing::debug!(path = %path.display(), chars = text.len(), "Extracted PDF text");
                append_segment(&mut report.text, &text);
                report.files_read += 1;
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), error = %error, "Skipping unreadable PDF");
                report.files_skipped += 1;
            }
        }
    }

    tracing::info!(
        files_read = report.files_read,
        files_skipped = report.files_skipped,
        chars = report.text.len(),
        "Finished text extraction"
    );
    report
}

/// Extract the text of every page of one PDF, in page order.
pub fn extract_file(path: &Path) -> Result<String, ExtractError> {
    let document = Document::load(path).map_err(|error| ExtractError::Load {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;

    let mut text = String::new();
    for page in document.get_pages().keys() {
        let page_text = document
            .extract_text(&[*page])
            .map_err(|error| ExtractError::Page {
                path: path.to_path_buf(),
                page: *page,
                message: error.to_string(),
            })?;
        append_segment(&mut text, &page_text);
    }
    Ok(text)
}

// Keeps words from fusing across page and file boundaries.
fn append_segment(buffer: &mut String, segment: &str) {
    if segment.is_empty() {
        return;
    }
    if !buffer.is_empty() && !buffer.ends_with(char::is_whitespace) {
        buffer.push('\n');
    }
    buffer.push_str(segment);
}
