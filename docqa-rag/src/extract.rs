//! Text extraction for uploaded documents.
//!
//! Uploads arrive as bytes plus a content-type label. [`ContentType`] resolves
//! the label to one of the supported formats and [`TextExtractor`] turns the
//! bytes into plain UTF-8 text. The ingestion pipeline only depends on the
//! trait, so parsers can be swapped without touching the core.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TXT: &str = "text/plain";
pub const MIME_CSV: &str = "text/csv";

/// The document formats the pipeline can ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Pdf,
    Txt,
    Csv,
}

impl ContentType {
    /// The canonical MIME type.
    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Pdf => MIME_PDF,
            ContentType::Txt => MIME_TXT,
            ContentType::Csv => MIME_CSV,
        }
    }

    /// Guess the content type from a filename extension.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .ok_or_else(|| RagError::UnsupportedFormat(format!("no extension in '{filename}'")))?;
        extension.parse()
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentType::Pdf => "pdf",
            ContentType::Txt => "txt",
            ContentType::Csv => "csv",
        };
        f.write_str(name)
    }
}

impl FromStr for ContentType {
    type Err = RagError;

    /// Accepts MIME types (parameters such as `; charset=utf-8` are ignored)
    /// and bare extensions, case-insensitively.
    fn from_str(label: &str) -> Result<Self> {
        let essence = label.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        match essence.trim_start_matches('.') {
            "application/pdf" | "pdf" => Ok(ContentType::Pdf),
            "text/plain" | "txt" | "text" => Ok(ContentType::Txt),
            "text/csv" | "application/csv" | "csv" => Ok(ContentType::Csv),
            _ => Err(RagError::UnsupportedFormat(format!("unsupported content type '{label}'"))),
        }
    }
}

/// Turns raw document bytes into plain text.
///
/// Implementations are synchronous and may be CPU-heavy; the ingestion
/// pipeline runs them on the blocking thread pool.
pub trait TextExtractor: Send + Sync {
    /// Extract text from `raw`, interpreted as `content_type`.
    fn extract(&self, raw: &[u8], content_type: ContentType) -> Result<String>;
}

/// The built-in extractor: UTF-8 text, CSV rows, and PDF (feature `pdf`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTextExtractor;

impl TextExtractor for DefaultTextExtractor {
    fn extract(&self, raw: &[u8], content_type: ContentType) -> Result<String> {
        match content_type {
            ContentType::Txt => extract_txt(raw),
            ContentType::Csv => extract_csv(raw),
            ContentType::Pdf => extract_pdf(raw),
        }
    }
}

fn extraction_error(content_type: ContentType, message: impl fmt::Display) -> RagError {
    RagError::ExtractionError { format: content_type.to_string(), message: message.to_string() }
}

fn extract_txt(raw: &[u8]) -> Result<String> {
    let raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
    String::from_utf8(raw.to_vec()).map_err(|e| extraction_error(ContentType::Txt, e))
}

/// Renders each row as `header: value` lines, rows separated by a blank line.
fn extract_csv(raw: &[u8]) -> Result<String> {
    let raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(raw);
    let headers = reader.headers().map_err(|e| extraction_error(ContentType::Csv, e))?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| extraction_error(ContentType::Csv, e))?;
        let lines: Vec<String> = record
            .iter()
            .enumerate()
            .map(|(i, value)| match headers.get(i) {
                Some(header) if !header.is_empty() => format!("{header}: {value}"),
                _ => value.to_string(),
            })
            .collect();
        rows.push(lines.join("\n"));
    }
    Ok(rows.join("\n\n"))
}

#[cfg(feature = "pdf")]
fn extract_pdf(raw: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(raw).map_err(|e| extraction_error(ContentType::Pdf, e))
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_raw: &[u8]) -> Result<String> {
    Err(RagError::UnsupportedFormat("pdf support is not enabled (feature `pdf`)".to_string()))
}
