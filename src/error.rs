//! Error types for the palmbook-ingest library.
//!
//! Errors are split by the granularity at which they are recovered:
//!
//! * [`IngestError`]: **fatal**, the run cannot start (missing provider or
//!   vector store endpoint, invalid configuration, pdfium missing). Returned
//!   as `Err(IngestError)` from [`crate::ingest::ingest_directory`] before any
//!   file is opened.
//!
//! * [`FileError`]: one PDF could not be opened or its batch could not be
//!   written. Recorded as an error string in [`crate::output::FileReport`];
//!   the run moves on to the next file.
//!
//! * [`PageError`]: one page failed (unreadable text layer, render glitch or
//!   interpreter failure on a vision-only page). The page is excluded from
//!   the file's batch and the next page is processed.
//!
//! [`InterpreterError`] and [`WriteError`] are the failure types of the two
//! external collaborators; the pipeline converts them into page-level and
//! file-level errors respectively.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that abort an ingestion run before any file is opened.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// The vision provider could not be resolved (missing API key etc.).
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// No vector store endpoint is configured.
    #[error("Vector store is not configured: {0}\nSet QDRANT_URL (and QDRANT_API_KEY if required).")]
    StoreNotConfigured(String),

    /// The vector store endpoint is configured but unreachable or rejected setup.
    #[error("Vector store connection failed: {0}")]
    StoreConnectionFailed(String),

    /// Builder or environment validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, set PDFIUM_LIB_PATH=/path/to/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The incremental statistics report could not be written.
    #[error("Failed to write statistics report '{path}': {source}")]
    StatsWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The PDF root directory could not be created or scanned.
    #[error("Cannot scan PDF folder '{path}': {detail}")]
    SourceDirectory { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A file-level error: the PDF is skipped or its batch is lost, the run continues.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("PDF file not found: '{path}'")]
    NotFound { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}' (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The PDF parser rejected the file (corrupt xref, encryption, ...).
    #[error("Cannot open PDF '{path}': {detail}")]
    Open { path: PathBuf, detail: String },

    /// The vector store rejected this file's batch.
    #[error("Vector store write failed: {0}")]
    Write(#[from] WriteError),

    /// The blocking reader thread died unexpectedly.
    #[error("PDF reader for '{path}' aborted: {detail}")]
    Reader { path: PathBuf, detail: String },
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The native text layer could not be read.
    #[error("Page {page}: text extraction failed: {detail}")]
    TextExtraction { page: usize, detail: String },

    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    Render { page: usize, detail: String },

    /// The interpreter failed on a page whose content depends on it.
    #[error("Page {page}: interpreter failed: {detail}")]
    Interpreter { page: usize, detail: String },
}

impl PageError {
    /// 1-based page number.
    pub fn page(&self) -> usize {
        match self {
            PageError::TextExtraction { page, .. }
            | PageError::Render { page, .. }
            | PageError::Interpreter { page, .. } => *page,
        }
    }
}

/// Failure of the external vision interpreter.
///
/// Distinct from a valid "nothing found" answer, which is
/// [`crate::interpreter::Interpretation::NoContent`].
#[derive(Debug, Clone, Error)]
pub enum InterpreterError {
    /// Provider call failed after all retries.
    #[error("interpreter call failed after {retries} retries: {detail}")]
    Failed { retries: u32, detail: String },

    /// Provider call exceeded the per-call timeout on every attempt.
    #[error("interpreter call timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Failure of the external vector store writer.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The embedding provider failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The embedding provider returned the wrong number of vectors.
    #[error("embedding count mismatch: expected {expected}, got {actual}")]
    EmbeddingMismatch { expected: usize, actual: usize },

    /// The store rejected the upsert.
    #[error("upsert into '{collection}' failed: {detail}")]
    Upsert { collection: String, detail: String },

    /// Collection management failed.
    #[error("collection '{collection}' operation failed: {detail}")]
    Collection { collection: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_converts_into_file_error() {
        let e: FileError = WriteError::EmbeddingMismatch {
            expected: 3,
            actual: 2,
        }
        .into();
        let msg = e.to_string();
        assert!(msg.contains("expected 3"), "got: {msg}");
    }

    #[test]
    fn page_error_display_carries_page() {
        let e = PageError::Render {
            page: 7,
            detail: "bitmap alloc".into(),
        };
        assert!(e.to_string().contains("Page 7"));
        assert!(e.to_string().contains("bitmap alloc"));
    }

    #[test]
    fn interpreter_timeout_display() {
        let e = InterpreterError::Timeout { secs: 120 };
        assert!(e.to_string().contains("120s"));
    }

    #[test]
    fn store_not_configured_hints_env() {
        let e = IngestError::StoreNotConfigured("QDRANT_URL missing".into());
        assert!(e.to_string().contains("QDRANT_URL"));
    }
}
