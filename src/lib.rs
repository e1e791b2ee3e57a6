//! # palmbook-ingest
//!
//! Load palmistry books (scanned or digital PDFs) into a vector store for
//! retrieval-augmented chat.
//!
//! ## Why a hybrid pipeline?
//!
//! The books are a mix of clean digital text, full-page scans with no usable
//! text layer, and text pages carrying hand diagrams whose meaning is only in
//! the drawing. Extracting text alone loses the scans and the diagrams;
//! sending every page to a Vision Language Model is slow and expensive. This
//! crate decides per page which of the two to use, and combines them where
//! a page needs both.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF folder
//!  │
//!  ├─ 1. Discover  recursive *.pdf scan, %PDF magic check
//!  ├─ 2. Extract   native text layer (pdfium, blocking thread)
//!  ├─ 3. Classify  VISION_FULL / HYBRID / TEXT_WITH_IMAGES / TEXT_ONLY
//!  ├─ 4. Visuals   render the page, or pull size-filtered embedded images
//!  ├─ 5. VLM       full-page OCR, diagram-only, or per-image descriptions
//!  ├─ 6. Stitch    prefix the previous page's text tail
//!  ├─ 7. Assemble  one content string + metadata per page
//!  └─ 8. Write     embed and upsert the file's batch into Qdrant
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use palmbook_ingest::{ingest_directory, IngestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // PDF_FOLDER, QDRANT_URL, OPENAI_API_KEY, ... from the environment
//!     let config = IngestConfig::from_env()?;
//!     let report = ingest_directory(&config).await?;
//!     eprintln!(
//!         "{} documents written, {} file(s) errored",
//!         report.totals.documents_written, report.files_errored
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `palm-ingest` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! palmbook-ingest = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod ingest;
pub mod interpreter;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{IngestConfig, IngestConfigBuilder};
pub use error::{FileError, IngestError, InterpreterError, PageError, WriteError};
pub use ingest::{
    ingest_directory, ingest_directory_sync, ingest_directory_with, ingest_file_with,
    persist_statistics,
};
pub use interpreter::{
    ImageInterpreter, Instruction, InterpretRequest, Interpretation, InterpreterReply,
    VisionInterpreter,
};
pub use output::{
    FileReport, FileStats, ImageDescription, IngestRunStatistics, PageBody, PageRecord,
    ProcessingMode, RecordMetadata,
};
pub use pipeline::pdf::{BackendResult, DocumentPages, PdfBackend, PdfiumBackend};
pub use progress::{IngestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{document_id, QdrantWriter, VectorStoreWriter};
