//! Output types: page records handed to the vector store, and run statistics.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// How a page's content was obtained. Computed once per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingMode {
    /// Native text only, no interpreter calls.
    TextOnly,
    /// Native text plus one description per retained embedded image.
    TextWithImages,
    /// Native text plus a diagram description of the rasterised page.
    Hybrid,
    /// Rasterised page description replaces the (insufficient) text layer.
    VisionFull,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::TextOnly => "TEXT_ONLY",
            ProcessingMode::TextWithImages => "TEXT_WITH_IMAGES",
            ProcessingMode::Hybrid => "HYBRID",
            ProcessingMode::VisionFull => "VISION_FULL",
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of one retained embedded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescription {
    /// 1-based position among the page's image objects (discarded ones included).
    pub ordinal: usize,
    pub text: String,
}

/// The mode-specific part of a page record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageBody {
    TextOnly,
    TextWithImages { images: Vec<ImageDescription> },
    /// `diagram` is `None` when the interpreter found no illustration or failed.
    Hybrid { diagram: Option<String> },
    VisionFull { page_description: String },
}

impl PageBody {
    pub fn mode(&self) -> ProcessingMode {
        match self {
            PageBody::TextOnly => ProcessingMode::TextOnly,
            PageBody::TextWithImages { .. } => ProcessingMode::TextWithImages,
            PageBody::Hybrid { .. } => ProcessingMode::Hybrid,
            PageBody::VisionFull { .. } => ProcessingMode::VisionFull,
        }
    }
}

/// One assembled page, ready to be embedded and stored.
///
/// Built only by [`crate::pipeline::assemble`]; immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    source: String,
    document_key: String,
    page_number: usize,
    raw_text: String,
    overlap_prefix: String,
    body: PageBody,
    content: String,
    processed_at: DateTime<Utc>,
}

impl PageRecord {
    pub(crate) fn new(
        source: String,
        document_key: String,
        page_number: usize,
        raw_text: String,
        overlap_prefix: String,
        body: PageBody,
        content: String,
    ) -> Self {
        Self {
            source,
            document_key,
            page_number,
            raw_text,
            overlap_prefix,
            body,
            content,
            processed_at: Utc::now(),
        }
    }

    /// File name of the owning PDF.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Path of the owning PDF relative to the ingestion root.
    ///
    /// Two books may share a file name in different folders; this key
    /// keeps them apart.
    pub fn document_key(&self) -> &str {
        &self.document_key
    }

    /// 1-based page number.
    pub fn page_number(&self) -> usize {
        self.page_number
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn overlap_prefix(&self) -> &str {
        &self.overlap_prefix
    }

    pub fn body(&self) -> &PageBody {
        &self.body
    }

    pub fn processing_mode(&self) -> ProcessingMode {
        self.body.mode()
    }

    pub fn embedded_image_descriptions(&self) -> &[ImageDescription] {
        match &self.body {
            PageBody::TextWithImages { images } => images,
            _ => &[],
        }
    }

    /// Present only when the page was rasterised and the interpreter returned content.
    pub fn rendered_page_description(&self) -> Option<&str> {
        match &self.body {
            PageBody::Hybrid { diagram } => diagram.as_deref(),
            PageBody::VisionFull { page_description } => Some(page_description),
            _ => None,
        }
    }

    /// The assembled text written to storage.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn processed_at(&self) -> DateTime<Utc> {
        self.processed_at
    }

    /// Metadata stored alongside the embedded content.
    pub fn metadata(&self) -> RecordMetadata {
        RecordMetadata {
            source: self.source.clone(),
            page: self.page_number,
            record_type: RECORD_TYPE.to_string(),
            processing_mode: self.processing_mode(),
            has_overlap: !self.overlap_prefix.is_empty(),
            processed_at: self.processed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Value of the `type` metadata key for every record this crate writes.
pub const RECORD_TYPE: &str = "hybrid_book_page";

/// Metadata mapping persisted with each record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub source: String,
    pub page: usize,
    #[serde(rename = "type")]
    pub record_type: String,
    pub processing_mode: ProcessingMode,
    pub has_overlap: bool,
    /// RFC 3339 / ISO-8601 UTC timestamp.
    pub processed_at: String,
}

/// Counters for one file (or, summed, for a whole run).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub total_pages: usize,
    /// Pages that produced a record for the writer.
    pub processed_pages: usize,
    pub text_only_pages: usize,
    pub text_with_images_pages: usize,
    pub hybrid_pages: usize,
    pub vision_full_pages: usize,
    /// Assembled content too short to store.
    pub skipped_pages: usize,
    /// Exception during text extraction, rendering or a required interpretation.
    pub failed_pages: usize,
    /// Written without part of their vision contribution.
    pub degraded_pages: usize,
    pub images_analyzed: usize,
    /// Embedded images under the size threshold.
    pub images_discarded: usize,
    /// Embedded images dropped because extraction or interpretation failed.
    pub image_failures: usize,
    pub interpreter_calls: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub documents_written: usize,
    pub duration_ms: u64,
}

impl FileStats {
    pub(crate) fn count_mode(&mut self, mode: ProcessingMode) {
        match mode {
            ProcessingMode::TextOnly => self.text_only_pages += 1,
            ProcessingMode::TextWithImages => self.text_with_images_pages += 1,
            ProcessingMode::Hybrid => self.hybrid_pages += 1,
            ProcessingMode::VisionFull => self.vision_full_pages += 1,
        }
    }

    /// Add another file's counters into this one.
    pub fn absorb(&mut self, other: &FileStats) {
        self.total_pages += other.total_pages;
        self.processed_pages += other.processed_pages;
        self.text_only_pages += other.text_only_pages;
        self.text_with_images_pages += other.text_with_images_pages;
        self.hybrid_pages += other.hybrid_pages;
        self.vision_full_pages += other.vision_full_pages;
        self.skipped_pages += other.skipped_pages;
        self.failed_pages += other.failed_pages;
        self.degraded_pages += other.degraded_pages;
        self.images_analyzed += other.images_analyzed;
        self.images_discarded += other.images_discarded;
        self.image_failures += other.image_failures;
        self.interpreter_calls += other.interpreter_calls;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.documents_written += other.documents_written;
        self.duration_ms += other.duration_ms;
    }
}

/// Outcome of one PDF.
///
/// `error` is set when the file could not be opened (then `stats` is `None`)
/// or when its batch write failed (then `stats` holds the page counts and
/// `documents_written` is 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub file_name: String,
    pub path: PathBuf,
    pub stats: Option<FileStats>,
    pub error: Option<String>,
}

impl FileReport {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregated statistics for a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestRunStatistics {
    pub files: Vec<FileReport>,
    pub totals: FileStats,
    pub files_errored: usize,
    /// The run stopped early because the cancel flag was raised.
    pub cancelled: bool,
}

impl IngestRunStatistics {
    pub(crate) fn push(&mut self, report: FileReport) {
        if let Some(ref stats) = report.stats {
            self.totals.absorb(stats);
        }
        if report.is_error() {
            self.files_errored += 1;
        }
        self.files.push(report);
    }
}
