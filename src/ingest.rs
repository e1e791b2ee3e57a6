//! Batch Driver: discover PDFs, run the page pipeline, write per file.
//!
//! ## Failure isolation
//!
//! | scope | what fails                          | outcome                                |
//! |-------|-------------------------------------|----------------------------------------|
//! | run   | configuration, pdfium binding       | `Err(IngestError)` before any file     |
//! | file  | open / magic bytes / batch write    | `FileReport.error`, next file          |
//! | page  | text extraction, required vision    | `failed_pages`, next page              |
//! | image | extraction or interpretation        | `image_failures`, rest of page written |
//!
//! ## Threading
//!
//! pdfium work for one file happens on a single `spawn_blocking` thread that
//! sends page snapshots through a bounded channel. Interpreter calls and the
//! final write happen on the async side, one page at a time and in page
//! order, because each page's overlap prefix depends on the page before it.

use crate::config::IngestConfig;
use crate::error::{FileError, IngestError, PageError};
use crate::interpreter::{ImageInterpreter, VisionInterpreter};
use crate::output::{FileReport, FileStats, IngestRunStatistics, PageRecord};
use crate::pipeline::assemble::{assemble, Assembled, PageText};
use crate::pipeline::classify::Classifier;
use crate::pipeline::overlap::OverlapStitcher;
use crate::pipeline::page::{
    resolve_page, snapshot_page, PageSnapshot, ResolveSettings, SnapshotSettings,
};
use crate::pipeline::pdf::{DocumentPages, PdfBackend, PdfiumBackend};
use crate::pipeline::source::{check_pdf_magic, discover_pdfs, document_key, source_name};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::store::{QdrantWriter, VectorStoreWriter};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Snapshots buffered between the pdfium thread and the page loop.
const PAGE_CHANNEL_CAPACITY: usize = 2;

/// Ingest every PDF under `config.pdf_root` with the production
/// collaborators: pdfium, the configured vision provider and Qdrant.
///
/// All collaborators are constructed (and the collection ensured) before the
/// first file is opened, so configuration problems abort the run up front.
pub async fn ingest_directory(config: &IngestConfig) -> Result<IngestRunStatistics, IngestError> {
    let interpreter = VisionInterpreter::from_config(config)?;
    let writer = QdrantWriter::from_config(config)?;
    writer
        .ensure_collection()
        .await
        .map_err(|e| IngestError::StoreConnectionFailed(e.to_string()))?;
    let backend = PdfiumBackend::new()?;

    ingest_directory_with(
        config,
        Arc::new(backend),
        Arc::new(interpreter),
        Arc::new(writer),
    )
    .await
}

/// Synchronous wrapper around [`ingest_directory`].
///
/// Creates a temporary tokio runtime internally.
pub fn ingest_directory_sync(config: &IngestConfig) -> Result<IngestRunStatistics, IngestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| IngestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(ingest_directory(config))
}

/// Ingest every PDF under `config.pdf_root` with explicit collaborators.
///
/// Returns `Ok` even when files or pages failed; inspect the report.
pub async fn ingest_directory_with(
    config: &IngestConfig,
    backend: Arc<dyn PdfBackend>,
    interpreter: Arc<dyn ImageInterpreter>,
    writer: Arc<dyn VectorStoreWriter>,
) -> Result<IngestRunStatistics, IngestError> {
    let started = Instant::now();
    let driver = Driver::new(config, backend, interpreter, writer)?;

    let files = discover_pdfs(&config.pdf_root)?;
    info!(
        "Found {} PDF(s) under {}",
        files.len(),
        config.pdf_root.display()
    );
    driver.progress.on_run_start(files.len());

    let mut run = IngestRunStatistics::default();
    for path in &files {
        if config.is_cancelled() {
            run.cancelled = true;
            break;
        }

        let report = driver.ingest_file(path).await;
        run.push(report);

        // The report is advisory; a failed write never stops ingestion.
        if let Some(ref stats_path) = config.stats_path {
            if let Err(e) = persist_statistics(stats_path, &run) {
                warn!("{}", e);
            }
        }
    }
    run.cancelled |= config.is_cancelled();

    let totals = &run.totals;
    info!(
        "Run complete: {} file(s), {} errored, {} pages (text {} / text+images {} / hybrid {} / vision {}), \
         {} skipped, {} failed, {} images analyzed, {} documents written in {}ms",
        run.files.len(),
        run.files_errored,
        totals.total_pages,
        totals.text_only_pages,
        totals.text_with_images_pages,
        totals.hybrid_pages,
        totals.vision_full_pages,
        totals.skipped_pages,
        totals.failed_pages,
        totals.images_analyzed,
        totals.documents_written,
        started.elapsed().as_millis()
    );
    if run.cancelled {
        warn!("Run cancelled after {} file(s)", run.files.len());
    }
    driver
        .progress
        .on_run_complete(run.files.len(), totals.documents_written);

    Ok(run)
}

/// Ingest a single PDF with explicit collaborators.
pub async fn ingest_file_with(
    path: &Path,
    config: &IngestConfig,
    backend: Arc<dyn PdfBackend>,
    interpreter: Arc<dyn ImageInterpreter>,
    writer: Arc<dyn VectorStoreWriter>,
) -> Result<FileReport, IngestError> {
    let driver = Driver::new(config, backend, interpreter, writer)?;
    Ok(driver.ingest_file(path).await)
}

/// Rewrite the JSON report atomically (temp file + rename).
pub fn persist_statistics(path: &Path, run: &IngestRunStatistics) -> Result<(), IngestError> {
    let json = serde_json::to_vec_pretty(run)
        .map_err(|e| IngestError::Internal(format!("Cannot serialise statistics: {e}")))?;

    let write_err = |source| IngestError::StatsWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json).map_err(write_err)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(write_err(e));
    }
    debug!("Statistics written to {}", path.display());
    Ok(())
}

enum ReaderEvent {
    Opened { page_count: usize },
    Page(Result<PageSnapshot, PageError>),
}

struct Driver<'a> {
    config: &'a IngestConfig,
    classifier: Classifier,
    backend: Arc<dyn PdfBackend>,
    interpreter: Arc<dyn ImageInterpreter>,
    writer: Arc<dyn VectorStoreWriter>,
    progress: ProgressCallback,
}

/// Mutable state of one file while its pages stream in.
struct FileRun {
    file_name: String,
    /// Path relative to the PDF root; unique within a run.
    document_key: String,
    stats: FileStats,
    records: Vec<PageRecord>,
    stitcher: OverlapStitcher,
    opened: bool,
}

impl<'a> Driver<'a> {
    fn new(
        config: &'a IngestConfig,
        backend: Arc<dyn PdfBackend>,
        interpreter: Arc<dyn ImageInterpreter>,
        writer: Arc<dyn VectorStoreWriter>,
    ) -> Result<Self, IngestError> {
        Ok(Self {
            config,
            classifier: Classifier::from_config(config)?,
            backend,
            interpreter,
            writer,
            progress: config
                .progress_callback
                .clone()
                .unwrap_or_else(|| Arc::new(NoopProgressCallback)),
        })
    }

    async fn ingest_file(&self, path: &Path) -> FileReport {
        let file_name = source_name(path);
        let started = Instant::now();
        info!(file = %file_name, "Processing {}", path.display());

        if let Err(e) = check_pdf_magic(path) {
            return self.file_failed(path, file_name, None, e);
        }

        let mut file = FileRun {
            document_key: document_key(&self.config.pdf_root, path),
            file_name,
            stats: FileStats::default(),
            records: Vec::new(),
            stitcher: OverlapStitcher::new(self.config.overlap_size),
            opened: false,
        };

        let (tx, mut rx) = mpsc::channel(PAGE_CHANNEL_CAPACITY);
        let reader = self.spawn_reader(path, tx);

        while let Some(event) = rx.recv().await {
            match event {
                ReaderEvent::Opened { page_count } => {
                    file.opened = true;
                    file.stats.total_pages = page_count;
                    info!(file = %file.file_name, "Opened: {} pages", page_count);
                    self.progress.on_file_start(&file.file_name, page_count);
                }
                ReaderEvent::Page(snapshot) => {
                    if self.config.is_cancelled() {
                        warn!(file = %file.file_name, "Cancelled; remaining pages not processed");
                        break;
                    }
                    self.process_page(&mut file, snapshot).await;
                }
            }
        }
        // Dropping the receiver stops the reader at its next send.
        drop(rx);

        let reader_result = match reader.await {
            Ok(result) => result,
            Err(e) => Err(FileError::Reader {
                path: path.to_path_buf(),
                detail: e.to_string(),
            }),
        };
        let mut error = None;
        if let Err(e) = reader_result {
            if !file.opened {
                return self.file_failed(path, file.file_name, None, e);
            }
            // Pages assembled before the reader died are still stored.
            error!(file = %file.file_name, "{}", e);
            error = Some(e.to_string());
        }

        if !file.records.is_empty() {
            match self.writer.write_batch(&file.records).await {
                Ok(written) => file.stats.documents_written = written,
                Err(e) => {
                    let e = FileError::Write(e);
                    error!(file = %file.file_name, "{}", e);
                    error = Some(match error {
                        Some(reader) => format!("{reader}; {e}"),
                        None => e.to_string(),
                    });
                }
            }
        }
        file.stats.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            file = %file.file_name,
            "Done: {}/{} pages stored, {} skipped, {} failed, {} degraded in {}ms",
            file.stats.processed_pages,
            file.stats.total_pages,
            file.stats.skipped_pages,
            file.stats.failed_pages,
            file.stats.degraded_pages,
            file.stats.duration_ms
        );
        self.progress.on_file_complete(
            &file.file_name,
            file.stats.documents_written,
            error.as_deref(),
        );

        FileReport {
            file_name: file.file_name,
            path: path.to_path_buf(),
            stats: Some(file.stats),
            error,
        }
    }

    fn spawn_reader(
        &self,
        path: &Path,
        tx: mpsc::Sender<ReaderEvent>,
    ) -> tokio::task::JoinHandle<Result<(), FileError>> {
        let backend = Arc::clone(&self.backend);
        let classifier = self.classifier.clone();
        let cancel = Arc::clone(&self.config.cancel_flag);
        let settings = SnapshotSettings {
            render_zoom: self.config.render_zoom,
            min_image_size: self.config.min_image_size,
        };
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || {
            backend.with_document(&path, &mut |doc: &dyn DocumentPages| {
                let page_count = doc.page_count();
                if tx.blocking_send(ReaderEvent::Opened { page_count }).is_err() {
                    return;
                }
                for index in 0..page_count {
                    if cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    let snapshot = snapshot_page(doc, index, &classifier, settings);
                    if tx.blocking_send(ReaderEvent::Page(snapshot)).is_err() {
                        break;
                    }
                }
            })
        })
    }

    async fn process_page(&self, file: &mut FileRun, snapshot: Result<PageSnapshot, PageError>) {
        let total = file.stats.total_pages;
        let mut snapshot = match snapshot {
            Ok(s) => s,
            Err(e) => {
                file.stitcher.reset();
                self.page_failed(file, e);
                return;
            }
        };

        let page = snapshot.page_number;
        let mode = snapshot.mode;
        file.stats.count_mode(mode);
        file.stats.images_discarded += snapshot.images_discarded;

        let raw_text = std::mem::take(&mut snapshot.raw_text);
        let overlap_prefix = file.stitcher.prefix().to_string();
        file.stitcher.advance(&raw_text);

        let settings = ResolveSettings {
            max_tokens: Some(self.config.vision_max_tokens),
            image_concurrency: self.config.image_concurrency,
        };
        let (body, usage) = resolve_page(snapshot, self.interpreter.as_ref(), settings).await;

        file.stats.interpreter_calls += usage.interpreter_calls;
        file.stats.input_tokens += usage.input_tokens;
        file.stats.output_tokens += usage.output_tokens;
        file.stats.images_analyzed += usage.images_analyzed;
        file.stats.image_failures += usage.image_failures;

        let body = match body {
            Ok(b) => b,
            Err(e) => {
                self.page_failed(file, e);
                return;
            }
        };

        let text = PageText {
            source: &file.file_name,
            document_key: &file.document_key,
            page_number: page,
            raw_text: &raw_text,
            overlap_prefix: &overlap_prefix,
        };
        match assemble(text, body, self.config.min_content_length) {
            Assembled::Record(record) => {
                info!(
                    file = %file.file_name,
                    page,
                    %mode,
                    bytes = record.content().len(),
                    "Page assembled"
                );
                file.stats.processed_pages += 1;
                if usage.degraded {
                    file.stats.degraded_pages += 1;
                }
                file.records.push(record);
                self.progress
                    .on_page_complete(&file.file_name, page, total, mode);
            }
            Assembled::Skipped { content_length } => {
                info!(
                    file = %file.file_name,
                    page,
                    %mode,
                    "Skipped: content too short ({} < {} chars)",
                    content_length,
                    self.config.min_content_length
                );
                file.stats.skipped_pages += 1;
                self.progress.on_page_skipped(&file.file_name, page, total);
            }
        }
    }

    fn page_failed(&self, file: &mut FileRun, e: PageError) {
        warn!(file = %file.file_name, "{}", e);
        file.stats.failed_pages += 1;
        self.progress.on_page_error(
            &file.file_name,
            e.page(),
            file.stats.total_pages,
            &e.to_string(),
        );
    }

    fn file_failed(
        &self,
        path: &Path,
        file_name: String,
        stats: Option<FileStats>,
        e: FileError,
    ) -> FileReport {
        error!(file = %file_name, "{}", e);
        let message = e.to_string();
        self.progress.on_file_complete(&file_name, 0, Some(&message));
        FileReport {
            file_name,
            path: path.to_path_buf(),
            stats,
            error: Some(message),
        }
    }
}
