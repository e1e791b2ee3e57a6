//! Progress-callback trait for per-file and per-page ingestion events.
//!
//! Inject an [`Arc<dyn IngestProgressCallback>`] via
//! [`crate::config::IngestConfigBuilder::progress_callback`] to observe a run
//! as it happens. Pages are processed strictly in order, so events for one
//! file always arrive in page order.
//!
//! # Example
//!
//! ```rust
//! use palmbook_ingest::{IngestConfig, IngestProgressCallback, ProcessingMode};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl IngestProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, _file: &str, page: usize, total: usize, mode: ProcessingMode) {
//!         self.written.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page}/{total} → {mode}");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { written: AtomicUsize::new(0) });
//! let config = IngestConfig::builder()
//!     .progress_callback(cb as Arc<dyn IngestProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ProcessingMode;
use std::sync::Arc;

/// Called by the batch driver as it works through files and pages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait IngestProgressCallback: Send + Sync {
    /// Called once after discovery, before any file is opened.
    fn on_run_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called after a file was opened and its page count is known.
    fn on_file_start(&self, file: &str, total_pages: usize) {
        let _ = (file, total_pages);
    }

    /// Called when a page produced a record.
    fn on_page_complete(&self, file: &str, page: usize, total_pages: usize, mode: ProcessingMode) {
        let _ = (file, page, total_pages, mode);
    }

    /// Called when a page's content was too short to store.
    fn on_page_skipped(&self, file: &str, page: usize, total_pages: usize) {
        let _ = (file, page, total_pages);
    }

    /// Called when a page failed.
    fn on_page_error(&self, file: &str, page: usize, total_pages: usize, error: &str) {
        let _ = (file, page, total_pages, error);
    }

    /// Called once per file, after its batch write (or its open failure).
    ///
    /// `error` is `Some` when the file could not be opened or written.
    fn on_file_complete(&self, file: &str, documents_written: usize, error: Option<&str>) {
        let _ = (file, documents_written, error);
    }

    /// Called once after the last file.
    fn on_run_complete(&self, files: usize, documents_written: usize) {
        let _ = (files, documents_written);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl IngestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IngestConfig`].
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        completes: AtomicUsize,
        skips: AtomicUsize,
        errors: AtomicUsize,
        files: AtomicUsize,
    }

    impl IngestProgressCallback for TrackingCallback {
        fn on_page_complete(&self, _: &str, _: usize, _: usize, _: ProcessingMode) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_skipped(&self, _: &str, _: usize, _: usize) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _: &str, _: usize, _: usize, _: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_complete(&self, _: &str, _: usize, _: Option<&str>) {
            self.files.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(2);
        cb.on_file_start("a.pdf", 5);
        cb.on_page_complete("a.pdf", 1, 5, ProcessingMode::TextOnly);
        cb.on_page_skipped("a.pdf", 2, 5);
        cb.on_page_error("a.pdf", 3, 5, "render failed");
        cb.on_file_complete("a.pdf", 1, None);
        cb.on_run_complete(2, 1);
    }

    #[test]
    fn tracking_callback_through_arc_dyn() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: ProgressCallback = tracker.clone();

        cb.on_page_complete("a.pdf", 1, 3, ProcessingMode::Hybrid);
        cb.on_page_skipped("a.pdf", 2, 3);
        cb.on_page_error("a.pdf", 3, 3, "timeout");
        cb.on_file_complete("a.pdf", 1, None);

        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.skips.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.files.load(Ordering::SeqCst), 1);
    }
}
