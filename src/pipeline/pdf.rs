//! The PDF access seam.
//!
//! pdfium documents borrow from the bound library and are not `Send`, so a
//! document never leaves the thread that opened it. [`PdfBackend`] therefore
//! hands the open document to a closure instead of returning it; the batch
//! driver runs that closure on a blocking thread and streams page snapshots
//! back to the async side.
//!
//! Page indices at this layer are 0-based. Failures are plain strings; the
//! text extractor and renderer lift them into [`crate::error::PageError`]
//! with the 1-based page number.

use crate::error::{FileError, IngestError};
use crate::pipeline::{extract, render};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of a single backend operation.
pub type BackendResult<T> = Result<T, String>;

/// Read access to the pages of one open document.
pub trait DocumentPages {
    fn page_count(&self) -> usize;

    /// Native text layer of a page, possibly empty.
    fn page_text(&self, index: usize) -> BackendResult<String>;

    /// Rasterise a page at `zoom`× linear resolution, PNG-encoded.
    fn render_page(&self, index: usize, zoom: f32) -> BackendResult<Vec<u8>>;

    /// Every embedded raster image of the page, in content-stream order,
    /// each PNG-encoded or carrying its own failure.
    fn embedded_images(&self, index: usize) -> BackendResult<Vec<BackendResult<Vec<u8>>>>;
}

/// Opens PDF files.
pub trait PdfBackend: Send + Sync {
    /// Open `path` and run `f` against it. The document is closed when this
    /// returns, on every path.
    fn with_document(
        &self,
        path: &Path,
        f: &mut dyn FnMut(&dyn DocumentPages),
    ) -> Result<(), FileError>;
}

/// [`PdfBackend`] on top of pdfium, downloaded and cached by `pdfium-auto`.
pub struct PdfiumBackend {
    library: PathBuf,
}

impl PdfiumBackend {
    /// Locate (downloading on first use) and bind the pdfium library once,
    /// so a missing engine fails the run before any file is opened.
    pub fn new() -> Result<Self, IngestError> {
        let library = pdfium_auto::ensure_pdfium_library(None)
            .map_err(|e| IngestError::PdfiumBindingFailed(e.to_string()))?;
        pdfium_auto::bind_pdfium_from_path(&library)
            .map_err(|e| IngestError::PdfiumBindingFailed(e.to_string()))?;
        info!("PDFium bound from {}", library.display());
        Ok(Self { library })
    }
}

impl PdfBackend for PdfiumBackend {
    fn with_document(
        &self,
        path: &Path,
        f: &mut dyn FnMut(&dyn DocumentPages),
    ) -> Result<(), FileError> {
        let pdfium =
            pdfium_auto::bind_pdfium_from_path(&self.library).map_err(|e| FileError::Open {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| FileError::Open {
                path: path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

        let pages = PdfiumDocument { document };
        debug!("PDF loaded: {} ({} pages)", path.display(), pages.page_count());
        f(&pages);
        Ok(())
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumDocument<'a> {
    fn page(&self, index: usize) -> BackendResult<PdfPage<'a>> {
        let index = u16::try_from(index).map_err(|_| format!("page index {index} out of range"))?;
        self.document
            .pages()
            .get(index)
            .map_err(|e| format!("{:?}", e))
    }
}

impl DocumentPages for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_text(&self, index: usize) -> BackendResult<String> {
        extract::pdfium_page_text(&self.page(index)?)
    }

    fn render_page(&self, index: usize, zoom: f32) -> BackendResult<Vec<u8>> {
        render::rasterise(&self.page(index)?, zoom)
    }

    fn embedded_images(&self, index: usize) -> BackendResult<Vec<BackendResult<Vec<u8>>>> {
        Ok(extract::pdfium_page_images(&self.page(index)?))
    }
}
