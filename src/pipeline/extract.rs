//! Text Extractor and Embedded-Image Extractor.
//!
//! The embedded-image size filter is a tunable heuristic: images whose PNG
//! encoding is smaller than `min_image_size` bytes are assumed to be logos,
//! bullets or ornaments and are never interpreted. It is lossy and gives no
//! guarantee that small diagrams survive or that large ornaments are dropped.

use crate::error::PageError;
use crate::pipeline::encode;
use crate::pipeline::pdf::{BackendResult, DocumentPages};
use pdfium_render::prelude::*;
use tracing::{debug, warn};

/// A retained embedded image, PNG-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    /// 1-based position among the page's image objects.
    pub ordinal: usize,
    pub png: Vec<u8>,
}

impl EmbeddedImage {
    pub fn byte_len(&self) -> usize {
        self.png.len()
    }
}

/// Outcome of scanning one page for embedded images.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageExtraction {
    pub retained: Vec<EmbeddedImage>,
    /// Below the size threshold.
    pub discarded: usize,
    /// Could not be decoded or re-encoded.
    pub failed: usize,
}

/// Native text of one page (0-based `index`).
pub fn extract_text(doc: &dyn DocumentPages, index: usize) -> Result<String, PageError> {
    doc.page_text(index)
        .map_err(|detail| PageError::TextExtraction {
            page: index + 1,
            detail,
        })
}

/// Extract and size-filter the embedded images of one page.
///
/// Individual image failures are logged and counted; they never fail the page.
pub fn extract_images(doc: &dyn DocumentPages, index: usize, min_image_size: usize) -> ImageExtraction {
    let page = index + 1;
    let candidates = match doc.embedded_images(index) {
        Ok(c) => c,
        Err(e) => {
            warn!(page, "Cannot list embedded images: {}", e);
            return ImageExtraction {
                failed: 1,
                ..Default::default()
            };
        }
    };

    let mut out = ImageExtraction::default();
    for (i, candidate) in candidates.into_iter().enumerate() {
        let ordinal = i + 1;
        match candidate {
            Ok(png) if png.len() < min_image_size => {
                debug!(page, ordinal, bytes = png.len(), "Discarding small embedded image");
                out.discarded += 1;
            }
            Ok(png) => out.retained.push(EmbeddedImage { ordinal, png }),
            Err(e) => {
                warn!(page, ordinal, "Skipping unreadable embedded image: {}", e);
                out.failed += 1;
            }
        }
    }
    out
}

/// pdfium implementation of text extraction.
pub(crate) fn pdfium_page_text(page: &PdfPage<'_>) -> BackendResult<String> {
    page.text()
        .map(|text| text.all())
        .map_err(|e| format!("{:?}", e))
}

/// pdfium implementation of embedded-image listing.
pub(crate) fn pdfium_page_images(page: &PdfPage<'_>) -> Vec<BackendResult<Vec<u8>>> {
    page.objects()
        .iter()
        .filter_map(|object| {
            object.as_image_object().map(|image| {
                image
                    .get_raw_image()
                    .map_err(|e| format!("{:?}", e))
                    .and_then(|raw| {
                        encode::encode_png(&raw).map_err(|e| format!("PNG encode failed: {e}"))
                    })
            })
        })
        .collect()
}
