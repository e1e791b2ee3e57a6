//! Page Renderer: rasterise a page at a fixed zoom factor.
//!
//! Zoom is a linear scale of the page's point size (1.0 = 72 DPI), not a
//! pixel cap: the same page always yields the same bitmap for the same
//! configuration, which keeps re-runs byte-identical.

use crate::error::PageError;
use crate::pipeline::encode;
use crate::pipeline::pdf::{BackendResult, DocumentPages};
use pdfium_render::prelude::*;
use tracing::debug;

/// Render one page (0-based `index`) to PNG bytes.
pub fn render_page(doc: &dyn DocumentPages, index: usize, zoom: f32) -> Result<Vec<u8>, PageError> {
    let png = doc.render_page(index, zoom).map_err(|detail| PageError::Render {
        page: index + 1,
        detail,
    })?;
    debug!(page = index + 1, bytes = png.len(), "Rendered page at {zoom}x");
    Ok(png)
}

/// pdfium implementation of a page render.
pub(crate) fn rasterise(page: &PdfPage<'_>, zoom: f32) -> BackendResult<Vec<u8>> {
    let config = PdfRenderConfig::new().scale_page_by_factor(zoom);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| format!("{:?}", e))?;

    let image = bitmap.as_image();
    debug!("Rasterised → {}x{} px", image.width(), image.height());

    encode::encode_png(&image).map_err(|e| format!("PNG encode failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pages;

    impl DocumentPages for Pages {
        fn page_count(&self) -> usize {
            2
        }

        fn page_text(&self, _: usize) -> BackendResult<String> {
            Ok(String::new())
        }

        fn render_page(&self, index: usize, _: f32) -> BackendResult<Vec<u8>> {
            if index == 0 {
                Ok(vec![0x89, b'P', b'N', b'G'])
            } else {
                Err("bitmap allocation failed".into())
            }
        }

        fn embedded_images(&self, _: usize) -> BackendResult<Vec<BackendResult<Vec<u8>>>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn render_error_carries_one_based_page() {
        assert!(render_page(&Pages, 0, 2.0).is_ok());
        match render_page(&Pages, 1, 2.0) {
            Err(PageError::Render { page, detail }) => {
                assert_eq!(page, 2);
                assert!(detail.contains("bitmap"));
            }
            other => panic!("expected render error, got {other:?}"),
        }
    }
}
