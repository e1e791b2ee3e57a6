//! Record Assembler: the single place a [`PageRecord`] is built.
//!
//! Content order is fixed:
//!
//! 1. overlap prefix with its continuation marker
//! 2. primary content (native text, or the full-page description for VISION_FULL)
//! 3. `[DIAGRAM ANALYSIS]` section for HYBRID pages with a diagram description
//! 4. `[EMBEDDED IMAGES]` section, one tagged entry per described image

use crate::output::{PageBody, PageRecord};
use crate::pipeline::overlap::marked_prefix;

pub const DIAGRAM_HEADER: &str = "[DIAGRAM ANALYSIS]";
pub const IMAGES_HEADER: &str = "[EMBEDDED IMAGES]";

/// Result of assembling one page.
#[derive(Debug, Clone)]
pub enum Assembled {
    Record(PageRecord),
    /// Trimmed content was shorter than the minimum; nothing is stored.
    Skipped { content_length: usize },
}

/// Inputs that identify a page and its text.
#[derive(Debug, Clone, Copy)]
pub struct PageText<'a> {
    /// File name, stored as `source`.
    pub source: &'a str,
    /// Path relative to the PDF root, used for the record's identity.
    pub document_key: &'a str,
    pub page_number: usize,
    pub raw_text: &'a str,
    pub overlap_prefix: &'a str,
}

/// Build the final content string for a page.
pub fn assemble_content(text: &PageText<'_>, body: &PageBody) -> String {
    let mut content = marked_prefix(text.overlap_prefix);

    match body {
        PageBody::VisionFull { page_description } => content.push_str(page_description),
        _ => content.push_str(text.raw_text),
    }

    if let PageBody::Hybrid {
        diagram: Some(diagram),
    } = body
    {
        content.push_str("\n\n");
        content.push_str(DIAGRAM_HEADER);
        content.push('\n');
        content.push_str(diagram);
    }

    if let PageBody::TextWithImages { images } = body {
        if !images.is_empty() {
            let entries: Vec<String> = images
                .iter()
                .map(|img| {
                    format!(
                        "[IMAGE {} - Page {}]: {}",
                        img.ordinal, text.page_number, img.text
                    )
                })
                .collect();
            content.push_str("\n\n");
            content.push_str(IMAGES_HEADER);
            content.push('\n');
            content.push_str(&entries.join("\n\n"));
        }
    }

    content
}

/// Assemble a page, dropping it when the trimmed content is too short.
pub fn assemble(text: PageText<'_>, body: PageBody, min_content_length: usize) -> Assembled {
    let content = assemble_content(&text, &body);
    let content_length = content.trim().chars().count();
    if content_length < min_content_length {
        return Assembled::Skipped { content_length };
    }

    Assembled::Record(PageRecord::new(
        text.source.to_string(),
        text.document_key.to_string(),
        text.page_number,
        text.raw_text.to_string(),
        text.overlap_prefix.to_string(),
        body,
        content,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{ImageDescription, ProcessingMode};

    fn text<'a>(raw: &'a str, prefix: &'a str) -> PageText<'a> {
        PageText {
            source: "hand.pdf",
            document_key: "palmistry/hand.pdf",
            page_number: 7,
            raw_text: raw,
            overlap_prefix: prefix,
        }
    }

    #[test]
    fn text_only_is_prefix_plus_raw_text() {
        let raw = "The line of life encircles the ball of the thumb.";
        let content = assemble_content(&text(raw, "previous tail"), &PageBody::TextOnly);
        assert_eq!(content, format!("{}{}", marked_prefix("previous tail"), raw));

        let content = assemble_content(&text(raw, ""), &PageBody::TextOnly);
        assert_eq!(content, raw);
    }

    #[test]
    fn vision_full_replaces_native_text() {
        let body = PageBody::VisionFull {
            page_description: "OCR of the scanned page".into(),
        };
        let content = assemble_content(&text("x1 ~~", ""), &body);
        assert_eq!(content, "OCR of the scanned page");
    }

    #[test]
    fn hybrid_appends_diagram_section() {
        let body = PageBody::Hybrid {
            diagram: Some("Hand outline with labelled mounts.".into()),
        };
        let content = assemble_content(&text("Figure 2 shows the mounts.", "tail"), &body);
        let expected = format!(
            "{}Figure 2 shows the mounts.\n\n[DIAGRAM ANALYSIS]\nHand outline with labelled mounts.",
            marked_prefix("tail")
        );
        assert_eq!(content, expected);

        let content = assemble_content(
            &text("Figure 2 shows the mounts.", ""),
            &PageBody::Hybrid { diagram: None },
        );
        assert_eq!(content, "Figure 2 shows the mounts.");
    }

    #[test]
    fn embedded_images_are_tagged_with_ordinal_and_page() {
        let body = PageBody::TextWithImages {
            images: vec![
                ImageDescription {
                    ordinal: 1,
                    text: "A square palm.".into(),
                },
                ImageDescription {
                    ordinal: 3,
                    text: "A conic palm.".into(),
                },
            ],
        };
        let content = assemble_content(&text("Hand shapes.", ""), &body);
        assert_eq!(
            content,
            "Hand shapes.\n\n[EMBEDDED IMAGES]\n\
             [IMAGE 1 - Page 7]: A square palm.\n\n\
             [IMAGE 3 - Page 7]: A conic palm."
        );
    }

    #[test]
    fn short_content_is_skipped_not_recorded() {
        match assemble(text("thirty characters of text....", ""), PageBody::TextOnly, 50) {
            Assembled::Skipped { content_length } => assert_eq!(content_length, 29),
            Assembled::Record(_) => panic!("expected skip"),
        }
    }

    #[test]
    fn record_keeps_inputs() {
        let raw = "a".repeat(60);
        match assemble(text(&raw, "zz"), PageBody::TextOnly, 50) {
            Assembled::Record(r) => {
                assert_eq!(r.source(), "hand.pdf");
                assert_eq!(r.page_number(), 7);
                assert_eq!(r.raw_text(), raw);
                assert_eq!(r.overlap_prefix(), "zz");
                assert_eq!(r.processing_mode(), ProcessingMode::TextOnly);
                assert!(r.metadata().has_overlap);
            }
            Assembled::Skipped { .. } => panic!("expected record"),
        }
    }
}
