//! Interpreter instructions for the three vision-dependent page modes.
//!
//! The diagram instruction uses a status-line protocol: the model's first
//! line must be `STATUS: FOUND` or `STATUS: NONE`. [`parse_status_line`]
//! reads that line so "no diagrams on this page" is a tagged answer rather
//! than a phrase searched for in free text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Instruction for a page with no usable text layer (VISION_FULL).
pub const FULL_PAGE_PROMPT: &str = r#"You are an OCR and content extraction system for palmistry books.

This page has little or no extractable text; it is most likely a scan.
Extract ALL of its content:

1. TEXT: transcribe every readable passage, keeping paragraph structure
2. DIAGRAMS: describe hand drawings, palm lines and illustrations in detail
3. LABELS: note figure numbers, letters and annotations

Write in the same language as the page.
Mark unreadable fragments as [unclear] and give your best reading."#;

/// Instruction for a text page that mentions figures (HYBRID).
pub const DIAGRAM_ONLY_PROMPT: &str = r#"You are analysing the illustrations on a palmistry book page.

The running text of this page has already been extracted. Ignore it and
describe ONLY the visual elements:

1. DIAGRAMS: hand drawings, palm diagrams, illustrations
2. LINES: which palm lines are shown (Heart, Head, Life, Fate, ...)
3. MOUNTS: mounts or regions that are highlighted
4. LABELS: figure numbers and what each figure shows

Answer format (mandatory):
- First line: exactly `STATUS: FOUND` if the page has at least one
  illustration, or exactly `STATUS: NONE` if it has none.
- After `STATUS: FOUND`, write the description on the following lines.
- After `STATUS: NONE`, write nothing else.

Be technical and precise. Write in the same language as the page."#;

/// Instruction for a single embedded raster image (TEXT_WITH_IMAGES).
pub const EMBEDDED_IMAGE_PROMPT: &str = r#"Analyse this image taken from a palmistry book.

Describe:
1. The kind of image (hand diagram, palm lines, mount illustration, ...)
2. The specific features shown (lines, mounts, fingers, markings)
3. Any labels, numbers or text visible in the image
4. What the illustration is meant to teach

Technical facts only, no interpretation or prediction."#;

/// Parsed first line of a status-protocol response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLine {
    Found,
    None,
    /// The model ignored the protocol.
    Missing,
}

static STATUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\**\s*STATUS\s*:\s*(FOUND|NONE)\s*\**\s*$").unwrap());

/// Split a response into its status line and the remaining body.
///
/// Only the first non-empty line is inspected. With [`StatusLine::Missing`]
/// the whole (trimmed) response is returned as the body.
pub fn parse_status_line(response: &str) -> (StatusLine, &str) {
    let trimmed = response.trim_start();
    let (first, rest) = match trimmed.find('\n') {
        Some(pos) => (&trimmed[..pos], &trimmed[pos + 1..]),
        None => (trimmed, ""),
    };

    match STATUS_RE.captures(first) {
        Some(caps) => {
            let status = if caps[1].eq_ignore_ascii_case("FOUND") {
                StatusLine::Found
            } else {
                StatusLine::None
            };
            (status, rest.trim())
        }
        None => (StatusLine::Missing, response.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn found_status_returns_body() {
        let (s, body) = parse_status_line("STATUS: FOUND\nA left hand with a forked head line.");
        assert_eq!(s, StatusLine::Found);
        assert_eq!(body, "A left hand with a forked head line.");
    }

    #[test]
    fn none_status_is_case_insensitive() {
        let (s, body) = parse_status_line("  status : none\n");
        assert_eq!(s, StatusLine::None);
        assert!(body.is_empty());
    }

    #[test]
    fn bold_status_line_is_accepted() {
        let (s, _) = parse_status_line("**STATUS: NONE**");
        assert_eq!(s, StatusLine::None);
    }

    #[test]
    fn status_word_inside_prose_is_not_a_status_line() {
        let text = "The figure shows STATUS: NONE of the usual marks.\nMore text.";
        let (s, body) = parse_status_line(text);
        assert_eq!(s, StatusLine::Missing);
        assert_eq!(body, text);
    }

    #[test]
    fn diagram_prompt_documents_protocol() {
        assert!(DIAGRAM_ONLY_PROMPT.contains("STATUS: FOUND"));
        assert!(DIAGRAM_ONLY_PROMPT.contains("STATUS: NONE"));
    }
}
