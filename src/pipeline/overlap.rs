//! Overlap Stitcher: carry the tail of the previous page's native text.
//!
//! Only native text is ever carried; descriptions produced by the
//! interpreter never enter the stitcher.

/// Marker line that introduces carried context in assembled content.
pub const CONTINUATION_MARKER: &str = "[...continued from previous page...]";

/// Per-document carried state. Create one per file.
#[derive(Debug, Clone, Default)]
pub struct OverlapStitcher {
    size: usize,
    carried: String,
}

impl OverlapStitcher {
    /// `size` is in characters; 0 disables carrying.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            carried: String::new(),
        }
    }

    /// The prefix for the page about to be assembled.
    pub fn prefix(&self) -> &str {
        &self.carried
    }

    /// Replace the carried state with the tail of `raw_text`.
    pub fn advance(&mut self, raw_text: &str) {
        self.carried = tail_chars(raw_text.trim(), self.size).to_string();
    }

    /// Forget the carried state (the page's text could not be read).
    pub fn reset(&mut self) {
        self.carried.clear();
    }
}

/// Last `n` characters of `text`, or all of it if shorter.
pub fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}

/// Render a non-empty prefix with its marker, ready to prepend.
pub fn marked_prefix(prefix: &str) -> String {
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{CONTINUATION_MARKER}\n{prefix}\n\n")
    }
}
