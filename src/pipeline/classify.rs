//! Page Classifier: choose a [`ProcessingMode`] per page.
//!
//! Gates run in fixed precedence:
//!
//! 1. text shorter than `min_text_length` → VISION_FULL
//! 2. a diagram keyword in the text       → HYBRID
//! 3. at least one retained embedded image → TEXT_WITH_IMAGES
//! 4. otherwise                            → TEXT_ONLY
//!
//! The first two gates depend on the text alone, so the pipeline asks
//! [`Classifier::text_gate`] before extracting embedded images and skips
//! extraction entirely for pages that will be rasterised anyway.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::output::ProcessingMode;
use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone)]
pub struct Classifier {
    min_text_length: usize,
    keywords: Option<Regex>,
}

impl Classifier {
    /// Compile the keyword gate. An empty keyword list disables HYBRID.
    pub fn new(min_text_length: usize, keywords: &[String]) -> Result<Self, IngestError> {
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();

        let keywords = if alternatives.is_empty() {
            None
        } else {
            let re = RegexBuilder::new(&alternatives.join("|"))
                .case_insensitive(true)
                .build()
                .map_err(|e| IngestError::InvalidConfig(format!("diagram keywords: {e}")))?;
            Some(re)
        };

        Ok(Self {
            min_text_length,
            keywords,
        })
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self, IngestError> {
        Self::new(config.min_text_length, &config.diagram_keywords)
    }

    /// Length in characters, as used by the VISION_FULL gate.
    pub fn text_length(text: &str) -> usize {
        text.trim().chars().count()
    }

    pub fn has_diagram_keywords(&self, text: &str) -> bool {
        self.keywords.as_ref().is_some_and(|re| re.is_match(text))
    }

    /// The modes decided by the text alone, or `None` if images decide.
    pub fn text_gate(&self, text: &str) -> Option<ProcessingMode> {
        if Self::text_length(text) < self.min_text_length {
            Some(ProcessingMode::VisionFull)
        } else if self.has_diagram_keywords(text) {
            Some(ProcessingMode::Hybrid)
        } else {
            None
        }
    }

    pub fn classify(&self, text: &str, retained_images: usize) -> ProcessingMode {
        self.text_gate(text).unwrap_or(if retained_images > 0 {
            ProcessingMode::TextWithImages
        } else {
            ProcessingMode::TextOnly
        })
    }
}
