//! Per-page processing, split at the thread boundary.
//!
//! [`snapshot_page`] runs on the pdfium thread and does everything that needs
//! the open document: text extraction, the text gates, rasterisation or
//! embedded-image extraction. [`resolve_page`] runs on the async side and
//! performs the interpreter calls the snapshot asks for.

use crate::error::PageError;
use crate::interpreter::{ImageInterpreter, Instruction, InterpretRequest, Interpretation};
use crate::output::{ImageDescription, PageBody, ProcessingMode};
use crate::pipeline::classify::Classifier;
use crate::pipeline::extract::{self, EmbeddedImage};
use crate::pipeline::pdf::DocumentPages;
use crate::pipeline::render;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

/// Visual material captured for a page.
#[derive(Debug)]
pub enum PageVisual {
    None,
    /// A HYBRID or VISION_FULL page raster (or why it could not be made).
    Rendered(Result<Vec<u8>, PageError>),
    /// Size-filtered embedded images of a TEXT_WITH_IMAGES page.
    Embedded(Vec<EmbeddedImage>),
}

/// Everything read from the document for one classified page.
#[derive(Debug)]
pub struct PageSnapshot {
    /// 1-based.
    pub page_number: usize,
    /// Native text, trimmed.
    pub raw_text: String,
    pub mode: ProcessingMode,
    pub visual: PageVisual,
    pub images_discarded: usize,
    pub image_failures: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SnapshotSettings {
    pub render_zoom: f32,
    pub min_image_size: usize,
}

/// Read and classify one page (0-based `index`).
///
/// Fails only when the text layer cannot be read.
pub fn snapshot_page(
    doc: &dyn DocumentPages,
    index: usize,
    classifier: &Classifier,
    settings: SnapshotSettings,
) -> Result<PageSnapshot, PageError> {
    // Trimmed once, so the gates, the overlap tail and the content agree.
    let raw_text = extract::extract_text(doc, index)?.trim().to_string();

    let (mode, visual, discarded, failed) = match classifier.text_gate(&raw_text) {
        Some(mode) => {
            let raster = render::render_page(doc, index, settings.render_zoom);
            (mode, PageVisual::Rendered(raster), 0, 0)
        }
        None => {
            let images = extract::extract_images(doc, index, settings.min_image_size);
            let mode = classifier.classify(&raw_text, images.retained.len());
            let visual = if images.retained.is_empty() {
                PageVisual::None
            } else {
                PageVisual::Embedded(images.retained)
            };
            (mode, visual, images.discarded, images.failed)
        }
    };

    debug!(
        page = index + 1,
        %mode,
        text_chars = Classifier::text_length(&raw_text),
        "Page classified"
    );

    Ok(PageSnapshot {
        page_number: index + 1,
        raw_text,
        mode,
        visual,
        images_discarded: discarded,
        image_failures: failed,
    })
}

/// Interpreter accounting for one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageUsage {
    pub interpreter_calls: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Embedded images the interpreter answered for.
    pub images_analyzed: usize,
    pub image_failures: usize,
    /// Part of the page's vision contribution was lost to a failure.
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolveSettings {
    pub max_tokens: Option<usize>,
    /// Embedded-image interpretations in flight at once (at least 1).
    pub image_concurrency: usize,
}

/// Turn a snapshot into a [`PageBody`], calling the interpreter as needed.
///
/// `Err` means the page failed; other failures degrade the page instead.
pub async fn resolve_page(
    snapshot: PageSnapshot,
    interpreter: &dyn ImageInterpreter,
    settings: ResolveSettings,
) -> (Result<PageBody, PageError>, PageUsage) {
    let page = snapshot.page_number;
    let mut usage = PageUsage {
        image_failures: snapshot.image_failures,
        degraded: snapshot.image_failures > 0,
        ..Default::default()
    };

    let body = match (snapshot.mode, snapshot.visual) {
        (ProcessingMode::VisionFull, PageVisual::Rendered(raster)) => {
            let png = match raster {
                Ok(png) => png,
                Err(e) => return (Err(e), usage),
            };
            match interpret(interpreter, &png, Instruction::FullPage, settings, &mut usage).await {
                Ok(Interpretation::Description(page_description)) => {
                    Ok(PageBody::VisionFull { page_description })
                }
                // Nothing readable on the scan; the assembler will skip it.
                Ok(Interpretation::NoContent) => Ok(PageBody::VisionFull {
                    page_description: String::new(),
                }),
                Err(e) => Err(PageError::Interpreter {
                    page,
                    detail: e.to_string(),
                }),
            }
        }

        (ProcessingMode::Hybrid, PageVisual::Rendered(raster)) => {
            let diagram = match raster {
                Ok(png) => {
                    match interpret(interpreter, &png, Instruction::DiagramOnly, settings, &mut usage)
                        .await
                    {
                        Ok(found) => found.into_description(),
                        Err(e) => {
                            warn!(page, "Diagram interpretation failed, keeping text only: {}", e);
                            usage.degraded = true;
                            None
                        }
                    }
                }
                Err(e) => {
                    warn!(page, "{}; keeping text only", e);
                    usage.degraded = true;
                    None
                }
            };
            Ok(PageBody::Hybrid { diagram })
        }

        (ProcessingMode::TextWithImages, PageVisual::Embedded(images)) => {
            let images = describe_images(interpreter, images, page, settings, &mut usage).await;
            Ok(PageBody::TextWithImages { images })
        }

        (ProcessingMode::TextOnly, _) => Ok(PageBody::TextOnly),

        (mode, _) => {
            // snapshot_page pairs every mode with its visual; reaching here is a bug.
            warn!(page, %mode, "Page snapshot has no matching visual; keeping text only");
            usage.degraded = true;
            Ok(PageBody::TextOnly)
        }
    };

    (body, usage)
}

async fn interpret(
    interpreter: &dyn ImageInterpreter,
    png: &[u8],
    instruction: Instruction,
    settings: ResolveSettings,
    usage: &mut PageUsage,
) -> Result<Interpretation, crate::error::InterpreterError> {
    usage.interpreter_calls += 1;
    let reply = interpreter
        .interpret(InterpretRequest {
            image_png: png,
            instruction,
            max_tokens: settings.max_tokens,
        })
        .await?;
    usage.input_tokens += reply.input_tokens;
    usage.output_tokens += reply.output_tokens;
    Ok(reply.interpretation)
}

/// Describe retained images; order of the result follows the ordinals.
async fn describe_images(
    interpreter: &dyn ImageInterpreter,
    images: Vec<EmbeddedImage>,
    page: usize,
    settings: ResolveSettings,
    usage: &mut PageUsage,
) -> Vec<ImageDescription> {
    let replies: Vec<_> = stream::iter(images)
        .map(|image| async move {
            let reply = interpreter
                .interpret(InterpretRequest {
                    image_png: &image.png,
                    instruction: Instruction::EmbeddedImage,
                    max_tokens: settings.max_tokens,
                })
                .await;
            (image.ordinal, reply)
        })
        .buffered(settings.image_concurrency.max(1))
        .collect()
        .await;

    let mut descriptions = Vec::with_capacity(replies.len());
    for (ordinal, reply) in replies {
        usage.interpreter_calls += 1;
        match reply {
            Ok(reply) => {
                usage.images_analyzed += 1;
                usage.input_tokens += reply.input_tokens;
                usage.output_tokens += reply.output_tokens;
                if let Interpretation::Description(text) = reply.interpretation {
                    descriptions.push(ImageDescription { ordinal, text });
                }
            }
            Err(e) => {
                warn!(page, ordinal, "Embedded image interpretation failed: {}", e);
                usage.image_failures += 1;
                usage.degraded = true;
            }
        }
    }
    descriptions
}
