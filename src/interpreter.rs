//! Image Interpreter: the vision-model boundary.
//!
//! The pipeline only depends on [`ImageInterpreter`]; [`VisionInterpreter`]
//! is the production implementation on top of an `edgequake-llm` provider.
//! Tests substitute deterministic fakes.
//!
//! ## Retry Strategy
//!
//! Transient provider failures (429, 5xx, timeouts) are retried with
//! exponential backoff (`retry_backoff_ms * 2^attempt`). Every attempt is
//! bounded by `api_timeout_secs`.

use crate::config::IngestConfig;
use crate::error::{IngestError, InterpreterError};
use crate::pipeline::encode;
use crate::prompts::{
    parse_status_line, StatusLine, DIAGRAM_ONLY_PROMPT, EMBEDDED_IMAGE_PROMPT, FULL_PAGE_PROMPT,
};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Which question is asked about an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// OCR and describe a whole scanned page.
    FullPage,
    /// Describe only the illustrations of a text page.
    DiagramOnly,
    /// Describe one embedded raster image.
    EmbeddedImage,
}

impl Instruction {
    pub fn prompt(&self) -> &'static str {
        match self {
            Instruction::FullPage => FULL_PAGE_PROMPT,
            Instruction::DiagramOnly => DIAGRAM_ONLY_PROMPT,
            Instruction::EmbeddedImage => EMBEDDED_IMAGE_PROMPT,
        }
    }

    /// Whether responses start with a `STATUS:` line.
    pub fn uses_status_line(&self) -> bool {
        matches!(self, Instruction::DiagramOnly)
    }
}

/// One interpreter request.
#[derive(Debug, Clone, Copy)]
pub struct InterpretRequest<'a> {
    /// PNG-encoded image.
    pub image_png: &'a [u8],
    pub instruction: Instruction,
    /// Upper bound on the response length, in tokens.
    pub max_tokens: Option<usize>,
}

/// A valid interpreter answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    Description(String),
    /// The interpreter looked and found nothing to describe.
    NoContent,
}

impl Interpretation {
    pub fn into_description(self) -> Option<String> {
        match self {
            Interpretation::Description(d) => Some(d),
            Interpretation::NoContent => None,
        }
    }
}

/// An answer plus its token accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterReply {
    pub interpretation: Interpretation,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Sends an image plus an instruction to a vision-capable model.
#[async_trait]
pub trait ImageInterpreter: Send + Sync {
    async fn interpret(
        &self,
        request: InterpretRequest<'_>,
    ) -> Result<InterpreterReply, InterpreterError>;
}

/// Map a raw model response onto an [`Interpretation`].
///
/// Empty responses are `NoContent` for every instruction. For
/// status-protocol instructions a `STATUS: NONE` first line is `NoContent`;
/// a missing status line keeps the whole response as the description.
pub fn interpret_response(instruction: Instruction, raw: &str) -> Interpretation {
    if raw.trim().is_empty() {
        return Interpretation::NoContent;
    }
    if !instruction.uses_status_line() {
        return Interpretation::Description(raw.trim().to_string());
    }

    match parse_status_line(raw) {
        (StatusLine::None, _) => Interpretation::NoContent,
        (StatusLine::Found, body) if body.is_empty() => Interpretation::NoContent,
        (StatusLine::Found, body) => Interpretation::Description(body.to_string()),
        (StatusLine::Missing, body) => {
            debug!("Interpreter response has no status line; keeping it as a description");
            Interpretation::Description(body.to_string())
        }
    }
}

/// [`ImageInterpreter`] backed by an `edgequake-llm` vision provider.
pub struct VisionInterpreter {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl VisionInterpreter {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &IngestConfig) -> Self {
        Self {
            provider,
            temperature: config.vision_temperature,
            max_tokens: config.vision_max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve the provider from the configuration and environment.
    ///
    /// 1. `vision_provider` set → that provider with `vision_model`
    /// 2. `OPENAI_API_KEY` present → OpenAI with `vision_model`
    /// 3. otherwise `ProviderFactory::from_env()` auto-detection
    pub fn from_config(config: &IngestConfig) -> Result<Self, IngestError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }
}

/// Backoff before retry `attempt` (1-based): `base_ms * 2^(attempt - 1)`,
/// saturating for large retry counts.
fn retry_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Build `CompletionOptions`; a per-request hint overrides the configured maximum.
fn build_options(temperature: f32, max_tokens: usize, hint: Option<usize>) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(hint.unwrap_or(max_tokens)),
        ..Default::default()
    }
}

#[async_trait]
impl ImageInterpreter for VisionInterpreter {
    async fn interpret(
        &self,
        request: InterpretRequest<'_>,
    ) -> Result<InterpreterReply, InterpreterError> {
        let image = encode::to_image_data(request.image_png);
        let messages = vec![ChatMessage::user_with_images(
            request.instruction.prompt(),
            vec![image],
        )];
        let options = build_options(self.temperature, self.max_tokens, request.max_tokens);
        let call_timeout = Duration::from_secs(self.api_timeout_secs);

        let mut last_err: Option<String> = None;
        let mut timeouts = 0u32;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = retry_delay(self.retry_backoff_ms, attempt);
                warn!(
                    "Interpreter retry {}/{} after {}ms",
                    attempt,
                    self.max_retries,
                    backoff.as_millis()
                );
                sleep(backoff).await;
            }

            match timeout(call_timeout, self.provider.chat(&messages, Some(&options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Interpreter {:?}: {} input tokens, {} output tokens",
                        request.instruction, response.prompt_tokens, response.completion_tokens
                    );
                    return Ok(InterpreterReply {
                        interpretation: interpret_response(request.instruction, &response.content),
                        input_tokens: response.prompt_tokens as u64,
                        output_tokens: response.completion_tokens as u64,
                    });
                }
                Ok(Err(e)) => {
                    let msg = e.to_string();
                    warn!("Interpreter attempt {} failed: {}", attempt + 1, msg);
                    last_err = Some(msg);
                }
                Err(_) => {
                    warn!(
                        "Interpreter attempt {} timed out after {}s",
                        attempt + 1,
                        self.api_timeout_secs
                    );
                    timeouts += 1;
                }
            }
        }

        match last_err {
            Some(detail) => Err(InterpreterError::Failed {
                retries: self.max_retries,
                detail,
            }),
            None if timeouts > 0 => Err(InterpreterError::Timeout {
                secs: self.api_timeout_secs,
            }),
            None => Err(InterpreterError::Failed {
                retries: self.max_retries,
                detail: "Unknown error".to_string(),
            }),
        }
    }
}

fn create_vision_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, IngestError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        IngestError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn resolve_provider(config: &IngestConfig) -> Result<Arc<dyn LLMProvider>, IngestError> {
    if let Some(ref name) = config.vision_provider {
        return create_vision_provider(name, &config.vision_model);
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", &config.vision_model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| IngestError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or VISION_PROVIDER.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_response_is_no_content() {
        assert_eq!(
            interpret_response(Instruction::EmbeddedImage, "  \n "),
            Interpretation::NoContent
        );
        assert_eq!(
            interpret_response(Instruction::FullPage, ""),
            Interpretation::NoContent
        );
    }

    #[test]
    fn diagram_status_none_is_no_content() {
        assert_eq!(
            interpret_response(Instruction::DiagramOnly, "STATUS: NONE"),
            Interpretation::NoContent
        );
    }

    #[test]
    fn diagram_status_found_strips_status_line() {
        assert_eq!(
            interpret_response(
                Instruction::DiagramOnly,
                "STATUS: FOUND\nFigure 4 shows a strong Mount of Venus."
            ),
            Interpretation::Description("Figure 4 shows a strong Mount of Venus.".into())
        );
    }

    #[test]
    fn full_page_keeps_status_like_text() {
        // Only the diagram instruction speaks the status protocol.
        let raw = "STATUS: NONE\nChapter II";
        assert_eq!(
            interpret_response(Instruction::FullPage, raw),
            Interpretation::Description(raw.into())
        );
    }

    #[test]
    fn missing_status_line_keeps_description() {
        let raw = "A drawing of the heart line.";
        assert_eq!(
            interpret_response(Instruction::DiagramOnly, raw),
            Interpretation::Description(raw.into())
        );
    }

    #[test]
    fn retry_delay_doubles_and_saturates() {
        assert_eq!(retry_delay(500, 1), Duration::from_millis(500));
        assert_eq!(retry_delay(500, 3), Duration::from_millis(2000));
        assert_eq!(retry_delay(500, 64), Duration::from_millis(u64::MAX));
        assert_eq!(retry_delay(500, 200), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn build_options_prefers_request_hint() {
        let config = IngestConfig::default();
        let opts = build_options(config.vision_temperature, config.vision_max_tokens, Some(1200));
        assert_eq!(opts.max_tokens, Some(1200));
        assert_eq!(opts.temperature, Some(0.1));

        let opts = build_options(config.vision_temperature, config.vision_max_tokens, None);
        assert_eq!(opts.max_tokens, Some(3000));
    }
}
