//! Configuration types for an ingestion run.
//!
//! All behaviour is controlled through [`IngestConfig`], built either via
//! [`IngestConfigBuilder`] or from environment-style key/value pairs with
//! [`IngestConfig::from_env`]. The same recognised keys work in a `.env`
//! file, the process environment, or a test-supplied lookup closure.

use crate::error::IngestError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Keywords that suggest a text page also carries an illustration.
///
/// English and Turkish terms; matching is case-insensitive substring search,
/// so "Fig" also catches "Figure 12".
pub const DEFAULT_DIAGRAM_KEYWORDS: &[&str] = &[
    "Fig", "Figure", "Plate", "Diagram", "See illustration", "Mount", "Line", "drawing",
    "sketch", "chart", "image", "Şekil", "Çizim", "Resim", "Diyagram", "Tablo", "Çizgi",
    "Tepe", "şekilde", "görüldüğü", "bakınız",
];

/// Configuration for an ingestion run.
///
/// # Example
/// ```rust
/// use palmbook_ingest::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .pdf_root("books")
///     .overlap_size(300)
///     .qdrant_url("http://localhost:6334")
///     .build()
///     .unwrap();
/// assert_eq!(config.overlap_size, 300);
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// Root directory scanned recursively for `*.pdf`. Default: `pdf_storage`.
    pub pdf_root: PathBuf,

    /// Pages whose trimmed native text is shorter than this (in characters)
    /// are treated as scans and fully rasterised. Default: 500.
    pub min_text_length: usize,

    /// Characters of the previous page's native text carried forward. 0 disables. Default: 500.
    pub overlap_size: usize,

    /// Embedded images whose PNG encoding is smaller than this many bytes are
    /// discarded as logos or ornaments. Default: 3000.
    ///
    /// This is a size heuristic, not diagram detection: small diagrams are
    /// lost and large decorations pass.
    pub min_image_size: usize,

    /// Assembled records shorter than this (trimmed, in characters) are skipped. Default: 50.
    pub min_content_length: usize,

    /// Linear scale applied when rasterising a page. Default: 2.0.
    pub render_zoom: f32,

    /// Diagram-indicating keywords for the HYBRID gate.
    pub diagram_keywords: Vec<String>,

    /// Vision provider name (e.g. "openai"). If None, auto-detected from the environment.
    pub vision_provider: Option<String>,

    /// Vision model identifier. Default: "gpt-4o".
    pub vision_model: String,

    /// Max-length hint (tokens) passed with every interpreter request. Default: 3000.
    pub vision_max_tokens: usize,

    /// Sampling temperature for the interpreter. Default: 0.1.
    pub vision_temperature: f32,

    /// Retries on a failed interpreter call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-interpreter-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Embedded-image interpretations in flight per page. Default: 1.
    pub image_concurrency: usize,

    /// Qdrant endpoint, e.g. `http://localhost:6334`. Required.
    pub qdrant_url: Option<String>,

    /// Qdrant API key, if the cluster requires one.
    pub qdrant_api_key: Option<String>,

    /// Target collection. Default: "palmistry_knowledge".
    pub collection_name: String,

    /// Texts per embedding request. Default: 64.
    pub embed_batch_size: usize,

    /// When set, the aggregated report is rewritten here after every file.
    pub stats_path: Option<PathBuf>,

    /// Checked between pages; set it to stop the run cooperatively.
    pub cancel_flag: Arc<AtomicBool>,

    /// Optional progress event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            pdf_root: PathBuf::from("pdf_storage"),
            min_text_length: 500,
            overlap_size: 500,
            min_image_size: 3000,
            min_content_length: 50,
            render_zoom: 2.0,
            diagram_keywords: DEFAULT_DIAGRAM_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            vision_provider: None,
            vision_model: "gpt-4o".to_string(),
            vision_max_tokens: 3000,
            vision_temperature: 0.1,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            image_concurrency: 1,
            qdrant_url: None,
            qdrant_api_key: None,
            collection_name: "palmistry_knowledge".to_string(),
            embed_batch_size: 64,
            stats_path: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("pdf_root", &self.pdf_root)
            .field("min_text_length", &self.min_text_length)
            .field("overlap_size", &self.overlap_size)
            .field("min_image_size", &self.min_image_size)
            .field("min_content_length", &self.min_content_length)
            .field("render_zoom", &self.render_zoom)
            .field("diagram_keywords", &self.diagram_keywords.len())
            .field("vision_provider", &self.vision_provider)
            .field("vision_model", &self.vision_model)
            .field("vision_max_tokens", &self.vision_max_tokens)
            .field("max_retries", &self.max_retries)
            .field("image_concurrency", &self.image_concurrency)
            .field("qdrant_url", &self.qdrant_url)
            .field("qdrant_api_key", &self.qdrant_api_key.as_ref().map(|_| "<redacted>"))
            .field("collection_name", &self.collection_name)
            .field("stats_path", &self.stats_path)
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read the recognised keys from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self, IngestError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the recognised keys through an arbitrary lookup.
    ///
    /// Unset or empty keys keep their defaults; a present but unparseable
    /// value is an [`IngestError::InvalidConfig`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IngestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut b = Self::builder();

        if let Some(v) = get("PDF_FOLDER") {
            b = b.pdf_root(v);
        }
        if let Some(v) = parse_key::<usize>(&get, "MIN_TEXT_LENGTH")? {
            b = b.min_text_length(v);
        }
        if let Some(v) = parse_key::<usize>(&get, "OVERLAP_SIZE")? {
            b = b.overlap_size(v);
        }
        if let Some(v) = parse_key::<usize>(&get, "MIN_IMAGE_SIZE")? {
            b = b.min_image_size(v);
        }
        if let Some(v) = parse_key::<usize>(&get, "MIN_CONTENT_LENGTH")? {
            b = b.min_content_length(v);
        }
        if let Some(v) = parse_key::<f32>(&get, "RENDER_ZOOM")? {
            b = b.render_zoom(v);
        }
        if let Some(v) = get("DIAGRAM_KEYWORDS") {
            b = b.diagram_keywords(v.split(',').map(str::trim).filter(|k| !k.is_empty()));
        }
        if let Some(v) = get("VISION_PROVIDER") {
            b = b.vision_provider(v);
        }
        if let Some(v) = get("VISION_MODEL") {
            b = b.vision_model(v);
        }
        if let Some(v) = parse_key::<usize>(&get, "VISION_MAX_TOKENS")? {
            b = b.vision_max_tokens(v);
        }
        if let Some(v) = parse_key::<f32>(&get, "VISION_TEMPERATURE")? {
            b = b.vision_temperature(v);
        }
        if let Some(v) = parse_key::<u32>(&get, "VISION_MAX_RETRIES")? {
            b = b.max_retries(v);
        }
        if let Some(v) = parse_key::<u64>(&get, "VISION_RETRY_BACKOFF_MS")? {
            b = b.retry_backoff_ms(v);
        }
        if let Some(v) = parse_key::<u64>(&get, "VISION_TIMEOUT_SECS")? {
            b = b.api_timeout_secs(v);
        }
        if let Some(v) = parse_key::<usize>(&get, "IMAGE_CONCURRENCY")? {
            b = b.image_concurrency(v);
        }
        if let Some(v) = get("QDRANT_URL") {
            b = b.qdrant_url(v);
        }
        if let Some(v) = get("QDRANT_API_KEY") {
            b = b.qdrant_api_key(v);
        }
        if let Some(v) = get("COLLECTION_NAME") {
            b = b.collection_name(v);
        }
        if let Some(v) = parse_key::<usize>(&get, "EMBED_BATCH_SIZE")? {
            b = b.embed_batch_size(v);
        }
        if let Some(v) = get("STATS_PATH") {
            b = b.stats_path(v);
        }

        b.build()
    }

    /// True once the cancel flag has been raised.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }
}

fn parse_key<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, IngestError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            IngestError::InvalidConfig(format!("{key}={raw:?} is not valid: {e}"))
        }),
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn pdf_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.pdf_root = root.into();
        self
    }

    pub fn min_text_length(mut self, n: usize) -> Self {
        self.config.min_text_length = n;
        self
    }

    pub fn overlap_size(mut self, n: usize) -> Self {
        self.config.overlap_size = n;
        self
    }

    pub fn min_image_size(mut self, bytes: usize) -> Self {
        self.config.min_image_size = bytes;
        self
    }

    pub fn min_content_length(mut self, n: usize) -> Self {
        self.config.min_content_length = n;
        self
    }

    /// Unclamped; out-of-range values are rejected by [`build`](Self::build).
    pub fn render_zoom(mut self, zoom: f32) -> Self {
        self.config.render_zoom = zoom;
        self
    }

    pub fn diagram_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.diagram_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn vision_provider(mut self, name: impl Into<String>) -> Self {
        self.config.vision_provider = Some(name.into());
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = model.into();
        self
    }

    pub fn vision_max_tokens(mut self, n: usize) -> Self {
        self.config.vision_max_tokens = n.max(1);
        self
    }

    pub fn vision_temperature(mut self, t: f32) -> Self {
        self.config.vision_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn image_concurrency(mut self, n: usize) -> Self {
        self.config.image_concurrency = n.max(1);
        self
    }

    pub fn qdrant_url(mut self, url: impl Into<String>) -> Self {
        self.config.qdrant_url = Some(url.into());
        self
    }

    pub fn qdrant_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.qdrant_api_key = Some(key.into());
        self
    }

    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.config.collection_name = name.into();
        self
    }

    pub fn embed_batch_size(mut self, n: usize) -> Self {
        self.config.embed_batch_size = n.max(1);
        self
    }

    pub fn stats_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.stats_path = Some(path.into());
        self
    }

    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.config.cancel_flag = flag;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if !(0.5..=6.0).contains(&c.render_zoom) {
            return Err(IngestError::InvalidConfig(format!(
                "RENDER_ZOOM must be 0.5–6.0, got {}",
                c.render_zoom
            )));
        }
        if c.collection_name.trim().is_empty() {
            return Err(IngestError::InvalidConfig(
                "collection name must not be empty".into(),
            ));
        }
        if c.vision_model.trim().is_empty() {
            return Err(IngestError::InvalidConfig(
                "vision model must not be empty".into(),
            ));
        }
        if let Some(url) = &c.qdrant_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(IngestError::InvalidConfig(format!(
                    "QDRANT_URL must be an http(s) URL, got {url:?}"
                )));
            }
        }
        Ok(self.config)
    }
}
