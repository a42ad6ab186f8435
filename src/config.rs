//! Configuration types for PDF-to-deck conversion.
//!
//! All run behaviour is controlled through [`DeckConfig`], built via its
//! [`DeckConfigBuilder`]. One struct holds every knob so a config can be
//! shared with the blocking render thread, logged, and compared between runs.

use crate::error::DeckError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default base name for the exported file when the title sanitises to nothing.
pub const DEFAULT_FILE_NAME: &str = "presentation";

/// Upper bound for [`DeckConfig::max_rendered_pixels`]; pdfium sizes are `i32`
/// and a bitmap this wide is already around a gigabyte.
pub const MAX_RENDERED_PIXELS_LIMIT: u32 = 16_384;

/// Configuration for one PDF-to-deck run.
///
/// # Example
/// ```rust
/// use pdf2deck::DeckConfig;
///
/// let config = DeckConfig::builder()
///     .render_scale(2.0)
///     .language("Japanese")
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// assert_eq!(config.render_scale, 2.0);
/// ```
#[derive(Clone)]
pub struct DeckConfig {
    /// Page render scale relative to PDF points (1.0 = 72 DPI). Range: 0.5–4.0. Default: 1.5.
    ///
    /// 1.5 keeps slide text legible on a projector while each JPEG stays small
    /// enough to send every page of a long document to the model in one request.
    pub render_scale: f32,

    /// Maximum rendered image dimension (width or height) in pixels.
    /// Range: 100–[`MAX_RENDERED_PIXELS_LIMIT`]. Default: 2000.
    ///
    /// Caps oversized pages (posters, engineering drawings) regardless of scale.
    pub max_rendered_pixels: u32,

    /// JPEG quality for page images embedded in the deck. Range: 1–100. Default: 85.
    pub jpeg_quality: u8,

    /// LLM model identifier, e.g. "gpt-4.1-mini", "gemini-2.0-flash".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `provider`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens the model may generate for the whole deck. Default: 16384.
    ///
    /// The analysis is one response covering every page, so this must leave room
    /// for a title plus a paragraph or two of notes per page.
    pub max_tokens: usize,

    /// Language the titles and speaker notes should be written in.
    /// If None, the model follows the document's own language.
    pub language: Option<String>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Maximum length (in characters) of the exported file's base name. Default: 50.
    pub file_name_max_len: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout for the single analysis call in seconds. 0 disables. Default: 300.
    pub api_timeout_secs: u64,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            render_scale: 1.5,
            max_rendered_pixels: 2000,
            jpeg_quality: 85,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.3,
            max_tokens: 16384,
            language: None,
            password: None,
            system_prompt: None,
            file_name_max_len: 50,
            download_timeout_secs: 120,
            api_timeout_secs: 300,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DeckConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeckConfig")
            .field("render_scale", &self.render_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("language", &self.language)
            .field("file_name_max_len", &self.file_name_max_len)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn DeckProgressCallback>"),
            )
            .finish()
    }
}

impl DeckConfig {
    /// Create a new builder for `DeckConfig`.
    pub fn builder() -> DeckConfigBuilder {
        DeckConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`DeckConfig`].
#[derive(Debug)]
pub struct DeckConfigBuilder {
    config: DeckConfig,
}

impl DeckConfigBuilder {
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.clamp(100, MAX_RENDERED_PIXELS_LIMIT);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = Some(language.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn file_name_max_len(mut self, n: usize) -> Self {
        self.config.file_name_max_len = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DeckConfig, DeckError> {
        let c = &self.config;
        if !c.render_scale.is_finite() || !(0.5..=4.0).contains(&c.render_scale) {
            return Err(DeckError::InvalidConfig(format!(
                "Render scale must be 0.5–4.0, got {}",
                c.render_scale
            )));
        }
        if !(100..=MAX_RENDERED_PIXELS_LIMIT).contains(&c.max_rendered_pixels) {
            return Err(DeckError::InvalidConfig(format!(
                "max_rendered_pixels must be 100–{MAX_RENDERED_PIXELS_LIMIT}, got {}",
                c.max_rendered_pixels
            )));
        }
        if c.max_tokens == 0 {
            return Err(DeckError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.file_name_max_len == 0 {
            return Err(DeckError::InvalidConfig(
                "file_name_max_len must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
