//! AI Analysis Client: page images in, untrusted [`RawAnalysis`] out.
//!
//! The client's whole contract is "give me the raw structure or fail". It does
//! not look at page indices or fill gaps; that belongs to
//! [`crate::pipeline::reconcile`]. What it does guarantee is that a returned
//! `RawAnalysis` came from a non-empty response that parsed as a JSON object.
//!
//! [`SlideAnalyzer`] is the seam the controller depends on, so tests and
//! alternative backends can substitute their own implementation.
//!
//! There is exactly one call per run and no automatic retry: the request
//! carries every page of the document, so a retry doubles cost and latency.

use crate::config::DeckConfig;
use crate::error::DeckError;
use crate::model::{RawAiSlide, RawAnalysis, RenderedPage, SourceDocument};
use crate::pipeline::encode;
use crate::prompts::{analysis_instruction, DEFAULT_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Everything an analyzer may look at for one document.
#[derive(Debug, Clone, Copy)]
pub struct DocumentPayload<'a> {
    /// The original PDF, for analyzers that accept documents natively.
    pub document: &'a SourceDocument,
    /// Rendered pages in ascending page order.
    pub pages: &'a [RenderedPage],
    /// Exact number of pages the response must cover.
    pub page_count: usize,
}

/// Produces an untrusted slide description for a document.
#[async_trait]
pub trait SlideAnalyzer: Send + Sync {
    async fn analyze(&self, payload: DocumentPayload<'_>) -> Result<RawAnalysis, DeckError>;
}

/// [`SlideAnalyzer`] backed by an `edgequake-llm` vision provider.
pub struct LlmSlideAnalyzer {
    provider: Arc<dyn LLMProvider>,
    system_prompt: Option<String>,
    language: Option<String>,
    temperature: f32,
    max_tokens: usize,
    api_timeout_secs: u64,
}

impl LlmSlideAnalyzer {
    /// Wrap an already-configured provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &DeckConfig) -> Self {
        Self {
            provider,
            system_prompt: config.system_prompt.clone(),
            language: config.language.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve the provider from `config` and the environment.
    pub fn from_config(config: &DeckConfig) -> Result<Self, DeckError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    fn build_messages(&self, payload: &DocumentPayload<'_>) -> Vec<ChatMessage> {
        let system_prompt = self
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);

        let images = payload
            .pages
            .iter()
            .map(|p| encode::to_image_data(&p.image))
            .collect();

        vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user_with_images(
                analysis_instruction(payload.page_count, self.language.as_deref()),
                images,
            ),
        ]
    }

    /// JSON mode on top of the sampling knobs; the prompt still spells out
    /// the shape for providers that ignore `response_format`.
    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..CompletionOptions::json_mode()
        }
    }
}

#[async_trait]
impl SlideAnalyzer for LlmSlideAnalyzer {
    async fn analyze(&self, payload: DocumentPayload<'_>) -> Result<RawAnalysis, DeckError> {
        let start = Instant::now();
        let messages = self.build_messages(&payload);
        let options = self.build_options();

        info!(
            "Requesting analysis of {} pages ({} bytes PDF)",
            payload.page_count,
            payload.document.bytes.len()
        );

        let call = self.provider.chat(&messages, Some(&options));
        let response = if self.api_timeout_secs > 0 {
            timeout(Duration::from_secs(self.api_timeout_secs), call)
                .await
                .map_err(|_| DeckError::AiTimeout {
                    secs: self.api_timeout_secs,
                })?
        } else {
            call.await
        }
        .map_err(|e| DeckError::AiRequestFailed {
            message: format!("{}", e),
        })?;

        debug!(
            "Analysis: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        parse_analysis(&response.content)
    }
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key (`OPENAI_API_KEY`, `GEMINI_API_KEY`, …).
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **OpenAI key present**: prefer OpenAI when several keys are set.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(config: &DeckConfig) -> Result<Arc<dyn LLMProvider>, DeckError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-mini");
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-mini");
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DeckError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or GEMINI_API_KEY.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, DeckError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DeckError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

// ── Response parsing ─────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

/// Parse a raw model response into a [`RawAnalysis`].
///
/// Fails when the response is empty, is JSON of another shape (an array of
/// slides, a string), or holds no JSON object at all. Inside the
/// object every field is optional: a missing title becomes empty, a
/// malformed slide entry is dropped, a non-numeric `pageIndex` becomes `None`.
pub fn parse_analysis(text: &str) -> Result<RawAnalysis, DeckError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DeckError::AiEmptyResponse);
    }

    let unfenced = match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).trim(),
        None => trimmed,
    };

    let value = match serde_json::from_str::<Value>(unfenced) {
        Ok(value) => value,
        Err(direct) => {
            let json = embedded_object(unfenced).ok_or_else(|| DeckError::AiMalformedResponse {
                detail: format!("no JSON object found ({direct})"),
            })?;
            serde_json::from_str(json).map_err(|e| DeckError::AiMalformedResponse {
                detail: e.to_string(),
            })?
        }
    };

    let obj = match value {
        Value::Object(obj) => obj,
        other => {
            return Err(DeckError::AiMalformedResponse {
                detail: format!("top-level value is {}, not an object", type_name(&other)),
            })
        }
    };

    let slides = match obj.get("slides") {
        Some(Value::Array(items)) => {
            let parsed: Vec<RawAiSlide> = items.iter().filter_map(raw_slide).collect();
            if parsed.len() < items.len() {
                warn!(
                    "Dropped {} malformed slide entries from the model response",
                    items.len() - parsed.len()
                );
            }
            parsed
        }
        Some(other) => {
            warn!("'slides' is not an array ({}); treating as empty", type_name(other));
            Vec::new()
        }
        None => {
            warn!("Model response has no 'slides' field");
            Vec::new()
        }
    };

    Ok(RawAnalysis {
        presentation_title: string_field(&obj, "presentationTitle").unwrap_or_default(),
        summary: string_field(&obj, "summary").unwrap_or_default(),
        slides,
    })
}

/// The outermost `{...}` span of a response with prose around it.
///
/// `None` when the text has no object, or when its outermost bracket pair is
/// an array: a list of slides without the envelope is not an analysis.
fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start >= end {
        return None;
    }
    let opens_array = text.find('[').is_some_and(|a| a < start);
    let closes_array = text.rfind(']').is_some_and(|a| a > end);
    if opens_array && closes_array {
        return None;
    }
    Some(&text[start..=end])
}

fn raw_slide(value: &Value) -> Option<RawAiSlide> {
    let obj = value.as_object()?;
    Some(RawAiSlide {
        page_index: obj.get("pageIndex").and_then(lenient_index),
        title: string_field(obj, "title"),
        notes: string_field(obj, "notes"),
    })
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
}

/// Accept `3`, `3.0` and `"3"`; anything else is no index at all.
fn lenient_index(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
