//! Error types for the pdf2deck library.
//!
//! Two layers reflect two questions a caller asks after a failed run:
//!
//! * [`DeckError`] — *what* went wrong (unreadable input, a page that would not
//!   rasterise, an unusable model response, a deck that could not be written).
//!   Every variant maps onto one of the coarse [`ErrorKind`]s via
//!   [`DeckError::kind`].
//!
//! * [`PipelineError`] — *where* it went wrong: the [`Stage`] that was running
//!   when the error surfaced, wrapped around the original [`DeckError`].
//!   Returned by [`crate::controller::DeckPipeline::run`].
//!
//! Missing or malformed per-page model output is never an error here; the
//! reconciliation stage masks it with fallback content.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2deck library.
#[derive(Debug, Error)]
pub enum DeckError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input was read but is not a PDF (wrong extension, MIME type or magic bytes).
    #[error("'{name}' is not a PDF: {reason}")]
    NotAPdf { name: String, reason: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The PDF engine could not parse the document at all.
    #[error("Failed to load PDF '{name}': {detail}")]
    LoadFailed { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// The document parsed but contains no pages.
    #[error("PDF '{name}' contains no pages")]
    EmptyDocument { name: String },

    /// A specific page failed to rasterise (0-based index in `page`).
    #[error("Rasterisation failed for page {}: {detail}", page + 1)]
    RenderFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use a specific copy,\n\
or install libpdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── AI errors ─────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model API call itself failed.
    #[error("LLM API error: {message}")]
    AiRequestFailed { message: String },

    /// The model API call did not answer in time.
    #[error("LLM call timed out after {secs}s")]
    AiTimeout { secs: u64 },

    /// The model answered with nothing usable.
    #[error("The model returned an empty response")]
    AiEmptyResponse,

    /// The model answered, but not with the expected JSON object.
    #[error("The model response is not valid analysis JSON: {detail}")]
    AiMalformedResponse { detail: String },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// There is nothing to export.
    #[error("Cannot build a presentation without slides")]
    NoSlides,

    /// Not a single slide image could be embedded.
    #[error("None of the {total} page images could be embedded in the presentation")]
    ImageBindingFailed { total: usize },

    /// The presentation package could not be built.
    #[error("Failed to build presentation package: {0}")]
    PackageFailed(String),

    /// Could not create or write the output presentation file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Controller errors ─────────────────────────────────────────────────
    /// An operation was requested in a pipeline state that does not allow it.
    #[error("Cannot {action} while the pipeline is {state}")]
    InvalidState { action: &'static str, state: String },

    /// A review edit referenced a page that does not exist or would blank a field.
    #[error("Invalid slide edit: {0}")]
    InvalidEdit(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of [`DeckError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// Unreadable or non-PDF input.
    Load,
    /// A page failed to rasterise, or the rasteriser is unavailable.
    Render,
    /// The AI call failed or returned empty / non-parseable output.
    AiResponse,
    /// No exportable slides, or the output file could not be written.
    Assembly,
    /// An operation was invoked in the wrong pipeline state.
    State,
    /// Invalid configuration.
    Config,
    /// Anything else.
    Internal,
}

impl DeckError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeckError::FileNotFound { .. }
            | DeckError::PermissionDenied { .. }
            | DeckError::InvalidInput { .. }
            | DeckError::DownloadFailed { .. }
            | DeckError::DownloadTimeout { .. }
            | DeckError::NotAPdf { .. }
            | DeckError::LoadFailed { .. }
            | DeckError::PasswordRequired { .. }
            | DeckError::WrongPassword { .. }
            | DeckError::EmptyDocument { .. } => ErrorKind::Load,

            DeckError::RenderFailed { .. } | DeckError::PdfiumBindingFailed(_) => {
                ErrorKind::Render
            }

            DeckError::ProviderNotConfigured { .. }
            | DeckError::AiRequestFailed { .. }
            | DeckError::AiTimeout { .. }
            | DeckError::AiEmptyResponse
            | DeckError::AiMalformedResponse { .. } => ErrorKind::AiResponse,

            DeckError::NoSlides
            | DeckError::ImageBindingFailed { .. }
            | DeckError::PackageFailed(_)
            | DeckError::OutputWriteFailed { .. } => ErrorKind::Assembly,

            DeckError::InvalidState { .. } | DeckError::InvalidEdit(_) => ErrorKind::State,
            DeckError::InvalidConfig(_) => ErrorKind::Config,
            DeckError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<zip::result::ZipError> for DeckError {
    fn from(e: zip::result::ZipError) -> Self {
        DeckError::PackageFailed(e.to_string())
    }
}

/// A pipeline stage, used to attribute failures and progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    /// Resolving and type-checking the input.
    Loading,
    Rendering,
    Analyzing,
    Reconciling,
    Assembling,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loading => "loading",
            Stage::Rendering => "rendering",
            Stage::Analyzing => "analyzing",
            Stage::Reconciling => "reconciling",
            Stage::Assembling => "assembling",
        };
        f.write_str(name)
    }
}

/// A [`DeckError`] tagged with the stage that produced it.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub error: DeckError,
}

impl PipelineError {
    pub fn new(stage: Stage, error: DeckError) -> Self {
        Self { stage, error }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}
