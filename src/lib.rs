//! # pdf2deck
//!
//! Turn a PDF into a narrated slide deck: every page becomes a full-bleed
//! slide image, and a vision model writes a title and a speaker script for it
//! which lands in the presenter notes.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL, check it is a PDF
//!  ├─ 2. Render     rasterise every page via pdfium (spawn_blocking), JPEG-encode
//!  ├─ 3. Analyze    one vision call: page images + exact page count → JSON
//!  ├─ 4. Reconcile  untrusted JSON + trusted pages → exactly N complete slides
//!  └─ 5. Assemble   16:9 .pptx, contain-fit images, notes-only narration
//! ```
//!
//! Steps 2–4 run inside a [`DeckPipeline`], which stops in a review state so
//! titles and notes can be edited before export.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2deck::{convert, DeckConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = DeckConfig::default();
//!     let output = convert("lecture.pdf", "out", &config).await?;
//!     println!("{} ({} slides)", output.path.display(), output.page_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Reviewing before export
//!
//! ```rust,no_run
//! use pdf2deck::{pipeline::input, DeckConfig, DeckPipeline};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pipeline = DeckPipeline::from_config(DeckConfig::default())?;
//! let source = input::resolve_input("lecture.pdf", 120).await?;
//! pipeline.run(source).await?;
//! pipeline.update_slide(0, Some("Welcome"), None)?;
//! let path = pipeline.export("out")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2deck` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2deck = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod pptx;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DeckConfig, DeckConfigBuilder};
pub use controller::{
    convert, convert_from_bytes, convert_sync, inspect, DeckPipeline, PipelineState, RunFailure,
};
pub use error::{DeckError, ErrorKind, PipelineError, Stage};
pub use model::{
    AnalysisResult, ConversionOutput, DeckFile, DocumentMetadata, PageImage, RawAiSlide,
    RawAnalysis, RenderedPage, Slide, SourceDocument,
};
pub use pipeline::analyze::{DocumentPayload, LlmSlideAnalyzer, SlideAnalyzer};
pub use pipeline::render::{PageRasterizer, PdfiumRasterizer};
pub use progress::{DeckProgressCallback, NoopProgressCallback, ProgressCallback};
