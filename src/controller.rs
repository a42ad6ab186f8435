//! Pipeline Controller and one-shot conversion entry points.
//!
//! [`DeckPipeline`] owns one run at a time and drives it through
//!
//! ```text
//! idle ─► rendering ─► analyzing ─► reconciling ─► reviewing ─► completed
//!             │            │             │             │
//!             └────────────┴─────────────┴─────► error ◄┘ (never from export)
//! ```
//!
//! A stage failure aborts the run, moves the pipeline to `error` and records
//! which stage failed. There is no partial-result recovery: call
//! [`DeckPipeline::run`] again. Export is only possible while reviewing, and a
//! failed export leaves the pipeline in `reviewing` so it can be retried.
//!
//! For the common case of "PDF in, `.pptx` out" use [`convert`].

use crate::config::DeckConfig;
use crate::error::{DeckError, PipelineError, Stage};
use crate::model::{AnalysisResult, ConversionOutput, DeckFile, DocumentMetadata, SourceDocument};
use crate::pipeline::analyze::{DocumentPayload, LlmSlideAnalyzer, SlideAnalyzer};
use crate::pipeline::assemble::{assemble_in_order, write_deck};
use crate::pipeline::render::{self, PageRasterizer, PdfiumRasterizer};
use crate::pipeline::{input, reconcile};
use crate::progress::ProgressTracker;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

const PROGRESS_RENDER_START: f32 = 10.0;
const PROGRESS_ANALYZE: f32 = 50.0;
const PROGRESS_RECONCILE: f32 = 90.0;
const PROGRESS_DONE: f32 = 100.0;

/// Where a [`DeckPipeline`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Rendering,
    Analyzing,
    Reconciling,
    Reviewing,
    Completed,
    Error,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Error)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Rendering => "rendering",
            PipelineState::Analyzing => "analyzing",
            PipelineState::Reconciling => "reconciling",
            PipelineState::Reviewing => "reviewing",
            PipelineState::Completed => "completed",
            PipelineState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Why the last run ended in [`PipelineState::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    pub stage: Stage,
    pub message: String,
}

/// Run-scoped controller for one PDF → deck conversion.
///
/// Collaborators are injected, so tests can drive the state machine with a
/// fake rasterizer and a scripted analyzer.
pub struct DeckPipeline {
    config: DeckConfig,
    rasterizer: Arc<dyn PageRasterizer>,
    analyzer: Arc<dyn SlideAnalyzer>,
    state: PipelineState,
    analysis: Option<AnalysisResult>,
    failure: Option<RunFailure>,
    tracker: ProgressTracker,
}

impl DeckPipeline {
    pub fn new(
        config: DeckConfig,
        rasterizer: Arc<dyn PageRasterizer>,
        analyzer: Arc<dyn SlideAnalyzer>,
    ) -> Self {
        let tracker = ProgressTracker::new(config.progress_callback.clone());
        Self {
            config,
            rasterizer,
            analyzer,
            state: PipelineState::Idle,
            analysis: None,
            failure: None,
            tracker,
        }
    }

    /// Pipeline with the pdfium rasterizer and an LLM analyzer resolved from
    /// `config` and the environment.
    pub fn from_config(config: DeckConfig) -> Result<Self, DeckError> {
        let analyzer = LlmSlideAnalyzer::from_config(&config)?;
        let rasterizer = PdfiumRasterizer::from_config(&config);
        Ok(Self::new(config, Arc::new(rasterizer), Arc::new(analyzer)))
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The reconciled result, available while reviewing.
    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        self.failure.as_ref()
    }

    /// Last reported progress of the current run, 0–100.
    pub fn progress(&self) -> f32 {
        self.tracker.current()
    }

    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    /// Run rendering, analysis and reconciliation for `source`.
    ///
    /// Any state left over from an earlier run is discarded first. On success
    /// the pipeline is in [`PipelineState::Reviewing`].
    pub async fn run(&mut self, source: SourceDocument) -> Result<&AnalysisResult, PipelineError> {
        let start = Instant::now();
        self.discard_run();
        info!("Starting run for '{}'", source.name);

        // ── Rendering ────────────────────────────────────────────────────
        self.enter(PipelineState::Rendering, Stage::Rendering);
        self.tracker
            .report(PROGRESS_RENDER_START, "Rendering pages…");
        let rendered = render::render_document(
            Arc::clone(&self.rasterizer),
            &source,
            self.config.render_scale,
            &self.tracker,
        )
        .await;
        let pages = match rendered {
            Ok(pages) => pages,
            Err(e) => return Err(self.fail(Stage::Rendering, e)),
        };

        // ── Analyzing ────────────────────────────────────────────────────
        self.enter(PipelineState::Analyzing, Stage::Analyzing);
        self.tracker
            .report(PROGRESS_ANALYZE, "Analyzing document with AI…");
        let payload = DocumentPayload {
            document: &source,
            pages: &pages,
            page_count: pages.len(),
        };
        let analyzed = self.analyzer.analyze(payload).await;
        let raw = match analyzed {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(Stage::Analyzing, e)),
        };

        // ── Reconciling ──────────────────────────────────────────────────
        self.enter(PipelineState::Reconciling, Stage::Reconciling);
        self.tracker
            .report(PROGRESS_RECONCILE, "Reconciling slides…");
        let result = reconcile::reconcile(&pages, &raw);
        // Slides share the image buffers; the page list itself is done.
        drop(pages);

        let slide_count = result.slides.len();
        self.state = PipelineState::Reviewing;
        self.tracker.report(PROGRESS_DONE, "Ready for review");
        self.tracker.run_complete(slide_count);
        info!(
            "Run finished: {} slides in {:?}",
            slide_count,
            start.elapsed()
        );

        let analysis: &AnalysisResult = self.analysis.insert(result);
        Ok(analysis)
    }

    /// Edit one slide during review. `None` leaves a field unchanged.
    pub fn update_slide(
        &mut self,
        page_index: usize,
        title: Option<&str>,
        notes: Option<&str>,
    ) -> Result<(), DeckError> {
        self.require_reviewing("edit slides")?;

        let title = title.map(|t| non_blank(t, "title")).transpose()?;
        let notes = notes.map(|n| non_blank(n, "notes")).transpose()?;

        let slide = self
            .analysis
            .as_mut()
            .and_then(|a| a.slides.iter_mut().find(|s| s.page_index() == page_index))
            .ok_or_else(|| DeckError::InvalidEdit(format!("no slide for page {}", page_index + 1)))?;

        if let Some(title) = title {
            slide.set_title(title);
        }
        if let Some(notes) = notes {
            slide.set_notes(notes);
        }
        Ok(())
    }

    /// Assemble the reviewed slides into an in-memory deck.
    pub fn build_deck(&mut self) -> Result<DeckFile, DeckError> {
        self.require_reviewing("export")?;
        let analysis = self
            .analysis
            .as_mut()
            .ok_or_else(|| DeckError::Internal("reviewing without an analysis".into()))?;
        assemble_in_order(analysis, &self.config)
    }

    /// Assemble and write the deck into `dir`, returning the written path.
    ///
    /// Failure leaves the pipeline in `reviewing`.
    pub fn export(&mut self, dir: impl AsRef<Path>) -> Result<PathBuf, DeckError> {
        let deck = self.build_deck()?;
        let path = write_deck(&deck, dir.as_ref()).inspect_err(|e| {
            error!("Export failed: {}", e);
        })?;
        info!("Exported {} slides to {}", deck.slide_count, path.display());
        Ok(path)
    }

    /// Close the review and hand the result to the caller.
    pub fn finish(&mut self) -> Result<AnalysisResult, DeckError> {
        self.require_reviewing("finish")?;
        let analysis = self
            .analysis
            .take()
            .ok_or_else(|| DeckError::Internal("reviewing without an analysis".into()))?;
        self.state = PipelineState::Completed;
        Ok(analysis)
    }

    /// Back to [`PipelineState::Idle`], dropping everything from the last run.
    pub fn reset(&mut self) {
        self.discard_run();
    }

    fn discard_run(&mut self) {
        self.state = PipelineState::Idle;
        self.analysis = None;
        self.failure = None;
        self.tracker = ProgressTracker::new(self.config.progress_callback.clone());
    }

    fn enter(&mut self, state: PipelineState, stage: Stage) {
        self.state = state;
        self.tracker.stage_start(stage);
    }

    fn fail(&mut self, stage: Stage, err: DeckError) -> PipelineError {
        let message = err.to_string();
        error!("{} stage failed: {}", stage, message);
        self.state = PipelineState::Error;
        self.analysis = None;
        self.tracker.run_failed(stage, &message);
        self.failure = Some(RunFailure { stage, message });
        PipelineError::new(stage, err)
    }

    fn require_reviewing(&self, action: &'static str) -> Result<(), DeckError> {
        if self.state == PipelineState::Reviewing {
            Ok(())
        } else {
            Err(DeckError::InvalidState {
                action,
                state: self.state.to_string(),
            })
        }
    }
}

fn non_blank(value: &str, field: &str) -> Result<String, DeckError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(DeckError::InvalidEdit(format!("{field} must not be empty")))
    } else {
        Ok(trimmed.to_string())
    }
}

// ── One-shot helpers ─────────────────────────────────────────────────────────

/// Convert a PDF file or URL into a narrated `.pptx` inside `output_dir`.
///
/// This is the primary entry point for the library: it resolves the input,
/// runs the pipeline without an interactive review and exports immediately.
///
/// # Errors
/// Every failure is tagged with the stage it came from. Input problems
/// (missing file, not a PDF, download failure) are reported as
/// [`Stage::Loading`]; a missing AI credential as [`Stage::Analyzing`].
pub async fn convert(
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    config: &DeckConfig,
) -> Result<ConversionOutput, PipelineError> {
    let input_str = input_str.as_ref();
    let source = input::resolve_input(input_str, config.download_timeout_secs)
        .await
        .map_err(|e| PipelineError::new(Stage::Loading, e))?;
    convert_source(source, output_dir.as_ref(), config).await
}

/// Convert PDF bytes held in memory. `name` is used for logging and type checks.
///
/// # Example
/// ```rust,no_run
/// use pdf2deck::{convert_from_bytes, DeckConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("report.pdf")?;
/// let config = DeckConfig::default();
/// let output = convert_from_bytes("report.pdf", &bytes, "out", &config).await?;
/// println!("{}", output.path.display());
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    name: &str,
    bytes: &[u8],
    output_dir: impl AsRef<Path>,
    config: &DeckConfig,
) -> Result<ConversionOutput, PipelineError> {
    let source = input::accept_bytes(name, bytes, Some("application/pdf"))
        .map_err(|e| PipelineError::new(Stage::Loading, e))?;
    convert_source(source, output_dir.as_ref(), config).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    config: &DeckConfig,
) -> Result<ConversionOutput, PipelineError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| {
            PipelineError::new(
                Stage::Loading,
                DeckError::Internal(format!("Failed to create tokio runtime: {}", e)),
            )
        })?
        .block_on(convert(input_str, output_dir, config))
}

/// Read PDF metadata without rendering or calling the AI.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, DeckError> {
    let config = DeckConfig::default();
    let source = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    render::read_metadata(Arc::new(PdfiumRasterizer::from_config(&config)), &source).await
}

async fn convert_source(
    source: SourceDocument,
    output_dir: &Path,
    config: &DeckConfig,
) -> Result<ConversionOutput, PipelineError> {
    let mut pipeline = DeckPipeline::from_config(config.clone())
        .map_err(|e| PipelineError::new(Stage::Analyzing, e))?;
    pipeline.run(source).await?;

    let path = pipeline
        .export(output_dir)
        .map_err(|e| PipelineError::new(Stage::Assembling, e))?;
    let analysis = pipeline
        .finish()
        .map_err(|e| PipelineError::new(Stage::Assembling, e))?;

    Ok(ConversionOutput {
        path,
        page_count: analysis.slides.len(),
        analysis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageEncoding, PageImage, RawAiSlide, RawAnalysis};
    use async_trait::async_trait;

    struct Pages(usize);

    impl PageRasterizer for Pages {
        fn page_count(&self, _doc: &SourceDocument) -> Result<usize, DeckError> {
            Ok(self.0)
        }

        fn render_page(
            &self,
            _doc: &SourceDocument,
            index: usize,
            _scale: f32,
        ) -> Result<PageImage, DeckError> {
            Ok(PageImage {
                data: Arc::from(vec![index as u8; 3]),
                encoding: ImageEncoding::Jpeg,
                width: 16,
                height: 9,
            })
        }
    }

    /// Answers with the scripted analysis, or an empty response when `None`.
    struct Scripted(Option<RawAnalysis>);

    #[async_trait]
    impl SlideAnalyzer for Scripted {
        async fn analyze(&self, _payload: DocumentPayload<'_>) -> Result<RawAnalysis, DeckError> {
            self.0.clone().ok_or(DeckError::AiEmptyResponse)
        }
    }

    fn source() -> SourceDocument {
        SourceDocument {
            name: "t.pdf".into(),
            bytes: Arc::from(&b"%PDF-1.7"[..]),
        }
    }

    fn pipeline(pages: usize, analyzer: Scripted) -> DeckPipeline {
        DeckPipeline::new(DeckConfig::default(), Arc::new(Pages(pages)), Arc::new(analyzer))
    }

    fn one_slide() -> RawAnalysis {
        RawAnalysis {
            presentation_title: "T".into(),
            summary: String::new(),
            slides: vec![RawAiSlide {
                page_index: Some(0),
                title: Some("First".into()),
                notes: Some("Notes".into()),
            }],
        }
    }

    #[test]
    fn state_names() {
        assert_eq!(PipelineState::Reviewing.to_string(), "reviewing");
        assert!(PipelineState::Error.is_terminal());
        assert!(!PipelineState::Reviewing.is_terminal());
    }

    #[tokio::test]
    async fn successful_run_reaches_review() {
        let mut p = pipeline(2, Scripted(Some(one_slide())));
        assert_eq!(p.state(), PipelineState::Idle);
        let result = p.run(source()).await.unwrap();
        assert_eq!(result.slides.len(), 2);
        assert_eq!(p.state(), PipelineState::Reviewing);
        assert_eq!(p.progress(), 100.0);
    }

    #[tokio::test]
    async fn analyzer_failure_is_attributed() {
        let mut p = pipeline(1, Scripted(None));
        let err = p.run(source()).await.unwrap_err();
        assert_eq!(err.stage, Stage::Analyzing);
        assert_eq!(p.state(), PipelineState::Error);
        assert_eq!(p.failure().unwrap().stage, Stage::Analyzing);
        assert!(p.analysis().is_none());
    }

    #[tokio::test]
    async fn edits_only_while_reviewing() {
        let mut p = pipeline(1, Scripted(Some(one_slide())));
        assert!(matches!(
            p.update_slide(0, Some("x"), None),
            Err(DeckError::InvalidState { .. })
        ));

        p.run(source()).await.unwrap();
        p.update_slide(0, Some("  Edited "), None).unwrap();
        assert_eq!(p.analysis().unwrap().slides[0].title(), "Edited");
        assert_eq!(p.analysis().unwrap().slides[0].notes(), "Notes");

        assert!(matches!(
            p.update_slide(0, None, Some(" ")),
            Err(DeckError::InvalidEdit(_))
        ));
        assert!(matches!(
            p.update_slide(7, Some("x"), None),
            Err(DeckError::InvalidEdit(_))
        ));
    }

    #[tokio::test]
    async fn finish_completes_and_releases() {
        let mut p = pipeline(1, Scripted(Some(one_slide())));
        p.run(source()).await.unwrap();
        let result = p.finish().unwrap();
        assert_eq!(result.slides.len(), 1);
        assert_eq!(p.state(), PipelineState::Completed);
        assert!(p.analysis().is_none());
        assert!(matches!(p.build_deck(), Err(DeckError::InvalidState { .. })));
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut p = pipeline(1, Scripted(None));
        let _ = tokio_test::block_on(p.run(source()));
        p.reset();
        assert_eq!(p.state(), PipelineState::Idle);
        assert!(p.failure().is_none());
        assert_eq!(p.progress(), 0.0);
    }
}
