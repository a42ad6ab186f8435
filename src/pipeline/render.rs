//! Page Rasterizer Adapter: PDF page → encoded page image.
//!
//! [`PageRasterizer`] is the seam the controller depends on; [`PdfiumRasterizer`]
//! is the production implementation. Pages are addressed 0-based everywhere in
//! this module.
//!
//! ## Why spawn_blocking?
//!
//! pdfium uses thread-local state and is CPU-bound. [`render_document`] moves
//! the whole render loop onto tokio's blocking pool so the async workers never
//! stall, and reports each finished page through the run's
//! [`ProgressTracker`] from that thread.
//!
//! ## Why cap pixels as well as scale?
//!
//! Page sizes vary wildly. A fixed scale on an A0 poster produces a huge
//! bitmap, so `max_rendered_pixels` bounds the longest edge.

use crate::config::{DeckConfig, MAX_RENDERED_PIXELS_LIMIT};
use crate::error::DeckError;
use crate::model::{DocumentMetadata, PageImage, RenderedPage, SourceDocument};
use crate::pipeline::encode;
use crate::progress::ProgressTracker;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

/// Share of overall progress covered by rendering: 10 % → 40 %.
const RENDER_PROGRESS_START: f32 = 10.0;
const RENDER_PROGRESS_SPAN: f32 = 30.0;

/// Rasterises pages of a PDF held in memory.
pub trait PageRasterizer: Send + Sync {
    /// Number of pages. Fails with a load error if the bytes are not a parseable PDF.
    fn page_count(&self, doc: &SourceDocument) -> Result<usize, DeckError>;

    /// Render page `index` (0-based) at `scale` × PDF points.
    fn render_page(
        &self,
        doc: &SourceDocument,
        index: usize,
        scale: f32,
    ) -> Result<PageImage, DeckError>;

    /// Render every page in ascending page order, calling `on_page(page_num, total)`
    /// (1-based `page_num`) after each one.
    fn render_all(
        &self,
        doc: &SourceDocument,
        scale: f32,
        on_page: &mut dyn FnMut(usize, usize),
    ) -> Result<Vec<RenderedPage>, DeckError> {
        let total = self.page_count(doc)?;
        if total == 0 {
            return Err(DeckError::EmptyDocument {
                name: doc.name.clone(),
            });
        }

        let mut pages = Vec::with_capacity(total);
        for index in 0..total {
            let image = self.render_page(doc, index, scale)?;
            pages.push(RenderedPage { index, image });
            on_page(index + 1, total);
        }
        Ok(pages)
    }

    /// Document metadata. The default only knows the page count.
    fn metadata(&self, doc: &SourceDocument) -> Result<DocumentMetadata, DeckError> {
        Ok(DocumentMetadata {
            page_count: self.page_count(doc)?,
            ..Default::default()
        })
    }
}

/// Render all pages of `doc` on the blocking pool, reporting progress.
pub async fn render_document(
    rasterizer: Arc<dyn PageRasterizer>,
    doc: &SourceDocument,
    scale: f32,
    tracker: &ProgressTracker,
) -> Result<Vec<RenderedPage>, DeckError> {
    let doc = doc.clone();
    let tracker = tracker.clone();

    let pages = tokio::task::spawn_blocking(move || {
        rasterizer.render_all(&doc, scale, &mut |page_num, total| {
            let percent = RENDER_PROGRESS_START + page_num as f32 / total as f32 * RENDER_PROGRESS_SPAN;
            tracker.report(percent, &format!("Rendering pages… ({page_num}/{total})"));
            tracker.page_rendered(page_num, total);
        })
    })
    .await
    .map_err(|e| DeckError::Internal(format!("Render task panicked: {}", e)))??;

    debug_assert!(pages.iter().enumerate().all(|(i, p)| p.index == i));
    info!("Rendered {} pages", pages.len());
    Ok(pages)
}

/// Read document metadata on the blocking pool.
pub async fn read_metadata(
    rasterizer: Arc<dyn PageRasterizer>,
    doc: &SourceDocument,
) -> Result<DocumentMetadata, DeckError> {
    let doc = doc.clone();
    tokio::task::spawn_blocking(move || rasterizer.metadata(&doc))
        .await
        .map_err(|e| DeckError::Internal(format!("Metadata task panicked: {}", e)))?
}

/// Production rasteriser backed by pdfium.
///
/// Binds the library from `PDFIUM_LIB_PATH` when set, otherwise from the
/// system library search path.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_rendered_pixels: u32,
    jpeg_quality: u8,
    password: Option<String>,
}

impl PdfiumRasterizer {
    /// `max_rendered_pixels` is clamped to `1..=MAX_RENDERED_PIXELS_LIMIT`.
    pub fn new(max_rendered_pixels: u32, jpeg_quality: u8, password: Option<String>) -> Self {
        Self {
            max_rendered_pixels: max_rendered_pixels.clamp(1, MAX_RENDERED_PIXELS_LIMIT),
            jpeg_quality,
            password,
        }
    }

    pub fn from_config(config: &DeckConfig) -> Self {
        Self::new(
            config.max_rendered_pixels,
            config.jpeg_quality,
            config.password.clone(),
        )
    }

    fn bind(&self) -> Result<Pdfium, DeckError> {
        let bindings = match std::env::var("PDFIUM_LIB_PATH") {
            Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
            _ => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| DeckError::PdfiumBindingFailed(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }

    fn load<'a>(
        &'a self,
        pdfium: &'a Pdfium,
        doc: &'a SourceDocument,
    ) -> Result<PdfDocument<'a>, DeckError> {
        let password = self.password.as_deref();
        pdfium
            .load_pdf_from_byte_slice(&doc.bytes[..], password)
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    if password.is_some() {
                        DeckError::WrongPassword {
                            name: doc.name.clone(),
                        }
                    } else {
                        DeckError::PasswordRequired {
                            name: doc.name.clone(),
                        }
                    }
                } else {
                    DeckError::LoadFailed {
                        name: doc.name.clone(),
                        detail: err_str,
                    }
                }
            })
    }

    fn render_loaded(
        &self,
        document: &PdfDocument<'_>,
        index: usize,
        scale: f32,
    ) -> Result<PageImage, DeckError> {
        let pages = document.pages();
        let total = pages.len() as usize;
        if index >= total {
            return Err(DeckError::RenderFailed {
                page: index,
                detail: format!("page out of range (document has {} pages)", total),
            });
        }

        let page = pages
            .get(index as u16)
            .map_err(|e| DeckError::RenderFailed {
                page: index,
                detail: format!("{:?}", e),
            })?;

        let max = i32::try_from(self.max_rendered_pixels).unwrap_or(i32::MAX);
        let target_width = ((page.width().value * scale).round() as i32).clamp(1, max);
        let render_config = PdfRenderConfig::new()
            .set_target_width(target_width)
            .set_maximum_width(max)
            .set_maximum_height(max);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| DeckError::RenderFailed {
                page: index,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );

        encode::encode_jpeg(&image, self.jpeg_quality).map_err(|e| DeckError::RenderFailed {
            page: index,
            detail: format!("JPEG encoding failed: {}", e),
        })
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn page_count(&self, doc: &SourceDocument) -> Result<usize, DeckError> {
        let pdfium = self.bind()?;
        let document = self.load(&pdfium, doc)?;
        Ok(document.pages().len() as usize)
    }

    fn render_page(
        &self,
        doc: &SourceDocument,
        index: usize,
        scale: f32,
    ) -> Result<PageImage, DeckError> {
        let pdfium = self.bind()?;
        let document = self.load(&pdfium, doc)?;
        self.render_loaded(&document, index, scale)
    }

    /// Opens the document once for the whole loop.
    fn render_all(
        &self,
        doc: &SourceDocument,
        scale: f32,
        on_page: &mut dyn FnMut(usize, usize),
    ) -> Result<Vec<RenderedPage>, DeckError> {
        let pdfium = self.bind()?;
        let document = self.load(&pdfium, doc)?;
        let total = document.pages().len() as usize;
        info!("PDF loaded: {} pages", total);
        if total == 0 {
            return Err(DeckError::EmptyDocument {
                name: doc.name.clone(),
            });
        }

        let mut pages = Vec::with_capacity(total);
        for index in 0..total {
            let image = self.render_loaded(&document, index, scale)?;
            pages.push(RenderedPage { index, image });
            on_page(index + 1, total);
        }
        Ok(pages)
    }

    fn metadata(&self, doc: &SourceDocument) -> Result<DocumentMetadata, DeckError> {
        let pdfium = self.bind()?;
        let document = self.load(&pdfium, doc)?;

        let metadata = document.metadata();
        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata.get(tag).and_then(|t| {
                let v = t.value().to_string();
                if v.is_empty() {
                    None
                } else {
                    Some(v)
                }
            })
        };

        Ok(DocumentMetadata {
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            subject: get_meta(PdfDocumentMetadataTagType::Subject),
            creator: get_meta(PdfDocumentMetadataTagType::Creator),
            producer: get_meta(PdfDocumentMetadataTagType::Producer),
            page_count: document.pages().len() as usize,
            pdf_version: format!("{:?}", document.version()),
        })
    }
}
