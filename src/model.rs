//! Data model shared by the pipeline stages.
//!
//! Types fall into two groups:
//!
//! * **Untrusted** — [`RawAnalysis`] and [`RawAiSlide`] mirror whatever the
//!   model returned. Every field may be missing, duplicated or wrong.
//! * **Trusted** — [`RenderedPage`], [`Slide`] and [`AnalysisResult`]. A
//!   `Slide` can only be produced by [`crate::pipeline::reconcile`], which
//!   guarantees a non-empty title and notes and a bound page image.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// The input PDF, already read into memory and type-checked.
#[derive(Clone)]
pub struct SourceDocument {
    /// Display name (file name or last URL segment).
    pub name: String,
    /// Raw PDF bytes.
    pub bytes: Arc<[u8]>,
}

impl fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Encoding of a [`PageImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageEncoding {
    Jpeg,
    Png,
}

impl ImageEncoding {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "image/jpeg",
            ImageEncoding::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "jpeg",
            ImageEncoding::Png => "png",
        }
    }
}

/// An encoded raster image of one page. Cloning shares the underlying bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    pub data: Arc<[u8]>,
    pub encoding: ImageEncoding,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
}

impl PageImage {
    /// Whether the image can be placed on a slide at all.
    pub fn is_usable(&self) -> bool {
        !self.data.is_empty() && self.width > 0 && self.height > 0
    }
}

impl fmt::Debug for PageImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageImage")
            .field("encoding", &self.encoding)
            .field("size", &format_args!("{}x{}", self.width, self.height))
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// One rasterised page. `index` is the authoritative 0-based page number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub index: usize,
    pub image: PageImage,
}

/// One slide entry exactly as the model described it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAiSlide {
    /// Model-asserted page index; may be 0- or 1-based, duplicated or absent.
    pub page_index: Option<i64>,
    pub title: Option<String>,
    pub notes: Option<String>,
}

/// The whole model response, validated only as "a JSON object".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnalysis {
    pub presentation_title: String,
    pub summary: String,
    pub slides: Vec<RawAiSlide>,
}

/// A reconciled slide. Fields are private so the non-empty guarantees hold;
/// use [`crate::controller::DeckPipeline::update_slide`] to edit during review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    page_index: usize,
    title: String,
    notes: String,
    #[serde(skip)]
    image: PageImage,
}

impl Slide {
    pub(crate) fn new(page_index: usize, title: String, notes: String, image: PageImage) -> Self {
        debug_assert!(!title.trim().is_empty() && !notes.trim().is_empty());
        Self {
            page_index,
            title,
            notes,
            image,
        }
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn image(&self) -> &PageImage {
        &self.image
    }

    pub(crate) fn set_title(&mut self, title: String) {
        self.title = title;
    }

    pub(crate) fn set_notes(&mut self, notes: String) {
        self.notes = notes;
    }
}

/// The reviewed/exported state of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub presentation_title: String,
    pub summary: String,
    pub slides: Vec<Slide>,
}

/// PDF metadata (no rendering, no AI call).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// An assembled presentation, ready to be written.
#[derive(Clone)]
pub struct DeckFile {
    /// Sanitised file name including the `.pptx` extension.
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Number of slides in the package.
    pub slide_count: usize,
}

impl fmt::Debug for DeckFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeckFile")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .field("slide_count", &self.slide_count)
            .finish()
    }
}

/// Outcome of a one-shot conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Where the deck was written.
    pub path: PathBuf,
    pub analysis: AnalysisResult,
    /// Source page count; equals the number of slides.
    pub page_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(w: u32, h: u32, bytes: &[u8]) -> PageImage {
        PageImage {
            data: Arc::from(bytes),
            encoding: ImageEncoding::Jpeg,
            width: w,
            height: h,
        }
    }

    #[test]
    fn page_image_usability() {
        assert!(image(10, 10, b"x").is_usable());
        assert!(!image(0, 10, b"x").is_usable());
        assert!(!image(10, 10, b"").is_usable());
    }

    #[test]
    fn slide_serialises_without_image() {
        let s = Slide::new(0, "Intro".into(), "Hello".into(), image(4, 3, b"jpg"));
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, r#"{"pageIndex":0,"title":"Intro","notes":"Hello"}"#);
    }

    #[test]
    fn encoding_mime_and_extension() {
        assert_eq!(ImageEncoding::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(ImageEncoding::Png.extension(), "png");
    }
}
