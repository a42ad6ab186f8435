//! Presentation Assembler Adapter.
//!
//! Turns a reconciled [`AnalysisResult`] into a `.pptx` [`DeckFile`]: one
//! 16:9 slide per page, the page image contain-fitted and centered, the notes
//! in the presenter-notes channel only.

use crate::config::{DeckConfig, DEFAULT_FILE_NAME};
use crate::error::DeckError;
use crate::model::{AnalysisResult, DeckFile, PageImage, Slide};
use crate::pipeline::reconcile::ensure_page_order;
use crate::pptx::{Picture, Placement, PresentationPackage, SlidePart};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

static RE_ILLEGAL_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\?%*:|"<>\x00-\x1F\x7F]"#).unwrap());

/// Contain-fit `image` into a `slide_w` × `slide_h` area, centered.
///
/// Returns `None` for images with a zero dimension.
pub fn contain_fit(image_w: u32, image_h: u32, slide_w: i64, slide_h: i64) -> Option<Placement> {
    if image_w == 0 || image_h == 0 || slide_w <= 0 || slide_h <= 0 {
        return None;
    }
    let scale = (slide_w as f64 / image_w as f64).min(slide_h as f64 / image_h as f64);
    let cx = ((image_w as f64 * scale).round() as i64).clamp(1, slide_w);
    let cy = ((image_h as f64 * scale).round() as i64).clamp(1, slide_h);
    Some(Placement {
        x: (slide_w - cx) / 2,
        y: (slide_h - cy) / 2,
        cx,
        cy,
    })
}

/// Derive the output file name from a presentation title.
///
/// Characters illegal in file names become `-`, the result is trimmed and
/// capped at `max_len` characters, and an empty result falls back to
/// [`DEFAULT_FILE_NAME`]. The `.pptx` extension is always appended.
pub fn sanitize_file_name(title: &str, max_len: usize) -> String {
    let replaced = RE_ILLEGAL_FILENAME_CHARS.replace_all(title, "-");
    let capped: String = replaced.trim().chars().take(max_len).collect();
    let stem = capped.trim();
    let stem = if stem.is_empty() || stem.chars().all(|c| c == '.') {
        DEFAULT_FILE_NAME
    } else {
        stem
    };
    format!("{stem}.pptx")
}

/// Build the presentation for `analysis`.
///
/// Slides are assembled from a page-ordered copy, so the caller's order does
/// not matter. A slide whose image is unusable keeps its notes but gets no
/// picture; if that holds for every slide, assembly fails.
pub fn assemble(analysis: &AnalysisResult, config: &DeckConfig) -> Result<DeckFile, DeckError> {
    if analysis.slides.is_empty() {
        return Err(DeckError::NoSlides);
    }

    let mut slides: Vec<&Slide> = analysis.slides.iter().collect();
    slides.sort_by_key(|s| s.page_index());

    let mut package = PresentationPackage::new(analysis.presentation_title.clone())
        .with_description(analysis.summary.clone());
    let (slide_w, slide_h) = package.slide_size();

    let mut placed = 0usize;
    for slide in &slides {
        let picture = picture_for(slide.image(), slide_w, slide_h);
        if picture.is_some() {
            placed += 1;
        } else {
            warn!(
                "Page {} has no usable image; emitting notes only",
                slide.page_index() + 1
            );
        }
        package.add_slide(SlidePart {
            name: slide.title().to_string(),
            picture,
            notes: slide.notes().to_string(),
        });
    }

    if placed == 0 {
        return Err(DeckError::ImageBindingFailed {
            total: slides.len(),
        });
    }

    let bytes = package.to_bytes()?;
    let file_name = sanitize_file_name(&analysis.presentation_title, config.file_name_max_len);

    info!(
        "Assembled '{}': {} slides, {} bytes",
        file_name,
        slides.len(),
        bytes.len()
    );

    Ok(DeckFile {
        file_name,
        bytes,
        slide_count: slides.len(),
    })
}

fn picture_for(image: &PageImage, slide_w: i64, slide_h: i64) -> Option<Picture> {
    if !image.is_usable() {
        return None;
    }
    let placement = contain_fit(image.width, image.height, slide_w, slide_h)?;
    Some(Picture {
        data: image.data.clone(),
        extension: image.encoding.extension(),
        placement,
    })
}

/// Re-sort the slides and assemble. Used by the controller on export.
pub fn assemble_in_order(
    analysis: &mut AnalysisResult,
    config: &DeckConfig,
) -> Result<DeckFile, DeckError> {
    ensure_page_order(&mut analysis.slides);
    assemble(analysis, config)
}

/// Write `deck` into `dir` atomically and return the final path.
///
/// The bytes go to a temporary file in `dir` first, which is then renamed over
/// the target, so readers never see a half-written deck.
pub fn write_deck(deck: &DeckFile, dir: &Path) -> Result<PathBuf, DeckError> {
    let target = dir.join(&deck.file_name);
    let io_err = |source: std::io::Error| DeckError::OutputWriteFailed {
        path: target.clone(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(io_err)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".pdf2deck-")
        .suffix(".pptx.tmp")
        .tempfile_in(dir)
        .map_err(io_err)?;
    tmp.write_all(&deck.bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(&target).map_err(|e| io_err(e.error))?;

    debug!("Wrote {} bytes to {}", deck.bytes.len(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageEncoding, RawAnalysis, RenderedPage};
    use crate::pipeline::reconcile::reconcile;
    use crate::pptx::{SLIDE_HEIGHT_16X9, SLIDE_WIDTH_16X9};
    use std::io::{Cursor, Read};
    use std::sync::Arc;

    fn page(index: usize, width: u32, height: u32) -> RenderedPage {
        RenderedPage {
            index,
            image: PageImage {
                data: Arc::from(vec![0xFF, 0xD8, index as u8, 0xFF, 0xD9]),
                encoding: ImageEncoding::Jpeg,
                width,
                height,
            },
        }
    }

    fn analysis(pages: &[RenderedPage], title: &str) -> AnalysisResult {
        reconcile(
            pages,
            &RawAnalysis {
                presentation_title: title.into(),
                summary: "s".into(),
                slides: Vec::new(),
            },
        )
    }

    fn config() -> DeckConfig {
        DeckConfig::default()
    }

    #[test]
    fn sanitizes_illegal_characters() {
        assert_eq!(sanitize_file_name("Q3: Results/Plan", 50), "Q3- Results-Plan.pptx");
        assert_eq!(
            sanitize_file_name(r#"a\b?c%d*e|f"g<h>i"#, 50),
            "a-b-c-d-e-f-g-h-i.pptx"
        );
        assert_eq!(sanitize_file_name("tab\there", 50), "tab-here.pptx");
    }

    #[test]
    fn caps_length_in_characters() {
        let long = "é".repeat(80);
        let name = sanitize_file_name(&long, 50);
        assert_eq!(name.chars().count(), 50 + ".pptx".len());
        assert_eq!(sanitize_file_name("abcdef", 3), "abc.pptx");
    }

    #[test]
    fn falls_back_to_default_name() {
        assert_eq!(sanitize_file_name("", 50), "presentation.pptx");
        assert_eq!(sanitize_file_name("   ", 50), "presentation.pptx");
        assert_eq!(sanitize_file_name("..", 50), "presentation.pptx");
    }

    #[test]
    fn contain_fit_portrait_is_pillarboxed() {
        let p = contain_fit(600, 800, SLIDE_WIDTH_16X9, SLIDE_HEIGHT_16X9).unwrap();
        assert_eq!(p.cy, SLIDE_HEIGHT_16X9);
        assert!(p.cx < SLIDE_WIDTH_16X9);
        assert_eq!(p.y, 0);
        assert_eq!(p.x, (SLIDE_WIDTH_16X9 - p.cx) / 2);
        // aspect preserved within rounding
        let ratio = p.cx as f64 / p.cy as f64;
        assert!((ratio - 0.75).abs() < 1e-4);
    }

    #[test]
    fn contain_fit_wide_is_letterboxed() {
        let p = contain_fit(2000, 500, SLIDE_WIDTH_16X9, SLIDE_HEIGHT_16X9).unwrap();
        assert_eq!(p.cx, SLIDE_WIDTH_16X9);
        assert_eq!(p.x, 0);
        assert!(p.y > 0);
    }

    #[test]
    fn contain_fit_exact_ratio_fills_slide() {
        let p = contain_fit(1600, 900, SLIDE_WIDTH_16X9, SLIDE_HEIGHT_16X9).unwrap();
        assert_eq!((p.x, p.y), (0, 0));
        assert_eq!((p.cx, p.cy), (SLIDE_WIDTH_16X9, SLIDE_HEIGHT_16X9));
    }

    #[test]
    fn contain_fit_rejects_empty() {
        assert!(contain_fit(0, 10, SLIDE_WIDTH_16X9, SLIDE_HEIGHT_16X9).is_none());
    }

    #[test]
    fn assembles_one_slide_per_page() {
        let pages = vec![page(0, 1600, 900), page(1, 600, 800)];
        let deck = assemble(&analysis(&pages, "Q3: Results/Plan"), &config()).unwrap();
        assert_eq!(deck.file_name, "Q3- Results-Plan.pptx");
        assert_eq!(deck.slide_count, 2);

        let mut archive = zip::ZipArchive::new(Cursor::new(deck.bytes)).unwrap();
        let mut notes = String::new();
        archive
            .by_name("ppt/notesSlides/notesSlide2.xml")
            .unwrap()
            .read_to_string(&mut notes)
            .unwrap();
        assert!(notes.contains("No explanation could be generated"));
    }

    #[test]
    fn assembles_in_page_order_regardless_of_input_order() {
        let pages = vec![page(0, 100, 100), page(1, 100, 100)];
        let mut result = analysis(&pages, "t");
        result.slides.reverse();
        let deck = assemble(&result, &config()).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(deck.bytes)).unwrap();
        let mut slide1 = String::new();
        archive
            .by_name("ppt/slides/slide1.xml")
            .unwrap()
            .read_to_string(&mut slide1)
            .unwrap();
        assert!(slide1.contains(r#"<p:cSld name="Page 1">"#));

        let mut media = Vec::new();
        archive
            .by_name("ppt/media/image1.jpeg")
            .unwrap()
            .read_to_end(&mut media)
            .unwrap();
        assert_eq!(media[2], 0);
    }

    #[test]
    fn no_slides_is_an_error() {
        let empty = analysis(&[], "t");
        assert!(matches!(assemble(&empty, &config()), Err(DeckError::NoSlides)));
    }

    #[test]
    fn all_images_unusable_is_an_error() {
        let pages = vec![page(0, 0, 0), page(1, 0, 10)];
        let err = assemble(&analysis(&pages, "t"), &config()).unwrap_err();
        assert!(matches!(err, DeckError::ImageBindingFailed { total: 2 }));
    }

    #[test]
    fn some_images_unusable_still_assembles() {
        let pages = vec![page(0, 0, 0), page(1, 100, 100)];
        let deck = assemble(&analysis(&pages, "t"), &config()).unwrap();
        assert_eq!(deck.slide_count, 2);
    }

    #[test]
    fn write_deck_is_atomic_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let deck = DeckFile {
            file_name: "deck.pptx".into(),
            bytes: b"first".to_vec(),
            slide_count: 1,
        };
        let path = write_deck(&deck, dir.path()).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        let second = DeckFile {
            bytes: b"second".to_vec(),
            ..deck
        };
        write_deck(&second, dir.path()).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_deck_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out/decks");
        let deck = DeckFile {
            file_name: "x.pptx".into(),
            bytes: vec![1, 2, 3],
            slide_count: 1,
        };
        let path = write_deck(&deck, &nested).unwrap();
        assert!(path.starts_with(&nested));
    }
}
