//! Slide Reconciliation Engine.
//!
//! Merges the model's untrusted slide list with the trusted list of rendered
//! pages. For `N` rendered pages the output is always exactly `N` slides with
//! page indices `0..N`, ascending, each carrying a non-empty title, non-empty
//! notes and the image of its own page.
//!
//! Policy, in order:
//!
//! 1. **Index base.** If the smallest `pageIndex` the model produced is `1`,
//!    the whole response is taken to be 1-based and shifted down by one. This
//!    is a heuristic about model behaviour, nothing more: a 0-based response
//!    that happens to omit page 0 is shifted too.
//! 2. **Lookup.** For every page `i`, the first raw slide whose index is `i`
//!    wins. Later duplicates, absent indices and indices outside `0..N` are
//!    ignored.
//! 3. **Fallback.** A missing match, or a blank title or blank notes, is
//!    replaced field by field with fixed placeholder text.
//! 4. **Binding.** Page `i`'s image is attached to slide `i`.
//!
//! Nothing here performs I/O or fails. Missing model data is masked, never
//! reported as an error.

use crate::model::{AnalysisResult, RawAiSlide, RawAnalysis, RenderedPage, Slide};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Notes used when the model produced nothing usable for a page.
pub const FALLBACK_NOTES: &str =
    "No explanation could be generated for this page. Please review its content.";

/// Title used when the model produced nothing usable for page `index`.
pub fn fallback_title(index: usize) -> String {
    format!("Page {}", index + 1)
}

/// Build the trusted [`AnalysisResult`] for `pages` from the model's `raw` answer.
///
/// `pages` may arrive in any order; the output is sorted by page index.
pub fn reconcile(pages: &[RenderedPage], raw: &RawAnalysis) -> AnalysisResult {
    let by_index = index_raw_slides(&raw.slides, pages.len());

    let mut fallbacks = 0usize;
    let mut slides: Vec<Slide> = pages
        .iter()
        .map(|page| {
            let matched = by_index.get(&page.index).copied();
            let title = non_blank(matched.and_then(|s| s.title.as_deref()));
            let notes = non_blank(matched.and_then(|s| s.notes.as_deref()));
            if title.is_none() || notes.is_none() {
                fallbacks += 1;
            }
            Slide::new(
                page.index,
                title.unwrap_or_else(|| fallback_title(page.index)),
                notes.unwrap_or_else(|| FALLBACK_NOTES.to_string()),
                page.image.clone(),
            )
        })
        .collect();

    ensure_page_order(&mut slides);

    if fallbacks > 0 {
        warn!(
            "{} of {} slides use fallback title or notes",
            fallbacks,
            slides.len()
        );
    }

    AnalysisResult {
        presentation_title: raw.presentation_title.trim().to_string(),
        summary: raw.summary.trim().to_string(),
        slides,
    }
}

/// Sort slides ascending by page index.
///
/// Stable and cheap on already-sorted input, so callers run it again right
/// before assembly regardless of what happened to the slides since.
pub fn ensure_page_order(slides: &mut [Slide]) {
    slides.sort_by_key(Slide::page_index);
}

/// Normalise indices and keep the first raw slide per page in `0..page_count`.
fn index_raw_slides(raw: &[RawAiSlide], page_count: usize) -> HashMap<usize, &RawAiSlide> {
    let shift = match raw.iter().filter_map(|s| s.page_index).min() {
        Some(1) => {
            debug!("Model answered with 1-based page indices; shifting down by one");
            1
        }
        _ => 0,
    };

    let mut by_index = HashMap::with_capacity(page_count);
    let mut ignored = 0usize;
    for slide in raw {
        let target = slide
            .page_index
            .and_then(|i| i.checked_sub(shift))
            .and_then(|i| usize::try_from(i).ok())
            .filter(|&i| i < page_count);
        match target {
            Some(i) => {
                if by_index.contains_key(&i) {
                    ignored += 1;
                } else {
                    by_index.insert(i, slide);
                }
            }
            None => ignored += 1,
        }
    }

    if ignored > 0 {
        debug!(
            "Ignored {} raw slides (duplicate, missing or out-of-range index)",
            ignored
        );
    }
    by_index
}

fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageEncoding, PageImage};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn pages(n: usize) -> Vec<RenderedPage> {
        (0..n)
            .map(|index| RenderedPage {
                index,
                image: PageImage {
                    data: Arc::from(vec![index as u8 + 1; 4]),
                    encoding: ImageEncoding::Jpeg,
                    width: 160,
                    height: 90,
                },
            })
            .collect()
    }

    fn raw(idx: Option<i64>, title: &str, notes: &str) -> RawAiSlide {
        RawAiSlide {
            page_index: idx,
            title: Some(title.to_string()),
            notes: Some(notes.to_string()),
        }
    }

    fn analysis(slides: Vec<RawAiSlide>) -> RawAnalysis {
        RawAnalysis {
            presentation_title: "Deck".into(),
            summary: "Summary".into(),
            slides,
        }
    }

    fn indices(result: &AnalysisResult) -> Vec<usize> {
        result.slides.iter().map(Slide::page_index).collect()
    }

    #[test]
    fn one_based_gap_and_out_of_range() {
        let pages = pages(3);
        let result = reconcile(
            &pages,
            &analysis(vec![raw(Some(1), "A", "a"), raw(Some(3), "C", "c")]),
        );

        assert_eq!(indices(&result), vec![0, 1, 2]);
        assert_eq!(result.slides[0].title(), "A");
        assert_eq!(result.slides[0].notes(), "a");
        assert_eq!(result.slides[1].title(), "Page 2");
        assert_eq!(result.slides[1].notes(), FALLBACK_NOTES);
        assert_eq!(result.slides[2].title(), "C");
        assert_eq!(result.slides[2].notes(), "c");
        for (slide, page) in result.slides.iter().zip(&pages) {
            assert_eq!(slide.image(), &page.image);
        }
    }

    /// Runs `reconcile` under a subscriber that keeps WARN output in memory.
    fn reconcile_capturing_warnings(
        pages: &[RenderedPage],
        raw: &RawAnalysis,
    ) -> (AnalysisResult, String) {
        let buf = Arc::new(std::sync::Mutex::new(Vec::<u8>::new()));
        let sink = Arc::clone(&buf);
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || SharedBuf(Arc::clone(&sink)))
            .finish();
        let result = tracing::subscriber::with_default(subscriber, || reconcile(pages, raw));
        let logs = String::from_utf8_lossy(&buf.lock().unwrap()).into_owned();
        (result, logs)
    }

    struct SharedBuf(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuf {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn model_title_matching_fallback_text_is_not_counted() {
        let (result, logs) = reconcile_capturing_warnings(
            &pages(2),
            &analysis(vec![
                raw(Some(0), "Page 1", "Cover page."),
                raw(Some(1), "Agenda", "Three topics."),
            ]),
        );
        assert_eq!(result.slides[0].title(), "Page 1");
        assert!(!logs.contains("fallback"), "unexpected warning: {logs}");
    }

    #[test]
    fn fallback_count_is_logged() {
        let (_, logs) = reconcile_capturing_warnings(
            &pages(3),
            &analysis(vec![raw(Some(0), "Intro", "Hello"), raw(Some(1), "  ", "Body")]),
        );
        assert!(logs.contains("2 of 3 slides use fallback"), "got: {logs}");
    }

    #[test]
    fn one_based_complete_answer_is_shifted() {
        let result = reconcile(
            &pages(3),
            &analysis(vec![
                raw(Some(1), "one", "1"),
                raw(Some(2), "two", "2"),
                raw(Some(3), "three", "3"),
            ]),
        );
        let titles: Vec<_> = result.slides.iter().map(Slide::title).collect();
        assert_eq!(titles, vec!["one", "two", "three"]);
    }

    #[test]
    fn zero_based_answer_is_not_shifted() {
        let result = reconcile(
            &pages(2),
            &analysis(vec![raw(Some(0), "zero", "0"), raw(Some(1), "one", "1")]),
        );
        assert_eq!(result.slides[0].title(), "zero");
        assert_eq!(result.slides[1].title(), "one");
    }

    #[test]
    fn minimum_above_one_is_not_shifted() {
        let result = reconcile(&pages(3), &analysis(vec![raw(Some(2), "two", "n")]));
        assert_eq!(result.slides[2].title(), "two");
        assert_eq!(result.slides[1].title(), "Page 2");
    }

    #[test]
    fn empty_answer_gives_all_fallbacks() {
        let pages = pages(4);
        let result = reconcile(&pages, &analysis(Vec::new()));
        assert_eq!(result.slides.len(), 4);
        for (i, slide) in result.slides.iter().enumerate() {
            assert_eq!(slide.title(), format!("Page {}", i + 1));
            assert_eq!(slide.notes(), FALLBACK_NOTES);
            assert_eq!(slide.image(), &pages[i].image);
        }
    }

    #[test]
    fn first_duplicate_wins() {
        let result = reconcile(
            &pages(2),
            &analysis(vec![
                raw(Some(0), "first", "f"),
                raw(Some(0), "second", "s"),
                raw(Some(1), "other", "o"),
            ]),
        );
        assert_eq!(result.slides.len(), 2);
        assert_eq!(result.slides[0].title(), "first");
    }

    #[test]
    fn negative_and_missing_indices_are_ignored() {
        let result = reconcile(
            &pages(2),
            &analysis(vec![
                raw(Some(-1), "neg", "n"),
                raw(None, "none", "n"),
                raw(Some(1), "one", "1"),
            ]),
        );
        assert_eq!(result.slides[0].title(), "Page 1");
        assert_eq!(result.slides[1].title(), "one");
    }

    #[test]
    fn blank_fields_fall_back_independently() {
        let result = reconcile(
            &pages(2),
            &analysis(vec![
                raw(Some(0), "  ", "real notes"),
                RawAiSlide {
                    page_index: Some(1),
                    title: Some("Real title".into()),
                    notes: None,
                },
            ]),
        );
        assert_eq!(result.slides[0].title(), "Page 1");
        assert_eq!(result.slides[0].notes(), "real notes");
        assert_eq!(result.slides[1].title(), "Real title");
        assert_eq!(result.slides[1].notes(), FALLBACK_NOTES);
    }

    #[test]
    fn out_of_order_answer_and_pages() {
        let mut pages = pages(3);
        pages.reverse();
        let result = reconcile(
            &pages,
            &analysis(vec![
                raw(Some(2), "c", "c"),
                raw(Some(0), "a", "a"),
                raw(Some(1), "b", "b"),
            ]),
        );
        assert_eq!(indices(&result), vec![0, 1, 2]);
        assert_eq!(result.slides[0].title(), "a");
        assert_eq!(result.slides[2].image().data[0], 3);
    }

    #[test]
    fn header_fields_are_trimmed() {
        let mut raw_analysis = analysis(Vec::new());
        raw_analysis.presentation_title = "  Title \n".into();
        let result = reconcile(&pages(1), &raw_analysis);
        assert_eq!(result.presentation_title, "Title");
    }

    #[test]
    fn ensure_page_order_resorts() {
        let mut result = reconcile(&pages(3), &analysis(Vec::new()));
        result.slides.swap(0, 2);
        ensure_page_order(&mut result.slides);
        assert_eq!(indices(&result), vec![0, 1, 2]);
    }

    #[test]
    fn no_pages_no_slides() {
        let result = reconcile(&[], &analysis(vec![raw(Some(0), "x", "y")]));
        assert!(result.slides.is_empty());
    }

    fn raw_slide_strategy() -> impl Strategy<Value = RawAiSlide> {
        (
            proptest::option::of(-3i64..15),
            proptest::option::of("[ a-z]{0,6}"),
            proptest::option::of("[ a-z]{0,6}"),
        )
            .prop_map(|(page_index, title, notes)| RawAiSlide {
                page_index,
                title,
                notes,
            })
    }

    proptest! {
        #[test]
        fn output_is_complete_ordered_and_non_empty(
            n in 1usize..12,
            slides in proptest::collection::vec(raw_slide_strategy(), 0..20),
        ) {
            let pages = pages(n);
            let result = reconcile(&pages, &analysis(slides));

            prop_assert_eq!(indices(&result), (0..n).collect::<Vec<_>>());
            for (slide, page) in result.slides.iter().zip(&pages) {
                prop_assert!(!slide.title().trim().is_empty());
                prop_assert!(!slide.notes().trim().is_empty());
                prop_assert_eq!(slide.image(), &page.image);
            }
        }

        #[test]
        fn reconciliation_is_idempotent(
            n in 1usize..8,
            slides in proptest::collection::vec(raw_slide_strategy(), 0..10),
        ) {
            let pages = pages(n);
            let raw = analysis(slides);
            prop_assert_eq!(reconcile(&pages, &raw), reconcile(&pages, &raw));
        }

        #[test]
        fn trailing_duplicates_do_not_change_output(
            n in 1usize..8,
            slides in proptest::collection::vec(raw_slide_strategy(), 1..10),
        ) {
            let pages = pages(n);
            let base = analysis(slides.clone());
            let mut doubled = slides.clone();
            doubled.extend(slides);
            prop_assert_eq!(reconcile(&pages, &base), reconcile(&pages, &analysis(doubled)));
        }
    }
}
