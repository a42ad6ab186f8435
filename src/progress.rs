//! Progress reporting for a deck run.
//!
//! Inject an [`Arc<dyn DeckProgressCallback>`] via
//! [`crate::config::DeckConfigBuilder::progress_callback`] to receive events as
//! the pipeline moves through its stages.
//!
//! The pipeline never calls the callback directly; it goes through a
//! run-scoped [`ProgressTracker`] which clamps the percentage so observers
//! never see it move backwards within one run.
//!
//! # Example
//!
//! ```rust
//! use pdf2deck::{DeckConfig, DeckProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl DeckProgressCallback for Printer {
//!     fn on_progress(&self, percent: f32, message: &str) {
//!         eprintln!("{percent:>5.1}%  {message}");
//!     }
//! }
//!
//! let config = DeckConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use std::sync::{Arc, Mutex};

/// Receives pipeline events. All methods default to no-ops.
///
/// Implementations must be `Send + Sync`: page rendering reports from the
/// blocking thread pool.
pub trait DeckProgressCallback: Send + Sync {
    /// A new stage started.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Overall progress (0–100, never decreasing within a run) with a status line.
    fn on_progress(&self, percent: f32, message: &str) {
        let _ = (percent, message);
    }

    /// A page finished rasterising.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — total pages in the document
    fn on_page_rendered(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// The run reached review with `slide_count` slides.
    fn on_run_complete(&self, slide_count: usize) {
        let _ = slide_count;
    }

    /// The run aborted in `stage`.
    fn on_run_failed(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DeckProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DeckConfig`].
pub type ProgressCallback = Arc<dyn DeckProgressCallback>;

/// Run-scoped progress channel handed to each stage.
#[derive(Clone)]
pub struct ProgressTracker {
    callback: Option<ProgressCallback>,
    last: Arc<Mutex<f32>>,
}

impl ProgressTracker {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last: Arc::new(Mutex::new(0.0)),
        }
    }

    /// Report `percent` unless it would move progress backwards; returns the
    /// value actually reported.
    pub fn report(&self, percent: f32, message: &str) -> f32 {
        let reported = {
            let mut last = match self.last.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let clamped = percent.clamp(0.0, 100.0).max(*last);
            *last = clamped;
            clamped
        };
        if let Some(ref cb) = self.callback {
            cb.on_progress(reported, message);
        }
        reported
    }

    /// Last reported percentage.
    pub fn current(&self) -> f32 {
        match self.last.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn stage_start(&self, stage: Stage) {
        if let Some(ref cb) = self.callback {
            cb.on_stage_start(stage);
        }
    }

    pub fn page_rendered(&self, page_num: usize, total_pages: usize) {
        if let Some(ref cb) = self.callback {
            cb.on_page_rendered(page_num, total_pages);
        }
    }

    pub fn run_complete(&self, slide_count: usize) {
        if let Some(ref cb) = self.callback {
            cb.on_run_complete(slide_count);
        }
    }

    pub fn run_failed(&self, stage: Stage, error: &str) {
        if let Some(ref cb) = self.callback {
            cb.on_run_failed(stage, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        values: Mutex<Vec<f32>>,
        pages: AtomicUsize,
    }

    impl DeckProgressCallback for Recorder {
        fn on_progress(&self, percent: f32, _message: &str) {
            self.values.lock().unwrap().push(percent);
        }

        fn on_page_rendered(&self, _page_num: usize, _total_pages: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Rendering);
        cb.on_progress(10.0, "rendering");
        cb.on_page_rendered(1, 3);
        cb.on_run_complete(3);
        cb.on_run_failed(Stage::Analyzing, "boom");
    }

    #[test]
    fn tracker_never_regresses() {
        let rec = Arc::new(Recorder::default());
        let tracker = ProgressTracker::new(Some(rec.clone() as ProgressCallback));

        tracker.report(10.0, "a");
        tracker.report(40.0, "b");
        assert_eq!(tracker.report(20.0, "c"), 40.0);
        tracker.report(150.0, "d");

        assert_eq!(*rec.values.lock().unwrap(), vec![10.0, 40.0, 40.0, 100.0]);
        assert_eq!(tracker.current(), 100.0);
    }

    #[test]
    fn tracker_without_callback_still_tracks() {
        let tracker = ProgressTracker::new(None);
        tracker.report(50.0, "half");
        tracker.page_rendered(1, 1);
        assert_eq!(tracker.current(), 50.0);
    }

    #[test]
    fn clones_share_state() {
        let rec = Arc::new(Recorder::default());
        let tracker = ProgressTracker::new(Some(rec.clone() as ProgressCallback));
        let other = tracker.clone();
        other.report(30.0, "x");
        other.page_rendered(1, 2);
        assert_eq!(tracker.current(), 30.0);
        assert_eq!(rec.pages.load(Ordering::SeqCst), 1);
    }
}
