//! Progress-callback trait for per-document and per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as documents are converted.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a channel, a log sink or a terminal progress
//! bar without the library knowing how the host application communicates.
//! The trait is `Send + Sync` because documents are converted on separate
//! blocking threads.
//!
//! # Example
//!
//! ```rust
//! use softmask_pdf2md::{ConversionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct ImageCounter {
//!     written: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for ImageCounter {
//!     fn on_page_complete(&self, _doc: &str, _page: usize, _total: usize, images: usize) {
//!         self.written.fetch_add(images, Ordering::Relaxed);
//!     }
//! }
//!
//! let counter = Arc::new(ImageCounter { written: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ConversionStats;
use std::sync::Arc;

/// Called by the extraction pipeline as it works through documents.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// Events for different documents may arrive concurrently from different
/// threads. Events for one document arrive in order from a single thread.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once by [`crate::convert::convert_directory`] after discovery.
    fn on_run_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called after a document opened successfully.
    ///
    /// # Arguments
    /// * `document`    — document name (file stem)
    /// * `total_pages` — number of pages that will be walked
    fn on_document_start(&self, document: &str, total_pages: usize) {
        let _ = (document, total_pages);
    }

    /// Called after every image on a page was attempted.
    ///
    /// # Arguments
    /// * `page_num`       — 1-indexed page number
    /// * `images_written` — PNGs written for this page
    fn on_page_complete(
        &self,
        document: &str,
        page_num: usize,
        total_pages: usize,
        images_written: usize,
    ) {
        let _ = (document, page_num, total_pages, images_written);
    }

    /// Called when one image is skipped.
    fn on_image_error(&self, document: &str, page_num: usize, error: &str) {
        let _ = (document, page_num, error);
    }

    /// Called once the Markdown file has been written.
    fn on_document_complete(&self, document: &str, stats: &ConversionStats) {
        let _ = (document, stats);
    }

    /// Called when a document fails as a whole (cannot be opened, output
    /// cannot be written).
    fn on_document_error(&self, document: &str, error: &str) {
        let _ = (document, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        documents: AtomicUsize,
        pages: AtomicUsize,
        images: AtomicUsize,
        image_errors: AtomicUsize,
        finished: Mutex<Vec<String>>,
        failed: Mutex<Vec<String>>,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_run_start(&self, total_documents: usize) {
            self.documents.store(total_documents, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _doc: &str, _page: usize, _total: usize, images: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
            self.images.fetch_add(images, Ordering::SeqCst);
        }

        fn on_image_error(&self, _doc: &str, _page: usize, _error: &str) {
            self.image_errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, document: &str, _stats: &ConversionStats) {
            self.finished.lock().unwrap().push(document.to_string());
        }

        fn on_document_error(&self, document: &str, _error: &str) {
            self.failed.lock().unwrap().push(document.to_string());
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(2);
        cb.on_document_start("a", 3);
        cb.on_page_complete("a", 1, 3, 2);
        cb.on_image_error("a", 2, "decode failed");
        cb.on_document_complete("a", &ConversionStats::default());
        cb.on_document_error("b", "corrupt");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_run_start(2);
        tracker.on_document_start("report", 2);
        tracker.on_page_complete("report", 1, 2, 3);
        tracker.on_image_error("report", 2, "unsupported filter");
        tracker.on_page_complete("report", 2, 2, 0);
        tracker.on_document_complete("report", &ConversionStats::default());
        tracker.on_document_error("broken", "invalid xref");

        assert_eq!(tracker.documents.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.pages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.images.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.image_errors.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.finished.lock().unwrap(), vec!["report"]);
        assert_eq!(*tracker.failed.lock().unwrap(), vec!["broken"]);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_document_start("doc", 10);
        cb.on_page_complete("doc", 1, 10, 0);
    }
}
