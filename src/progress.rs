//! Reporting sink for per-image scan events.
//!
//! Inject an [`Arc<dyn ScanProgressCallback>`] via
//! [`crate::config::ScanConfigBuilder::progress_callback`] to receive events
//! as the pipeline works through the extracted images. Every image that was
//! written to disk produces exactly one `on_image_complete` or
//! `on_image_error` call, in extraction order.
//!
//! # Example
//!
//! ```rust
//! use pdf2table::{ImageReport, ScanConfig, ScanProgressCallback};
//! use std::sync::Arc;
//!
//! struct PrintingSink;
//!
//! impl ScanProgressCallback for PrintingSink {
//!     fn on_image_complete(&self, _index: usize, _total: usize, report: &ImageReport) {
//!         println!("{} ({} ms)\n{}", report.file_name, report.elapsed_ms, report.text);
//!     }
//! }
//!
//! let config = ScanConfig::builder()
//!     .progress_callback(Arc::new(PrintingSink) as Arc<dyn ScanProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ImageReport;
use std::sync::Arc;

/// Called by the scan pipeline as it processes each image.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. With `concurrency > 1`, `on_image_start` may fire
/// for several images before the first completes; completion events are
/// still delivered in extraction order.
pub trait ScanProgressCallback: Send + Sync {
    /// Called once after the materializer has run.
    ///
    /// `error` carries the reason when extraction failed and `total_images`
    /// is therefore zero.
    fn on_extraction_complete(&self, total_images: usize, error: Option<&str>) {
        let _ = (total_images, error);
    }

    /// Called just before an image is encoded and sent.
    ///
    /// # Arguments
    /// * `index`     — 1-indexed position in extraction order
    /// * `total`     — number of extracted images
    /// * `file_name` — e.g. `page_2_img_1.png`
    fn on_image_start(&self, index: usize, total: usize, file_name: &str) {
        let _ = (index, total, file_name);
    }

    /// Called when the backend answered (the text may be the no-table sentinel).
    fn on_image_complete(&self, index: usize, total: usize, report: &ImageReport) {
        let _ = (index, total, report);
    }

    /// Called when the image failed; `report.text` is empty.
    fn on_image_error(&self, index: usize, total: usize, report: &ImageReport, error: &str) {
        let _ = (index, total, report, error);
    }

    /// Called once after every image has been attempted.
    fn on_scan_complete(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ScanProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScanConfig`].
pub type ProgressCallback = Arc<dyn ScanProgressCallback>;

/// Forward a finished report to the sink's success or error hook.
pub(crate) fn notify_report(cb: &ProgressCallback, total: usize, report: &ImageReport) {
    match &report.error {
        None => cb.on_image_complete(report.index, total, report),
        Some(e) => cb.on_image_error(report.index, total, report, &e.to_string()),
    }
}
