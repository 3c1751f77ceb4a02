//! Streaming scan API: emit image reports as they complete.
//!
//! Unlike the eager [`crate::scan::scan`], which returns only after every
//! image has been answered, [`scan_stream`] yields each [`ImageReport`] as
//! soon as it and all images before it are done. Reports always arrive in
//! extraction order, also with `concurrency > 1`.

use crate::backend::build_backend;
use crate::config::ScanConfig;
use crate::error::Pdf2TableError;
use crate::output::ImageReport;
use crate::scan::{detect_one, finish_one, instruction, materialise};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of image reports.
pub type ReportStream = Pin<Box<dyn Stream<Item = ImageReport> + Send>>;

/// Scan the configured PDF, streaming one report per extracted image.
///
/// Extraction runs to completion before the stream is returned, so no
/// request is in flight while the document is open. A failed extraction
/// yields an empty stream. `on_scan_complete` fires after the last report
/// has been yielded.
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use pdf2table::{scan_stream, ScanConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ScanConfig::builder().pdf_path("invoice.pdf").build()?;
/// let mut reports = scan_stream(&config).await?;
/// while let Some(report) = reports.next().await {
///     println!("{}: {}", report.file_name, report.text);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn scan_stream(config: &ScanConfig) -> Result<ReportStream, Pdf2TableError> {
    info!("Starting streaming scan: {}", config.pdf_path.display());

    let backend = build_backend(config).await?;
    let (images, extraction_error) = materialise(config).await;
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(images.len(), extraction_error.as_deref());
    }

    let total = images.len();
    let concurrency = config.concurrency.max(1);
    let config = Arc::new(config.clone());
    let instruction: Arc<str> = instruction(&config).into();
    let succeeded = Arc::new(AtomicUsize::new(0));

    let detect_config = Arc::clone(&config);
    let reports = stream::iter(images.into_iter().enumerate().map(move |(i, path)| {
        let backend = Arc::clone(&backend);
        let config = Arc::clone(&detect_config);
        let instruction = Arc::clone(&instruction);
        async move {
            detect_one(backend.as_ref(), i + 1, total, &path, &instruction, &config).await
        }
    }))
    .buffered(concurrency);

    let finish_config = Arc::clone(&config);
    let finish_succeeded = Arc::clone(&succeeded);
    let reports = reports.map(move |report| {
        finish_one(&report, total, &finish_config);
        if report.succeeded() {
            finish_succeeded.fetch_add(1, Ordering::Relaxed);
        }
        Some(report)
    });

    let done = stream::once(async move {
        if let Some(ref cb) = config.progress_callback {
            cb.on_scan_complete(total, succeeded.load(Ordering::Relaxed));
        }
        None
    });

    Ok(Box::pin(reports.chain(done).filter_map(|r| async move { r })))
}
