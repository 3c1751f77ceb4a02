//! Eager (whole-document) scan entry points.
//!
//! [`scan`] materialises every embedded image, then runs each one through
//! the detection backend and returns only after all of them are done. Use
//! [`crate::stream::scan_stream`] to receive reports as they complete.

use crate::backend::{build_backend, DetectionBackend};
use crate::config::ScanConfig;
use crate::error::Pdf2TableError;
use crate::output::{ImageReport, ScanOutput, ScanStats};
use crate::pipeline::{detect, extract};
use crate::progress::notify_report;
use crate::prompts::DETECTION_INSTRUCTION;
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Scan the configured PDF for tables.
///
/// # Returns
/// `Ok(ScanOutput)` whenever the backend could be set up, including when
/// extraction failed (`output.extraction_error` is set and `images` is
/// empty) or individual images failed (`report.error` is set).
///
/// # Errors
/// Returns `Err(Pdf2TableError)` only when the backend cannot be built.
pub async fn scan(config: &ScanConfig) -> Result<ScanOutput, Pdf2TableError> {
    let total_start = Instant::now();
    info!("Starting scan: {}", config.pdf_path.display());

    // ── Step 1: Backend ──────────────────────────────────────────────────
    let backend = build_backend(config).await?;
    info!(
        "Detection backend: {} (model {})",
        backend.name(),
        config.effective_model()
    );

    // ── Step 2: Materialise images ───────────────────────────────────────
    let extraction_start = Instant::now();
    let (images, extraction_error) = materialise(config).await;
    let extraction_ms = extraction_start.elapsed().as_millis() as u64;
    info!("Extracted {} images", images.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(images.len(), extraction_error.as_deref());
    }

    // ── Step 3: Detect, in extraction order ──────────────────────────────
    let detection_start = Instant::now();
    let reports = detect_all(&backend, &images, config).await;
    let detection_ms = detection_start.elapsed().as_millis() as u64;

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let stats = ScanStats {
        extraction_ms,
        detection_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
        ..ScanStats::tally(&reports)
    };

    info!(
        "Scan complete: {}/{} images answered, {} tables, {}ms total",
        stats.succeeded, stats.images_found, stats.tables_found, stats.total_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_scan_complete(stats.images_found, stats.succeeded);
    }

    Ok(ScanOutput {
        pdf_path: config.pdf_path.clone(),
        output_dir: config.output_dir.clone(),
        images,
        extraction_error,
        reports,
        stats,
    })
}

/// Synchronous wrapper around [`scan`].
///
/// Creates a temporary tokio runtime internally.
pub fn scan_sync(config: &ScanConfig) -> Result<ScanOutput, Pdf2TableError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2TableError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(scan(config))
}

/// Materialise the images without contacting any backend.
///
/// Never fails: an extraction error is logged and yields an empty list.
pub async fn extract_only(config: &ScanConfig) -> Vec<PathBuf> {
    extract::extract_images(&config.pdf_path, &config.output_dir).await
}

/// Scan PDF bytes held in memory.
///
/// The bytes are written to a managed [`tempfile`] which is removed when
/// the scan returns; `config.pdf_path` is ignored.
pub async fn scan_bytes(bytes: &[u8], config: &ScanConfig) -> Result<ScanOutput, Pdf2TableError> {
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| Pdf2TableError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| Pdf2TableError::Internal(format!("tempfile write: {e}")))?;
    let config = ScanConfig {
        pdf_path: tmp.path().to_path_buf(),
        ..config.clone()
    };
    // `tmp` is dropped (and the file deleted) when `scan` returns
    scan(&config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Run the materializer, keeping the failure reason for the output.
pub(crate) async fn materialise(config: &ScanConfig) -> (Vec<PathBuf>, Option<String>) {
    match extract::try_extract_images(&config.pdf_path, &config.output_dir).await {
        Ok(images) => (images, None),
        Err(e) => {
            error!("Image extraction failed: {}", e);
            (Vec::new(), Some(e.to_string()))
        }
    }
}

/// The instruction in effect for this scan.
pub(crate) fn instruction(config: &ScanConfig) -> String {
    config
        .instruction
        .clone()
        .unwrap_or_else(|| DETECTION_INSTRUCTION.to_string())
}

/// Detect every image with at most `config.concurrency` requests in flight.
///
/// `buffered` (not `buffer_unordered`) keeps reports in extraction order,
/// and report lines and completion events are emitted from that ordered
/// output.
async fn detect_all(
    backend: &Arc<dyn DetectionBackend>,
    images: &[PathBuf],
    config: &ScanConfig,
) -> Vec<ImageReport> {
    let total = images.len();
    let instruction = instruction(config);

    stream::iter(images.iter().enumerate().map(|(i, path)| {
        let backend = Arc::clone(backend);
        let instruction = instruction.as_str();
        async move {
            let index = i + 1;
            detect_one(backend.as_ref(), index, total, path, instruction, config).await
        }
    }))
    .buffered(config.concurrency.max(1))
    .inspect(|report| finish_one(report, total, config))
    .collect()
    .await
}

/// Announce and detect one image. Completion is reported by [`finish_one`].
pub(crate) async fn detect_one(
    backend: &dyn DetectionBackend,
    index: usize,
    total: usize,
    path: &std::path::Path,
    instruction: &str,
    config: &ScanConfig,
) -> ImageReport {
    if let Some(ref cb) = config.progress_callback {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        cb.on_image_start(index, total, &name);
    }

    detect::detect_image(backend, index, path, instruction, config).await
}

/// Emit the report line and completion event for one image.
///
/// Must be called on reports in extraction order.
pub(crate) fn finish_one(report: &ImageReport, total: usize, config: &ScanConfig) {
    log_report(report);
    if let Some(ref cb) = config.progress_callback {
        notify_report(cb, total, report);
    }
}

fn log_report(report: &ImageReport) {
    let secs = report.elapsed_ms as f64 / 1000.0;
    match &report.error {
        None => info!(
            "Processed {} in {:.2}s\n{}",
            report.file_name, secs, report.text
        ),
        Some(e) => warn!(
            "Processed {} in {:.2}s with no result: {}",
            report.file_name, secs, e
        ),
    }
}
