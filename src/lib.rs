//! # pdf2table
//!
//! Find tables in the images embedded in a PDF and transcribe them to
//! Markdown using a Vision Language Model (VLM).
//!
//! Scanned reports and image-only PDFs carry their tables as pictures, out
//! of reach of text extraction. This crate pulls every embedded raster image
//! out of the document as-is and asks a VLM, one image at a time, whether it
//! holds a table and what the table says.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract  embedded images → page_{p}_img_{i}.{ext} (spawn_blocking)
//!  ├─ 2. Encode   file bytes → base64
//!  ├─ 3. Detect   local Ollama / hosted chat endpoint / edgequake-llm provider
//!  ├─ 4. Classify "No table" / Markdown table / other (answer kept verbatim)
//!  └─ 5. Report   per-image text + timing, in extraction order
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2table::{scan, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Local Ollama at http://localhost:11434 with minicpm-v
//!     let config = ScanConfig::builder()
//!         .pdf_path("pdf_with_table.pdf")
//!         .output_dir("output_folder")
//!         .build()?;
//!     let output = scan(&config).await?;
//!     for report in &output.reports {
//!         println!("{} ({} ms)\n{}", report.file_name, report.elapsed_ms, report.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2table` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2table = { version = "0.1", default-features = false }
//! ```
//!
//! ## Backends
//!
//! | Kind | Endpoint | Default model |
//! |------|----------|---------------|
//! | `local`    | `POST /api/generate` (Ollama) | `minicpm-v:latest` |
//! | `hosted`   | `POST {base}/chat/completions` + bearer key | `qwen2.5-vl-72b-instruct` |
//! | `provider` | any `edgequake-llm` vision provider | `gpt-4.1-nano` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod scan;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{DetectionBackend, HostedBackend, LocalBackend, ProviderBackend};
pub use config::{BackendKind, ScanConfig, ScanConfigBuilder};
pub use error::{DetectError, ExtractError, ImageError, Pdf2TableError};
pub use output::{ImageReport, ScanOutput, ScanStats};
pub use pipeline::classify::{classify, Verdict};
pub use pipeline::encode::{encode_image, image_to_base64, EncodedImage};
pub use pipeline::extract::{extract_images, try_extract_images};
pub use progress::{NoopProgressCallback, ProgressCallback, ScanProgressCallback};
pub use prompts::{DETECTION_INSTRUCTION, NO_TABLE_SENTINEL};
pub use scan::{extract_only, scan, scan_bytes, scan_sync};
pub use stream::{scan_stream, ReportStream};
