//! Pipeline stages for PDF table scanning.
//!
//! Each submodule implements exactly one step.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ encode ──▶ backend ──▶ classify
//! (lopdf)    (base64)   (VLM)       (label)
//! ```
//!
//! 1. [`extract`]  — write every embedded image to `page_{p}_img_{i}.{ext}`;
//!    runs in `spawn_blocking` because parsing and inflating are CPU-bound
//! 2. [`encode`]   — base64-wrap each file for the request body
//! 3. [`detect`]   — one timed backend call per image, with optional retry
//!    of transient failures; the only stage with network I/O
//! 4. [`classify`] — label the verbatim answer (no table / table / other)

pub mod classify;
pub mod detect;
pub mod encode;
pub mod extract;
