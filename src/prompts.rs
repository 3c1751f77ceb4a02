//! Fixed prompts sent to every detection backend.
//!
//! All three backends receive the same instruction, so a result from the
//! local model and one from the hosted model are directly comparable.
//! Callers can override both via [`crate::config::ScanConfig::instruction`]
//! and [`crate::config::ScanConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

/// Answer the model is told to give when the image holds no table.
///
/// Passed through to the caller verbatim; [`crate::pipeline::classify`]
/// recognises it.
pub const NO_TABLE_SENTINEL: &str = "No table";

/// Three-step detection instruction: detect, extract, format.
pub const DETECTION_INSTRUCTION: &str = "Follow these steps strictly:\n\
1. Decide whether the image contains a table. If it does not, reply with exactly 'No table' and nothing else.\n\
2. If it does, extract the complete content of the table.\n\
3. Convert it into a correctly formatted Markdown table (make sure the columns are aligned).";

/// Persona for chat-style backends (system role message).
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an image-content-extraction assistant.";
