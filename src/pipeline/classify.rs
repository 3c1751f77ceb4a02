//! Classification of a backend answer.
//!
//! The answer is never rewritten: the pipeline reports it verbatim. This
//! module only labels it so callers (and the summary line) can tell "the
//! model found no table" apart from "the model produced a table" without
//! re-parsing the text themselves.
//!
//! The check is shallow. A Markdown table is recognised by the
//! presence of a header separator row (`| --- | :---: |`); whether the rest
//! of the table is well formed is not examined.

use crate::prompts::NO_TABLE_SENTINEL;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Label attached to each answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The answer is the no-table sentinel.
    NoTable,
    /// The answer contains a Markdown table.
    Table,
    /// Non-empty text that is neither of the above.
    Unrecognised,
    /// Empty answer; the failed state of a detection call.
    Empty,
}

static RE_SEPARATOR_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\|?(\s*:?-{3,}:?\s*\|)+\s*(:?-{3,}:?\s*)?$").unwrap());

/// Label `text` without altering it.
pub fn classify(text: &str) -> Verdict {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Verdict::Empty;
    }
    if RE_SEPARATOR_ROW.is_match(trimmed) {
        return Verdict::Table;
    }
    if is_sentinel(trimmed) {
        return Verdict::NoTable;
    }
    Verdict::Unrecognised
}

/// Models tend to decorate the sentinel with quotes or a full stop.
fn is_sentinel(text: &str) -> bool {
    let bare = text.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '\'' | '"' | '`' | '.' | '。' | '!' | '*')
    });
    bare.eq_ignore_ascii_case(NO_TABLE_SENTINEL)
}
