//! The silent-reply sentinel predicate.
//!
//! "No-reply" token parsing is an external collaborator consumed through a single predicate.
//! The real token layer (out of scope here) might recognise a whole family of model-specific
//! sentinels; this crate ships a small regex-anchored default so the coordinator is runnable
//! without that layer wired in.

use regex::Regex;
use std::sync::{Arc, LazyLock};

/// A predicate deciding whether a reply's text should be treated as silence for chaining
/// purposes, even though the agent technically produced text.
pub type SilentReplyPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

static SILENT_SENTINEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\[\s*no[\s_-]*reply\s*\]\s*$").expect("static sentinel regex is valid")
});

/// The default predicate: matches a bracketed `[no reply]` (case-insensitive, underscores or
/// dashes allowed) with nothing else on the line.
pub fn default_silent_reply_predicate() -> SilentReplyPredicate {
    Arc::new(|text: &str| SILENT_SENTINEL.is_match(text))
}
