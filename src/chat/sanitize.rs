//! Best-effort scrubbing of visitor messages
//!
//! Removing marker strings lowers the odds of a casual prompt injection. It is
//! not a security boundary: the model still sees arbitrary visitor text.

use regex::Regex;
use std::sync::LazyLock;

/// Longest message forwarded upstream, in characters
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 500;

/// Bracketed role tags in any case, and `<|...|>` special tokens
static INJECTION_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[SYSTEM\]|\[INST\]|<\|[^\n]*?\|>").expect("marker pattern is valid")
});

/// Remove injection markers from `text`
///
/// Removal repeats until nothing matches, so nested markers such as
/// `[SYS[SYSTEM]TEM]` do not reassemble.
pub fn strip_markers(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = INJECTION_MARKERS.replace_all(&current, "");
        if next.len() == current.len() {
            return current;
        }
        current = next.into_owned();
    }
}

/// Scrub a visitor message and cut it to `max_chars` characters
pub fn sanitize_message(message: &str, max_chars: usize) -> String {
    let stripped = strip_markers(message);
    let cleaned: String = stripped
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    cleaned.trim().chars().take(max_chars).collect()
}
