//! User input sanitization
//!
//! Applied to every message before it reaches extraction or an LLM prompt.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Longest message accepted, in characters
pub const MAX_INPUT_CHARS: usize = 2000;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex"));

static JS_URI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)javascript\s*:").expect("valid regex"));

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("valid regex"));

/// Command chaining, substitution and redirection sequences
static SHELL_META: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\([^)]*\)|`[^`]*`|&&|\|\||[;|<>`$]").expect("valid regex"));

/// Clean untrusted user text
pub fn sanitize_input(raw: &str) -> String {
    let without_scripts = SCRIPT_BLOCK.replace_all(raw, " ");
    let without_js = JS_URI.replace_all(&without_scripts, "");
    let without_tags = HTML_TAG.replace_all(&without_js, " ");
    let without_shell = SHELL_META.replace_all(&without_tags, " ");
    let collapsed = without_shell.split_whitespace().collect::<Vec<_>>().join(" ");

    let cleaned: String = collapsed.chars().take(MAX_INPUT_CHARS).collect();
    if cleaned.len() != raw.len() {
        debug!(before = raw.len(), after = cleaned.len(), "sanitize_input: input altered");
    }
    cleaned
}
