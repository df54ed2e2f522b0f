use once_cell::sync::Lazy;
use regex::Regex;

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("invalid think block regex"));

static UNCLOSED_THINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<think>.*$").expect("invalid unclosed think regex"));

/// Remove `<think>` reasoning blocks emitted by local reasoning models.
///
/// An unterminated block swallows the rest of the response.
pub fn strip_think_blocks(input: &str) -> String {
    let closed = THINK_BLOCK.replace_all(input, "");
    UNCLOSED_THINK.replace(&closed, "").trim().to_string()
}
