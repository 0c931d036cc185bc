//! Normalization of text returned by the conversion service

use regex::Regex;
use std::sync::OnceLock;

fn space_before_closing() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+([,.)])").expect("valid regex"))
}

fn space_after_opening() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(\s+").expect("valid regex"))
}

fn sentence_punctuation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([.,])").expect("valid regex"))
}

/// Tidy whitespace around punctuation and collapse whitespace runs.
///
/// Whitespace before `,` `.` `)` and after `(` is removed, `.` and `,` are
/// followed by exactly one space, and every remaining run of whitespace
/// (newlines included) becomes a single space. Applying it twice gives the
/// same result as applying it once.
pub fn clean_text(text: &str) -> String {
    let text = space_before_closing().replace_all(text, "$1");
    let text = space_after_opening().replace_all(&text, "(");
    let text = sentence_punctuation().replace_all(&text, "$1 ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
