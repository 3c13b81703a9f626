//! Text helpers shared by the session engine and its front ends

use once_cell::sync::Lazy;
use regex::Regex;

pub(crate) static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\+91[-\s]?)?[6-9]\d{9}").expect("phone pattern is valid"));
pub(crate) static UPI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[\w.\-]{2,}@(?:ybl|okaxis|oksbi|okhdfc|upi|paytm|ibl|axl)\b")
        .expect("upi pattern is valid")
});
static LONG_DIGITS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4,}\b").expect("digit pattern is valid"));

/// Truncate a string to a maximum byte length, ensuring valid UTF-8 boundaries.
/// Used for log previews.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len.saturating_sub(3);
        while !s.is_char_boundary(end) {
            end = end.saturating_sub(1);
        }
        format!("{}...", &s[..end])
    }
}

/// Keep at most `max_chars` characters, without any ellipsis
pub fn clip_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Mask phone numbers, UPI handles and digit runs of four or more
pub fn redact_sensitive(text: &str) -> String {
    let text = PHONE_RE.replace_all(text, "(phone)");
    let text = UPI_RE.replace_all(&text, "(upi)");
    LONG_DIGITS_RE.replace_all(&text, "[redacted]").into_owned()
}

/// Lowercase, drop punctuation and collapse whitespace. Two lines that only
/// differ in casing or punctuation normalize to the same string.
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
