//! Identifiers pulled out of what the remote party sends

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::{PHONE_RE, UPI_RE};

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)https?://[^\s]+").expect("url pattern is valid"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}\b").expect("email pattern is valid")
});
static IFSC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{4}0[A-Z0-9]{6}\b").expect("ifsc pattern is valid"));

/// Contact and payment details seen in inbound text, in order of first
/// appearance and without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDetails {
    pub phones: Vec<String>,
    pub upi_ids: Vec<String>,
    pub links: Vec<String>,
    pub emails: Vec<String>,
    pub ifsc_codes: Vec<String>,
}

impl ExtractedDetails {
    /// Scan every text in order
    pub fn from_texts<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut details = Self::default();
        for text in texts {
            details.scan(text);
        }
        details
    }

    pub fn scan(&mut self, text: &str) {
        for m in PHONE_RE.find_iter(text) {
            let digits: String = m
                .as_str()
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '+')
                .collect();
            push_unique(&mut self.phones, digits);
        }
        for m in UPI_RE.find_iter(text) {
            // "name@okaxis.com" is a mail address, not a handle
            if continues_as_domain(&text[m.end()..]) {
                continue;
            }
            push_unique(&mut self.upi_ids, m.as_str().to_lowercase());
        }
        for m in URL_RE.find_iter(text) {
            let link = m
                .as_str()
                .trim_end_matches(|c: char| matches!(c, '.' | ',' | ')' | ']' | '!' | '?' | '"' | '\''));
            push_unique(&mut self.links, link.to_string());
        }
        for m in EMAIL_RE.find_iter(text) {
            push_unique(&mut self.emails, m.as_str().to_lowercase());
        }
        for m in IFSC_RE.find_iter(text) {
            push_unique(&mut self.ifsc_codes, m.as_str().to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phones.is_empty()
            && self.upi_ids.is_empty()
            && self.links.is_empty()
            && self.emails.is_empty()
            && self.ifsc_codes.is_empty()
    }
}

fn continues_as_domain(rest: &str) -> bool {
    let mut chars = rest.chars();
    chars.next() == Some('.') && chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}
