use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref EMAIL_RE: Regex =
        Regex::new(r"(?i)\b[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}\b").unwrap();
    static ref URL_RE: Regex = Regex::new(r#"https?://[^\s<>"')\]]+"#).unwrap();
    // 011 555 1234, (012) 345-6789, +27 11 555 1234
    static ref PHONE_RE: Regex =
        Regex::new(r"(?:\+27|0)[\s\-]?\(?\d{2}\)?[\s\-]?\d{3}[\s\-]?\d{4}\b").unwrap();
    static ref VENUE_RE: Regex = Regex::new(
        r"(?i)\b(boardroom|building|house|hall|room|centre|center|street|road|offices?\s+of)\b"
    )
    .unwrap();
    static ref AT_PREFIX_RE: Regex = Regex::new(r"\bat\s+(.{5,})$").unwrap();
}

/// Collapse runs of whitespace to single spaces and trim the ends.
pub fn squash_whitespace(raw: &str) -> String {
    WHITESPACE_RE.replace_all(raw.trim(), " ").into_owned()
}

/// Squash whitespace and map the empty result to `None`.
///
/// This is the canonical treatment of every free-text field before it
/// reaches the relational store.
pub fn clean_text(raw: &str) -> Option<String> {
    let squashed = squash_whitespace(raw);
    if squashed.is_empty() {
        None
    } else {
        Some(squashed)
    }
}

/// Decode the handful of HTML entities that survive the scrapers'
/// text extraction, plus literal non-breaking spaces.
pub fn clean_htmlish(raw: &str) -> String {
    raw.replace("&nbsp;", " ")
        .replace('\u{a0}', " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// All distinct email addresses in first-seen order, lowercased.
pub fn extract_emails(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    EMAIL_RE
        .find_iter(raw)
        .map(|m| m.as_str().to_ascii_lowercase())
        .filter(|email| seen.insert(email.clone()))
        .collect()
}

/// All distinct http(s) URLs in first-seen order.
///
/// Trailing sentence punctuation is stripped so prose like
/// "see https://example.com/doc.pdf." yields a clean link.
pub fn extract_urls(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    URL_RE
        .find_iter(raw)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':']).to_string())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// First South-African-style phone number in the text, verbatim.
pub fn extract_phone(raw: &str) -> Option<String> {
    PHONE_RE.find(raw).map(|m| m.as_str().to_string())
}

pub fn line_has_venue_keyword(line: &str) -> bool {
    VENUE_RE.is_match(line)
}

/// Best-effort venue recovery from a single line.
///
/// A line containing any venue keyword is returned verbatim; otherwise
/// text following a lowercase `at ` of at least five characters wins;
/// otherwise `None`.
pub fn guess_venue_from_line(line: &str) -> Option<String> {
    let squashed = squash_whitespace(line);
    if squashed.is_empty() {
        return None;
    }

    if VENUE_RE.is_match(&squashed) {
        return Some(squashed);
    }

    AT_PREFIX_RE
        .captures(&squashed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}
