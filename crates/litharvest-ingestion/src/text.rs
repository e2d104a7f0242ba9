//! Pure text helpers shared by every source adapter: markup stripping,
//! entity decoding, date normalisation, language heuristics and keyword
//! matching.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

/// Abstracts are cut to this many characters after cleaning.
pub const ABSTRACT_MAX_CHARS: usize = 500;

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"))
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// Decodes the handful of named entities upstream payloads actually carry.
/// `&amp;` goes last so `&amp;lt;` decodes to `&lt;`, not `<`.
pub fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Collapses runs of whitespace to a single space and trims.
pub fn collapse_whitespace(text: &str) -> String {
    whitespace_regex().replace_all(text, " ").trim().to_string()
}

/// Strips markup tags (HTML or JATS), decodes entities, collapses whitespace.
pub fn clean_text(text: &str) -> String {
    let stripped = tag_regex().replace_all(text, "");
    collapse_whitespace(&decode_entities(&stripped))
}

/// Truncates to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Cleaned abstract capped at [`ABSTRACT_MAX_CHARS`].
pub fn clean_abstract(text: &str) -> String {
    truncate_chars(&clean_text(text), ABSTRACT_MAX_CHARS)
}

/// Opaque record identifier; never derived from content.
pub fn generate_id() -> Uuid {
    Uuid::new_v4()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn month_from_name(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1, "feb" => 2, "mar" => 3, "apr" => 4,
        "may" => 5, "jun" => 6, "jul" => 7, "aug" => 8,
        "sep" => 9, "oct" => 10, "nov" => 11, "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn parse_year(token: &str) -> Option<i32> {
    if token.len() == 4 && token.chars().all(|c| c.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

/// Normalises the date spellings seen across providers into a calendar date.
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DD` (optionally followed by a time),
/// `YYYY/MM/DD`, `YYYY-MM`, `YYYY`, and PubMed's `YYYY Mon DD` / `YYYY Mon`.
/// Missing month or day default to 1.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }

    if let Some(head) = raw.get(..10) {
        for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
            if let Ok(d) = NaiveDate::parse_from_str(head, fmt) {
                return Some(d);
            }
        }
    }

    // YYYY-MM and YYYY
    let numeric: Vec<&str> = raw.split('-').collect();
    if numeric.len() <= 2 && numeric.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())) {
        let year = parse_year(numeric[0])?;
        let month = numeric.get(1).and_then(|m| m.parse().ok()).unwrap_or(1);
        return NaiveDate::from_ymd_opt(year, month, 1);
    }

    // 2024 Mar 15, 2024 Mar, 2024 Mar-Apr, 2024 Spring
    let mut parts = raw.split_whitespace();
    let year = parse_year(parts.next()?)?;
    let month = parts.next().and_then(month_from_name).unwrap_or(1);
    let day = parts
        .next()
        .and_then(|d| d.trim_end_matches(',').parse::<u32>().ok())
        .unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, day).or_else(|| NaiveDate::from_ymd_opt(year, month, 1))
}

/// Normalised date, falling back to today when absent or unparseable.
pub fn date_or_today(raw: Option<&str>) -> NaiveDate {
    raw.and_then(normalize_date).unwrap_or_else(today)
}

/// Best-effort script heuristic. Non-authoritative: mixed-script titles and
/// transliterations are classified by the first matching block in this order.
pub fn detect_language(text: &str) -> &'static str {
    let has = |lo: u32, hi: u32| text.chars().any(|c| (lo..=hi).contains(&(c as u32)));

    if has(0x0400, 0x04FF) {
        "ru"
    } else if has(0x4E00, 0x9FFF) {
        "zh"
    } else if has(0x3040, 0x30FF) {
        "ja"
    } else if has(0xAC00, 0xD7AF) {
        "ko"
    } else if has(0x0590, 0x05FF) {
        "he"
    } else if has(0x0600, 0x06FF) {
        "ar"
    } else {
        "en"
    }
}

/// Provider-declared language when present, heuristic over the title otherwise.
pub fn resolve_language(declared: Option<&str>, title: &str) -> String {
    match declared.map(str::trim).filter(|l| !l.is_empty()) {
        Some(lang) => lang.to_lowercase(),
        None => detect_language(title).to_string(),
    }
}

/// Lowercased whitespace-split keyword tokens.
pub fn keyword_tokens(keywords: &str) -> Vec<String> {
    keywords.split_whitespace().map(str::to_lowercase).collect()
}

/// True when `text` contains at least one token (case-insensitive substring).
pub fn contains_any_keyword(text: &str, tokens: &[String]) -> bool {
    let lower = text.to_lowercase();
    tokens.iter().any(|t| lower.contains(t.as_str()))
}
