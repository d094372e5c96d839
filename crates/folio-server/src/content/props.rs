//! Article header parsing.
//!
//! Articles open with `Key: value` lines; the first line that does not look like
//! a header ends the block.
//!
//! ```text
//! Title: Hello
//! Author: Ann
//! Date: 2011-03-14
//! Categories: notes, rust
//!
//! Body starts here.
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9 _-]*):\s*(.*?)\s*$").expect("valid header regex"));

pub(crate) static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}\b").expect("valid year regex"));

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%a %b %d %Y %H:%M:%S",
];

const DAY_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %B %Y", "%B %d, %Y"];

/// Header values keyed by lowercased name, plus the remaining markdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleProps {
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ArticleProps {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// A comma separated header as a list, empty items dropped.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub fn parse_props(text: &str) -> ArticleProps {
    let mut headers = BTreeMap::new();
    let mut rest = text;

    while !rest.is_empty() {
        let (line, tail) = match rest.split_once('\n') {
            Some((line, tail)) => (line, tail),
            None => (rest, ""),
        };
        let Some(caps) = HEADER_RE.captures(line.trim_end_matches('\r')) else {
            break;
        };
        headers.insert(caps[1].trim().to_ascii_lowercase(), caps[2].to_string());
        rest = tail;
    }

    ArticleProps {
        headers,
        body: rest.trim_start_matches(['\r', '\n']).to_string(),
    }
}

/// Best-effort parse of the free-form dates found in article headers.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.naive_utc());
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            DAY_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
