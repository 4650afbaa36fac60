//! Turning an extracted body into canonical paragraphs and a fingerprint.
//!
//! The fingerprint depends on the canonical body alone. Two extractions of
//! the same essay get the same fingerprint even when their titles or authors
//! differ, which is what lets the archive recognise a repeat.

use crate::config::NormalizeConfig;
use crate::models::{CandidateRecord, CanonicalRecord};
use crate::utils::is_wide;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

/// A blank line, possibly holding stray spaces or ideographic spaces.
static BLANK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[\t \x{3000}]*\n").expect("static regex"));

/// Clean `candidate`'s body into paragraphs and fingerprint it.
///
/// Missing title or author become empty strings; the extractor fills both
/// before a candidate reaches this point.
#[instrument(level = "info", skip_all)]
pub fn normalize(
    candidate: CandidateRecord,
    config: &NormalizeConfig,
    created_at: DateTime<Utc>,
) -> CanonicalRecord {
    let body = canonical_paragraphs(candidate.body.as_deref().unwrap_or(""), &config.footer_marker);
    let fingerprint = fingerprint(&body, config.fingerprint_len);
    debug!(paragraphs = body.len(), %fingerprint, "Normalized body");

    CanonicalRecord {
        title: candidate.title.unwrap_or_default().trim().to_string(),
        author: candidate.author.unwrap_or_default().trim().to_string(),
        body,
        fingerprint,
        created_at,
    }
}

/// Split `body` on blank lines and clean each paragraph.
///
/// Lines containing `footer_marker` are dropped, remaining line breaks
/// inside a paragraph are collapsed, and empty or repeated paragraphs are
/// removed (first occurrence wins).
pub fn canonical_paragraphs(body: &str, footer_marker: &str) -> Vec<String> {
    let body = body.replace("\r\n", "\n").replace('\r', "\n");
    BLANK_LINE
        .split(&body)
        .map(|paragraph| clean_paragraph(paragraph, footer_marker))
        .filter(|p| !p.is_empty())
        .unique()
        .collect()
}

fn clean_paragraph(paragraph: &str, footer_marker: &str) -> String {
    let mut out = String::new();
    for line in paragraph.lines() {
        if !footer_marker.is_empty() && line.contains(footer_marker) {
            continue;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let (Some(prev), Some(next)) = (out.chars().last(), line.chars().next()) {
            if !is_wide(prev) && !is_wide(next) {
                out.push(' ');
            }
        }
        out.push_str(line);
    }
    out
}

/// First `len` hex characters of the SHA-256 of the paragraphs joined by blank lines.
pub fn fingerprint(paragraphs: &[String], len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(paragraphs.join("\n\n").as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(len);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOOTER: &str = "ほぼ日の更新時間";

    fn candidate(title: &str, body: &str) -> CandidateRecord {
        CandidateRecord {
            title: Some(title.to_string()),
            author: Some("糸井重里".to_string()),
            body: Some(body.to_string()),
        }
    }

    fn now() -> DateTime<Utc> {
        "2025-05-06T07:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_repeated_paragraph_keeps_first() {
        let paragraphs = canonical_paragraphs("甲。\n\n乙。\n\n甲。\n\n丙。", FOOTER);
        assert_eq!(paragraphs, vec!["甲。", "乙。", "丙。"]);
    }

    #[test]
    fn test_footer_lines_removed() {
        let body = "本文。\n\nほぼ日の更新時間は毎日午前11時です。\n\n結び。";
        assert_eq!(canonical_paragraphs(body, FOOTER), vec!["本文。", "結び。"]);
    }

    #[test]
    fn test_footer_line_inside_paragraph() {
        let body = "一行目。\nほぼ日の更新時間：11時\n二行目。";
        assert_eq!(canonical_paragraphs(body, FOOTER), vec!["一行目。二行目。"]);
    }

    #[test]
    fn test_single_line_breaks_collapsed() {
        assert_eq!(
            canonical_paragraphs("  今日は\n  晴れ。  \n\nIt was\nsunny.", FOOTER),
            vec!["今日は晴れ。", "It was sunny."]
        );
    }

    #[test]
    fn test_blank_lines_with_whitespace_split() {
        let body = "甲。\n \u{3000}\n乙。\r\n\r\n\r\n丙。";
        assert_eq!(canonical_paragraphs(body, FOOTER), vec!["甲。", "乙。", "丙。"]);
    }

    #[test]
    fn test_fingerprint_is_stable_and_sized() {
        let paragraphs = vec!["甲。".to_string(), "乙。".to_string()];
        let a = fingerprint(&paragraphs, 12);
        let b = fingerprint(&paragraphs, 12);
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, fingerprint(&["甲。".to_string()], 12));
    }

    #[test]
    fn test_fingerprint_ignores_title() {
        let config = NormalizeConfig::default();
        let body = "同じ本文。\n\n同じ結び。";
        let a = normalize(candidate("タイトルA", body), &config, now());
        let b = normalize(candidate("タイトルB", body), &config, now());
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.title, b.title);
    }

    #[test]
    fn test_fingerprint_ignores_cosmetic_differences() {
        let config = NormalizeConfig::default();
        let a = normalize(candidate("t", "甲。\n\n乙。"), &config, now());
        let b = normalize(candidate("t", "  甲。 \n\n\n乙。\n\n甲。\n\nほぼ日の更新時間"), &config, now());
        assert_eq!(a.body, b.body);
        assert_eq!(a.fingerprint, b.fingerprint);
    }
}
