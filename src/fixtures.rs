//! Shared test data.

use crate::models::EnrichedRecord;
use chrono::{Duration, TimeZone, Utc};

/// A fully translated record; higher `i` means more recent.
pub fn record(i: usize) -> EnrichedRecord {
    EnrichedRecord {
        title: format!("今日のダーリン {i}"),
        author: "糸井重里".to_string(),
        body: vec![format!("第{i}段落。"), "「引用」と絵文字 🍵".to_string()],
        fingerprint: format!("{i:012x}"),
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 7, 0, 0).unwrap() + Duration::days(i as i64),
        translated_title: Some(format!("Today's Darling {i}")),
        translated_author: Some("Shigesato Itoi".to_string()),
        translated_body: Some(format!("Paragraph {i}.\n\n\"Quote\" & emoji 🍵")),
        summary: Some(format!("Summary {i}")),
    }
}

/// Records `0..n` ordered newest first, as the archive keeps them.
pub fn newest_first(n: usize) -> Vec<EnrichedRecord> {
    (0..n).rev().map(record).collect()
}
