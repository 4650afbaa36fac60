//! Small helpers shared by the pipeline stages.
//!
//! - Log-friendly truncation of long (often Japanese) strings
//! - Kana detection for the main-content extraction fallback
//! - The dated placeholder title
//! - Output directory checks and atomic file replacement

use crate::error::PipelineError;
use chrono::NaiveDate;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

/// Truncate a string for logging purposes.
///
/// Keeps at most `max` characters and appends an ellipsis with the number
/// of characters dropped. Counts characters, not bytes, so multi-byte text
/// is never split inside a code point.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("あいうえお", 2), "あい…(+3 chars)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}…(+{} chars)", head, total - max)
    }
}

/// True for hiragana and katakana code points.
pub fn is_kana(c: char) -> bool {
    ('\u{3040}'..='\u{30ff}').contains(&c)
}

/// True for characters typically written without surrounding spaces
/// (kana, CJK ideographs, full-width punctuation).
pub fn is_wide(c: char) -> bool {
    matches!(c,
        '\u{3000}'..='\u{30ff}'
        | '\u{3400}'..='\u{4dbf}'
        | '\u{4e00}'..='\u{9fff}'
        | '\u{f900}'..='\u{faff}'
        | '\u{ff00}'..='\u{ffef}')
}

/// Placeholder title used when the page yields none, e.g. `今日のダーリン - 2025年05月06日`.
pub fn dated_title(label: &str, date: NaiveDate) -> String {
    format!("{} - {}", label, date.format("%Y年%m月%d日"))
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then probes it with a temporary file
/// that is removed again on drop.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn ensure_writable_dir(path: &Path) -> Result<(), PipelineError> {
    if path.exists() && !path.is_dir() {
        return Err(PipelineError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a directory", path.display()),
        )));
    }
    std::fs::create_dir_all(path)?;
    NamedTempFile::new_in(path)?;
    info!("Output directory is writable");
    Ok(())
}

/// Replace `target` with `contents` in one step.
///
/// Writes a temporary file next to the target, syncs it and renames it over
/// the old file. Either the old or the new contents are visible, never a mix.
#[instrument(level = "debug", skip_all, fields(path = %target.display()))]
pub fn write_atomic(target: &Path, contents: &str) -> Result<(), PipelineError> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(target).map_err(|e| PipelineError::Io(e.error))?;
    debug!(bytes = contents.len(), "Replaced file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "あ".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"あ".repeat(100)));
        assert!(result.ends_with("…(+400 chars)"));
    }

    #[test]
    fn test_is_kana() {
        assert!(is_kana('あ'));
        assert!(is_kana('ダ'));
        assert!(!is_kana('糸'));
        assert!(!is_kana('a'));
    }

    #[test]
    fn test_is_wide() {
        assert!(is_wide('糸'));
        assert!(is_wide('。'));
        assert!(is_wide('！'));
        assert!(!is_wide('a'));
        assert!(!is_wide('.'));
    }

    #[test]
    fn test_dated_title() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 6).unwrap();
        assert_eq!(dated_title("今日のダーリン", date), "今日のダーリン - 2025年05月06日");
    }

    #[test]
    fn test_write_atomic_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("feed.xml");
        write_atomic(&target, "first").unwrap();
        write_atomic(&target, "second").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_ensure_writable_dir_creates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("docs");
        ensure_writable_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_ensure_writable_dir_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not_a_dir");
        std::fs::write(&file, "x").unwrap();
        assert!(ensure_writable_dir(&file).is_err());
    }
}
