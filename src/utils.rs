//! Small helpers shared by the pipeline stages.
//!
//! - String truncation for log fields and failure context
//! - JSON error classification and offset conversion
//! - Clock-time arithmetic for iqama offsets

use chrono::{NaiveTime, Timelike};

/// Largest char boundary in `s` that is `<= idx`.
fn floor_char_boundary(s: &str, idx: usize) -> usize {
    let mut idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with an
/// ellipsis and a count of the dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let cut = floor_char_boundary(s, max);
        format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
    }
}

/// Text within `radius` bytes either side of `offset`, clamped to the string
/// and to char boundaries.
pub fn context_window(s: &str, offset: usize, radius: usize) -> String {
    let start = floor_char_boundary(s, offset.saturating_sub(radius));
    let end = floor_char_boundary(s, offset.saturating_add(radius));
    s[start..end].to_string()
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// A payload cut off mid-object (e.g. the page was served partially) fails
/// with an EOF error rather than a syntax error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Convert serde_json's 1-based line/column into a byte offset into `s`.
///
/// serde_json counts columns in bytes since the last newline, so the result
/// points at the byte where decoding stopped.
pub fn line_col_to_offset(s: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let line_start: usize = s
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(s.len())
}

fn parse_clock(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Resolve an iqama entry against its adhan time.
///
/// Entries are either a signed minute offset (`"+15"`, `"-5"`, `"10"`) or an
/// absolute clock time (`"05:45"`), which is returned as-is. Offsets wrap
/// past midnight.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(apply_offset("05:10", "+20"), Some("05:30".to_string()));
/// assert_eq!(apply_offset("23:50", "+15"), Some("00:05".to_string()));
/// assert_eq!(apply_offset("13:00", "13:30"), Some("13:30".to_string()));
/// ```
pub fn apply_offset(adhan: &str, entry: &str) -> Option<String> {
    let entry = entry.trim();
    if let Some(clock) = parse_clock(entry) {
        return Some(clock.format("%H:%M").to_string());
    }
    let minutes: i64 = entry.trim_start_matches('+').parse().ok()?;
    let base = parse_clock(adhan)?;
    let total = i64::from(base.hour()) * 60 + i64::from(base.minute()) + minutes;
    let total = total.rem_euclid(24 * 60);
    Some(format!("{:02}:{:02}", total / 60, total % 60))
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
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        // "é" is two bytes; cutting at 1 must not split it.
        let result = truncate_for_log("éé", 1);
        assert_eq!(result, "…(+4 bytes)");
    }

    #[test]
    fn test_context_window_clamps() {
        let s = "0123456789";
        assert_eq!(context_window(s, 5, 2), "3456");
        assert_eq!(context_window(s, 1, 4), "01234");
        assert_eq!(context_window(s, 9, 4), "56789");
    }

    #[test]
    fn test_line_col_to_offset() {
        let s = "{\n  \"a\": 1,\n  x\n}";
        // line 3, column 3 is the `x`
        let offset = line_col_to_offset(s, 3, 3);
        assert_eq!(&s[offset..offset + 1], "x");
    }

    #[test]
    fn test_looks_truncated() {
        let json_eof = r#"{"field": "value"#;
        let result: Result<serde_json::Value, _> = serde_json::from_str(json_eof);
        if let Err(e) = result {
            assert!(looks_truncated(&e));
        }
    }

    #[test]
    fn test_apply_offset() {
        assert_eq!(apply_offset("05:10", "+20"), Some("05:30".to_string()));
        assert_eq!(apply_offset("12:50", "15"), Some("13:05".to_string()));
        assert_eq!(apply_offset("23:50", "+15"), Some("00:05".to_string()));
        assert_eq!(apply_offset("00:05", "-10"), Some("23:55".to_string()));
        assert_eq!(apply_offset("13:00", "13:30"), Some("13:30".to_string()));
        assert_eq!(apply_offset("13:00", "soon"), None);
        assert_eq!(apply_offset("noon", "+5"), None);
    }
}
