use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a block timestamp as RFC 3339 in UTC, whole seconds.
///
/// # Examples
/// ```
/// use chrono::DateTime;
/// use rs_block_enricher::utils::format::format_timestamp;
///
/// let ts = DateTime::from_timestamp(1690459211, 0).unwrap();
/// assert_eq!(format_timestamp(&ts), "2023-07-27T12:00:11Z");
/// ```
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Render per-class counts as `class=count` pairs, sorted by class.
pub fn format_class_counts(counts: &BTreeMap<String, u64>) -> String {
    counts
        .iter()
        .map(|(class, count)| format!("{class}={count}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Render a percentage with two decimals.
pub fn format_percent(pct: f64) -> String {
    format!("{pct:.2}%")
}
