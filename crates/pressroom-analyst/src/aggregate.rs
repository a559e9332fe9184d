//! Data-only aggregation over performance rows.
//!
//! These numbers come straight from the telemetry; the AI layer may
//! comment on them but never changes them.

use std::collections::BTreeMap;

use chrono::Timelike;
use serde::Serialize;

use pressroom_db::PerformanceRecordRow;

/// Best-performing channel, format, and posting hour, by mean
/// engagement rate.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Aggregates {
    pub best_channel: Option<String>,
    pub best_format: Option<String>,
    /// Hour-of-day slot like `"18:00-18:59"` (UTC).
    pub best_posting_window: Option<String>,
    /// Per channel, the format with the highest mean rate.
    pub preferred_formats: BTreeMap<String, String>,
}

#[must_use]
pub fn aggregate(rows: &[PerformanceRecordRow]) -> Aggregates {
    if rows.is_empty() {
        return Aggregates::default();
    }

    let best_channel = best_by_key(rows, |r| r.channel.clone());
    let best_format = best_by_key(rows, |r| r.format.clone());
    let best_posting_window =
        best_by_key(rows, |r| r.posted_at.hour()).map(|h| format!("{h:02}:00-{h:02}:59"));

    let mut preferred_formats = BTreeMap::new();
    let channels: Vec<String> = {
        let mut c: Vec<String> = rows.iter().map(|r| r.channel.clone()).collect();
        c.sort();
        c.dedup();
        c
    };
    for channel in channels {
        let channel_rows: Vec<PerformanceRecordRow> = rows
            .iter()
            .filter(|r| r.channel == channel)
            .cloned()
            .collect();
        if let Some(format) = best_by_key(&channel_rows, |r| r.format.clone()) {
            preferred_formats.insert(channel, format);
        }
    }

    Aggregates {
        best_channel,
        best_format,
        best_posting_window,
        preferred_formats,
    }
}

/// Groups rows by `key` and returns the key with the highest mean
/// engagement rate. Ties resolve to the first key in sort order, which
/// keeps the aggregation deterministic.
fn best_by_key<K: Ord + Clone>(
    rows: &[PerformanceRecordRow],
    key: impl Fn(&PerformanceRecordRow) -> K,
) -> Option<K> {
    let mut sums: BTreeMap<K, (f32, u32)> = BTreeMap::new();
    for row in rows {
        let entry = sums.entry(key(row)).or_insert((0.0, 0));
        entry.0 += row.engagement_rate;
        entry.1 += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    sums.into_iter()
        .map(|(k, (sum, count))| (k, sum / count as f32))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(k, _)| k)
}
