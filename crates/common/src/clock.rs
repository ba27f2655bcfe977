//! Wall-clock and timestamp utilities.
//!
//! Capture duration is never reported by the capture processes themselves.
//! It is derived from the UTC start time persisted in the session record,
//! so any process can compute it after a restart.

use chrono::{DateTime, Utc};

/// Seconds elapsed between `start` and now. Never negative, even if the
/// system clock stepped backwards since `start` was recorded.
pub fn elapsed_since(start: DateTime<Utc>) -> f64 {
    elapsed_between(start, Utc::now())
}

/// Seconds between two instants, clamped at zero.
pub fn elapsed_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let millis = (end - start).num_milliseconds();
    (millis.max(0) as f64) / 1000.0
}

/// Format seconds as an ffmpeg timestamp (`HH:MM:SS.mmm`).
pub fn ffmpeg_timestamp(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Human-readable duration: `M:SS`, or `H:MM:SS` past one hour.
pub fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Human-readable file size (e.g. `245.3 MB`).
pub fn format_filesize(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    }
}

/// Estimate the size of a trimmed clip from its share of the source bitrate.
pub fn estimate_trimmed_size(source_bytes: u64, source_secs: f64, trimmed_secs: f64) -> u64 {
    if source_secs <= 0.0 {
        return 0;
    }
    let ratio = (trimmed_secs / source_secs).clamp(0.0, 1.0);
    (source_bytes as f64 * ratio) as u64
}
