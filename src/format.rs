//! Display formatting for numbers, durations, instants and sizes

use chrono::DateTime;

use crate::data::record::EpochMillis;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Scientific with 3 fractional digits for very small or large magnitudes,
/// fixed with 3 decimals otherwise
pub fn format_number(x: f64) -> String {
    let magnitude = x.abs();
    if x != 0.0 && (magnitude < 0.001 || magnitude >= 10_000.0) {
        format!("{x:.3e}")
    } else {
        format!("{x:.3}")
    }
}

/// `"5.5h"` under 48 hours, `"3j 4.0h"` (days, remaining hours) otherwise
pub fn format_duration(start: EpochMillis, end: EpochMillis) -> String {
    let hours = end.saturating_sub(start).unsigned_abs() as f64 / MS_PER_HOUR;
    if hours < 48.0 {
        format!("{hours:.1}h")
    } else {
        let days = (hours / 24.0).floor();
        format!("{}j {:.1}h", days as i64, hours - days * 24.0)
    }
}

fn format_with(ms: EpochMillis, pattern: &str) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format(pattern).to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// `dd/mm/yyyy HH:MM:SS` (UTC)
pub fn format_timestamp(ms: EpochMillis) -> String {
    format_with(ms, "%d/%m/%Y %H:%M:%S")
}

/// `dd/mm/yy HH:MM` (UTC)
pub fn format_axis_tick(ms: EpochMillis) -> String {
    format_with(ms, "%d/%m/%y %H:%M")
}

pub fn format_file_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}
