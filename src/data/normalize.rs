//! Normalizer: raw records → validated, per-variable ascending series

use std::collections::HashMap;

use chrono::NaiveDateTime;

use super::record::{EpochMillis, Point, RawRecord, Series, Variable, VariableId};
use crate::constants::ingest::{COMPACT_TIMESTAMP_LENGTH, LOCALIZED_FORMAT, TICKS_PER_MILLISECOND};

/// Normalized series plus the number of records that failed validation
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub series: Vec<Series>,
    pub dropped_count: usize,
}

/// Result of ingesting one batch of records
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    pub variables: Vec<Variable>,
    pub series: Vec<Series>,
    pub dropped_count: usize,
}

/// Parse a raw timestamp to epoch milliseconds.
///
/// Detection order: anything containing `/` is a localized
/// `dd/mm/yyyy hh:mm:ss`; exactly 14 digits is compact `yyyyMMddHHmmss`;
/// everything else is an integer tick count. Wall-clock text is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<EpochMillis> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.contains('/') {
        return parse_localized(trimmed);
    }

    if trimmed.len() == COMPACT_TIMESTAMP_LENGTH && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDateTime::parse_from_str(trimmed, "%Y%m%d%H%M%S")
            .ok()
            .map(|dt| dt.and_utc().timestamp_millis());
    }

    parse_ticks(trimmed)
}

fn parse_localized(s: &str) -> Option<EpochMillis> {
    const FALLBACKS: [&str; 2] = ["%d/%m/%Y %H:%M:%S%.f", "%d/%m/%Y %H:%M"];

    std::iter::once(LOCALIZED_FORMAT)
        .chain(FALLBACKS)
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn parse_ticks(s: &str) -> Option<EpochMillis> {
    if let Ok(ticks) = s.parse::<i64>() {
        return Some(ticks.div_euclid(TICKS_PER_MILLISECOND));
    }
    // Exported tick columns sometimes come through as floats ("6.38e17")
    let ticks = s.parse::<f64>().ok().filter(|t| t.is_finite())?;
    let millis = (ticks / TICKS_PER_MILLISECOND as f64).floor();
    // Same range as the integer path
    let limit = (i64::MAX / TICKS_PER_MILLISECOND) as f64;
    (millis.abs() <= limit).then_some(millis as i64)
}

/// Parse a value, accepting a decimal comma. Non-finite results are rejected.
pub fn parse_value(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replacen(',', ".", 1);
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Group records by variable, drop invalid rows, and sort each series.
///
/// Series come out in first-seen order of their variable. A variable whose
/// records were all dropped still gets an (empty) series.
pub fn normalize(raw: &[RawRecord]) -> Normalized {
    profiling::scope!("normalize");

    let mut index: HashMap<VariableId, usize> = HashMap::new();
    let mut grouped: Vec<(VariableId, Vec<Point>)> = Vec::new();
    let mut dropped_count = 0usize;

    for record in raw {
        let id = record.variable_id();
        let slot = match index.get(&id) {
            Some(&slot) => slot,
            None => {
                index.insert(id.clone(), grouped.len());
                grouped.push((id, Vec::new()));
                grouped.len() - 1
            }
        };

        match (
            parse_timestamp(&record.raw_timestamp),
            parse_value(&record.raw_value),
        ) {
            (Some(timestamp), Some(value)) => grouped[slot].1.push(Point { timestamp, value }),
            _ => dropped_count += 1,
        }
    }

    let series = grouped
        .into_iter()
        .map(|(id, mut points)| {
            // Stable: equal timestamps keep input order
            points.sort_by_key(|p| p.timestamp);
            Series::new(id, points)
        })
        .collect::<Vec<_>>();

    if dropped_count > 0 {
        tracing::debug!(
            records = raw.len(),
            dropped = dropped_count,
            "dropped malformed records during normalization"
        );
    }

    Normalized {
        series,
        dropped_count,
    }
}

/// Normalize a batch and derive its variables
pub fn ingest(raw: &[RawRecord]) -> IngestOutcome {
    let Normalized {
        series,
        dropped_count,
    } = normalize(raw);

    let variables = series
        .iter()
        .map(|s| Variable::new(s.variable.clone()))
        .collect();

    tracing::debug!(
        variables = series.len(),
        points = series.iter().map(Series::len).sum::<usize>(),
        dropped = dropped_count,
        "ingested record batch"
    );

    IngestOutcome {
        variables,
        series,
        dropped_count,
    }
}
