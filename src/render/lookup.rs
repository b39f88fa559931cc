//! Point lookup by time over ascending series

use serde::{Deserialize, Serialize};

use crate::data::record::{EpochMillis, Point, Series, VariableId};

/// Index of the sample closest to `t`.
///
/// Bisects for the insertion index, then compares the two bracketing
/// samples. When both are equally far the earlier sample wins. At either
/// end of the sequence the only neighbour is returned.
pub fn nearest_index(points: &[Point], t: EpochMillis) -> Option<usize> {
    if points.is_empty() {
        return None;
    }

    let i = points.partition_point(|p| p.timestamp < t);
    if i == 0 {
        return Some(0);
    }
    if i == points.len() {
        return Some(points.len() - 1);
    }

    let before = t.abs_diff(points[i - 1].timestamp);
    let after = points[i].timestamp.abs_diff(t);
    Some(if after < before { i } else { i - 1 })
}

pub fn nearest_point(points: &[Point], t: EpochMillis) -> Option<Point> {
    nearest_index(points, t).map(|i| points[i])
}

/// A point tagged with the variable it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedPoint {
    pub variable: VariableId,
    pub point: Point,
}

/// Every point within `[t - before_ms, t + after_ms]` across `series`,
/// ordered by timestamp (ties keep series order)
pub fn records_around(
    series: &[Series],
    t: EpochMillis,
    before_ms: EpochMillis,
    after_ms: EpochMillis,
) -> Vec<TaggedPoint> {
    let window = crate::data::record::Domain::ordered(
        t.saturating_sub(before_ms),
        t.saturating_add(after_ms),
    );

    let mut records: Vec<TaggedPoint> = series
        .iter()
        .flat_map(|s| {
            s.window(window).iter().map(|p| TaggedPoint {
                variable: s.variable.clone(),
                point: *p,
            })
        })
        .collect();
    records.sort_by_key(|r| r.point.timestamp);
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(ts: &[i64]) -> Vec<Point> {
        ts.iter().map(|&t| Point::new(t, t as f64)).collect()
    }

    #[test]
    fn test_nearest_picks_closer_neighbour() {
        let points = pts(&[0, 10, 20]);
        assert_eq!(nearest_point(&points, 3).unwrap().timestamp, 0);
        assert_eq!(nearest_point(&points, 7).unwrap().timestamp, 10);
        assert_eq!(nearest_point(&points, 10).unwrap().timestamp, 10);
    }

    #[test]
    fn test_equidistant_resolves_to_earlier() {
        let points = pts(&[100, 200]);
        assert_eq!(nearest_point(&points, 150).unwrap().timestamp, 100);
    }

    #[test]
    fn test_boundaries_and_empty() {
        let points = pts(&[100, 200]);
        assert_eq!(nearest_index(&points, -5), Some(0));
        assert_eq!(nearest_index(&points, 999), Some(1));
        assert_eq!(nearest_index(&[], 5), None);
        assert_eq!(nearest_index(&pts(&[42]), 0), Some(0));
    }

    #[test]
    fn test_records_around_merges_series() {
        let a = Series::new(VariableId::new("A", ""), pts(&[0, 5_000, 30_000]));
        let b = Series::new(VariableId::new("B", ""), pts(&[4_000, 12_000]));
        let out = records_around(&[a, b], 5_000, 10_000, 10_000);
        let ts: Vec<i64> = out.iter().map(|r| r.point.timestamp).collect();
        assert_eq!(ts, vec![0, 4_000, 5_000, 12_000]);
        assert_eq!(out[1].variable, VariableId::new("B", ""));
    }
}
