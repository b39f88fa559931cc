//! Core data model: raw records, variables, points, series and domains

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrendError};

/// Milliseconds since the Unix epoch
pub type EpochMillis = i64;

/// One row as produced by the file-parsing collaborator, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub series_key: String,
    pub aux_attribute: String,
    /// `dd/mm/yyyy hh:mm:ss`, compact `yyyyMMddHHmmss`, or integer ticks
    pub raw_timestamp: String,
    /// May use a decimal comma
    pub raw_value: String,
    pub quality: Option<i32>,
}

impl RawRecord {
    pub fn new(
        series_key: impl Into<String>,
        aux_attribute: impl Into<String>,
        raw_timestamp: impl Into<String>,
        raw_value: impl Into<String>,
    ) -> Self {
        Self {
            series_key: series_key.into(),
            aux_attribute: aux_attribute.into(),
            raw_timestamp: raw_timestamp.into(),
            raw_value: raw_value.into(),
            quality: None,
        }
    }

    pub fn variable_id(&self) -> VariableId {
        VariableId::new(self.series_key.clone(), self.aux_attribute.clone())
    }
}

/// Identity of a variable: the `(seriesKey, auxAttribute)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableId {
    pub series_key: String,
    pub aux_attribute: String,
}

impl VariableId {
    pub fn new(series_key: impl Into<String>, aux_attribute: impl Into<String>) -> Self {
        Self {
            series_key: series_key.into(),
            aux_attribute: aux_attribute.into(),
        }
    }

    /// `key (aux)`, or just `key` when the attribute is empty
    pub fn display_label(&self) -> String {
        if self.aux_attribute.is_empty() {
            self.series_key.clone()
        } else {
            format!("{} ({})", self.series_key, self.aux_attribute)
        }
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_label())
    }
}

/// A variable as shown in the selector. `selected` belongs to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub id: VariableId,
    pub display_label: String,
    pub selected: bool,
}

impl Variable {
    pub fn new(id: VariableId) -> Self {
        let display_label = id.display_label();
        Self {
            id,
            display_label,
            selected: false,
        }
    }
}

/// A single sample. Both fields are finite once normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub timestamp: EpochMillis,
    pub value: f64,
}

impl Point {
    pub fn new(timestamp: EpochMillis, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// One variable's points, ascending by timestamp.
///
/// Points sit behind an `Arc<[Point]>` so snapshots, render passes and the
/// stats worker share them without copying. A series is never edited in
/// place; merging builds a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub variable: VariableId,
    pub points: Arc<[Point]>,
}

impl Series {
    pub fn new(variable: VariableId, points: impl Into<Arc<[Point]>>) -> Self {
        Self {
            variable,
            points: points.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `[first, last]` timestamp, `None` when empty
    pub fn extent(&self) -> Option<Domain> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        Some(Domain {
            start: first.timestamp,
            end: last.timestamp,
        })
    }

    /// `(min, max)` over all values, `None` when empty
    pub fn value_extent(&self) -> Option<(f64, f64)> {
        value_extent(&self.points)
    }

    /// Points whose timestamp lies in `[domain.start, domain.end]`
    pub fn window(&self, domain: Domain) -> &[Point] {
        let start = self.points.partition_point(|p| p.timestamp < domain.start);
        let end = self.points.partition_point(|p| p.timestamp <= domain.end);
        if start >= end {
            return &[];
        }
        &self.points[start..end]
    }

    pub fn is_sorted(&self) -> bool {
        self.points
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp)
    }
}

/// `(min, max)` of the values in `points`
pub fn value_extent(points: &[Point]) -> Option<(f64, f64)> {
    let mut iter = points.iter();
    let first = iter.next()?.value;
    Some(iter.fold((first, first), |(lo, hi), p| (lo.min(p.value), hi.max(p.value))))
}

/// Inclusive time range shown and analyzed. Invariant: `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Domain {
    pub start: EpochMillis,
    pub end: EpochMillis,
}

impl Domain {
    pub fn new(start: EpochMillis, end: EpochMillis) -> Result<Self> {
        if start > end {
            return Err(TrendError::InvalidDomain { start, end });
        }
        Ok(Self { start, end })
    }

    /// Build a domain from two bounds in either order
    pub fn ordered(a: EpochMillis, b: EpochMillis) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn width(&self) -> EpochMillis {
        self.end.saturating_sub(self.start)
    }

    pub fn is_zero_width(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, t: EpochMillis) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn contains_domain(&self, other: &Domain) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Intersection with `bounds`, `None` when disjoint
    pub fn clamp_to(&self, bounds: &Domain) -> Option<Domain> {
        let start = self.start.max(bounds.start);
        let end = self.end.min(bounds.end);
        (start <= end).then_some(Domain { start, end })
    }

    /// Slide into `bounds` keeping the width; `bounds` itself when wider
    pub fn shift_into(&self, bounds: &Domain) -> Domain {
        let width = self.width();
        if width >= bounds.width() {
            *bounds
        } else if self.start < bounds.start {
            Domain {
                start: bounds.start,
                end: bounds.start + width,
            }
        } else if self.end > bounds.end {
            Domain {
                start: bounds.end - width,
                end: bounds.end,
            }
        } else {
            *self
        }
    }

    pub fn union(&self, other: &Domain) -> Domain {
        Domain {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Full extent over every non-empty series
    pub fn extent_of<'a>(series: impl IntoIterator<Item = &'a Series>) -> Option<Domain> {
        series
            .into_iter()
            .filter_map(Series::extent)
            .reduce(|acc, d| acc.union(&d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(points: &[(i64, f64)]) -> Series {
        Series::new(
            VariableId::new("T1", ""),
            points
                .iter()
                .map(|&(t, v)| Point::new(t, v))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_display_label() {
        assert_eq!(VariableId::new("RCP001MT", "").display_label(), "RCP001MT");
        assert_eq!(
            VariableId::new("RCP001MT", "°C").display_label(),
            "RCP001MT (°C)"
        );
        assert_eq!(Variable::new(VariableId::new("A", "b")).display_label, "A (b)");
    }

    #[test]
    fn test_domain_rejects_inverted_bounds() {
        assert!(Domain::new(10, 5).is_err());
        assert_eq!(Domain::ordered(10, 5), Domain { start: 5, end: 10 });
    }

    #[test]
    fn test_window_is_inclusive() {
        let s = series(&[(0, 1.0), (10, 2.0), (20, 3.0), (30, 4.0)]);
        let w = s.window(Domain::new(10, 20).unwrap());
        assert_eq!(w.len(), 2);
        assert_eq!(w[0].value, 2.0);
        assert_eq!(w[1].value, 3.0);

        assert!(s.window(Domain::new(11, 19).unwrap()).is_empty());
        assert_eq!(s.window(Domain::new(-100, 100).unwrap()).len(), 4);
    }

    #[test]
    fn test_extent_of_skips_empty_series() {
        let a = series(&[(5, 1.0), (9, 1.0)]);
        let b = series(&[]);
        let c = series(&[(2, 1.0), (7, 1.0)]);
        assert_eq!(
            Domain::extent_of([&a, &b, &c]),
            Some(Domain { start: 2, end: 9 })
        );
        assert_eq!(Domain::extent_of([&b]), None);
    }

    #[test]
    fn test_clamp_to() {
        let bounds = Domain::new(0, 100).unwrap();
        assert_eq!(
            Domain::new(-10, 50).unwrap().clamp_to(&bounds),
            Some(Domain { start: 0, end: 50 })
        );
        assert_eq!(Domain::new(200, 300).unwrap().clamp_to(&bounds), None);
    }

    #[test]
    fn test_shift_into_keeps_width() {
        let bounds = Domain::new(0, 100).unwrap();
        assert_eq!(
            Domain::new(-30, 10).unwrap().shift_into(&bounds),
            Domain { start: 0, end: 40 }
        );
        assert_eq!(
            Domain::new(90, 120).unwrap().shift_into(&bounds),
            Domain { start: 70, end: 100 }
        );
        assert_eq!(Domain::new(20, 30).unwrap().shift_into(&bounds), Domain { start: 20, end: 30 });
        assert_eq!(Domain::new(-10, 200).unwrap().shift_into(&bounds), bounds);
    }

    #[test]
    fn test_width_saturates_on_extreme_bounds() {
        let d = Domain::new(i64::MIN + 1, i64::MAX).unwrap();
        assert_eq!(d.width(), i64::MAX);
    }
}
