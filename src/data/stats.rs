//! StatisticsEngine: descriptive statistics over the points of a window

use serde::{Deserialize, Serialize};

use super::record::{Domain, Series, VariableId};

/// Descriptive statistics over the points of one window
///
/// `std_dev` is the population standard deviation (squared deviations are
/// divided by `count`, not `count - 1`). Sums are plain, uncompensated
/// `f64` additions, so precision degrades on very large windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

impl WindowStats {
    /// Compute statistics, `None` for an empty input
    pub fn compute(values: &[f64]) -> Option<WindowStats> {
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let sum: f64 = values.iter().sum();
        let mean = sum / count as f64;

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        } else {
            sorted[count / 2]
        };

        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

        Some(WindowStats {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median,
            std_dev: variance.sqrt(),
        })
    }
}

/// Statistics for one variable; `stats` is `None` when the window is empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableStats {
    pub variable: VariableId,
    pub stats: Option<WindowStats>,
}

/// Values of `series` whose timestamps fall inside `domain`
pub fn window_values(series: &Series, domain: Domain) -> Vec<f64> {
    series.window(domain).iter().map(|p| p.value).collect()
}

/// Window statistics for every series, in input order
pub fn compute_stats(series: &[Series], domain: Domain) -> Vec<VariableStats> {
    profiling::scope!("compute_stats");

    series
        .iter()
        .map(|s| VariableStats {
            variable: s.variable.clone(),
            stats: WindowStats::compute(&window_values(s, domain)),
        })
        .collect()
}

/// Statistics over each series' full extent
pub fn compute_full_stats(series: &[Series]) -> Vec<VariableStats> {
    series
        .iter()
        .map(|s| VariableStats {
            variable: s.variable.clone(),
            stats: WindowStats::compute(&s.points.iter().map(|p| p.value).collect::<Vec<_>>()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::Point;

    fn series(points: &[(i64, f64)]) -> Series {
        Series::new(
            VariableId::new("P", ""),
            points
                .iter()
                .map(|&(t, v)| Point::new(t, v))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(WindowStats::compute(&[]), None);
    }

    #[test]
    fn test_single_value() {
        let stats = WindowStats::compute(&[5.0]).unwrap();
        assert_eq!(
            stats,
            WindowStats {
                count: 1,
                min: 5.0,
                max: 5.0,
                mean: 5.0,
                median: 5.0,
                std_dev: 0.0,
            }
        );
    }

    #[test]
    fn test_population_std_dev() {
        let stats = WindowStats::compute(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert!((stats.std_dev - 1.118_033_988_7).abs() < 1e-9);
    }

    #[test]
    fn test_median_odd_unsorted() {
        let stats = WindowStats::compute(&[9.0, 1.0, 4.0]).unwrap();
        assert_eq!(stats.median, 4.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 9.0);
    }

    #[test]
    fn test_empty_window_yields_none_per_variable() {
        let s = series(&[(0, 1.0), (100, 2.0)]);
        let out = compute_stats(&[s], Domain::new(10, 90).unwrap());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].stats, None);
    }

    #[test]
    fn test_nested_domains_count_monotonic() {
        let s = series(&(0..200).map(|i| (i * 7, i as f64)).collect::<Vec<_>>());
        let outer = Domain::new(100, 1000).unwrap();
        let inner = Domain::new(350, 600).unwrap();
        assert!(outer.contains_domain(&inner));

        let count = |d| {
            compute_stats(std::slice::from_ref(&s), d)[0]
                .stats
                .map(|st| st.count)
                .unwrap_or(0)
        };
        assert!(count(inner) <= count(outer));
        assert!(count(inner) > 0);
    }
}
