//! Performance helpers and background statistics
//!
//! - Point culling and LTTB decimation for the render path
//! - A worker thread that computes window statistics off the UI thread
//! - A scheduler that owns request correlation for that worker
//!
//! Hot paths are instrumented with the `profiling` crate (puffin/tracy backends).

mod downsample;
pub mod scheduler;
pub mod worker;

pub use downsample::{lttb_downsample, AdaptiveDownsampler};
pub use scheduler::{RequestTable, SchedulerEvent, StatsScheduler};
pub use worker::{BackgroundStatsWorker, StatsRequest, WorkerFailure, WorkerRequest, WorkerResponse};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::record::{Domain, Point};

/// Correlates a statistics request with its responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    pub fn next(self) -> Self {
        RequestId(self.0.wrapping_add(1))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Points inside `domain` plus one neighbour on each side.
///
/// The neighbours let a step line enter and leave the viewport at the right
/// level. Input must be ascending by timestamp.
#[inline]
pub fn cull_points(points: &[Point], domain: Domain) -> &[Point] {
    profiling::scope!("cull_points");

    if points.is_empty() {
        return points;
    }

    let start = points.partition_point(|p| p.timestamp < domain.start);
    let end = points.partition_point(|p| p.timestamp <= domain.end);

    let start = start.saturating_sub(1);
    let end = (end + 1).min(points.len());

    &points[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cull_points_keeps_one_neighbour() {
        let data: Vec<Point> = (0..1000).map(|i| Point::new(i * 10, i as f64)).collect();

        let culled = cull_points(&data, Domain::new(1000, 2000).unwrap());
        assert_eq!(culled.len(), 103);
        assert_eq!(culled[0].timestamp, 990);
        assert_eq!(culled[culled.len() - 1].timestamp, 2010);
    }

    #[test]
    fn test_cull_points_at_edges() {
        let data: Vec<Point> = (0..10).map(|i| Point::new(i, 0.0)).collect();
        assert_eq!(cull_points(&data, Domain::new(-5, 3).unwrap()).len(), 5);
        assert_eq!(cull_points(&data, Domain::new(8, 50).unwrap()).len(), 3);
        assert!(cull_points(&[], Domain::new(0, 1).unwrap()).is_empty());
    }

    #[test]
    fn test_request_id_display() {
        assert_eq!(RequestId(4).to_string(), "#4");
        assert_eq!(RequestId(4).next(), RequestId(5));
    }
}
