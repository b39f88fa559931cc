//! Adaptive downsampling for smooth interaction
//!
//! Uses fast nth-point sampling while the user drags, LTTB once settled.

use crate::data::record::Point;

/// Frames of nth-point sampling after an interaction ends
const SETTLE_FRAMES: u8 = 10;

/// Switches between fast and quality decimation.
///
/// Call [`begin_frame`](Self::begin_frame) once per frame, then
/// [`downsample`](Self::downsample) for every series in that frame.
#[derive(Debug, Default)]
pub struct AdaptiveDownsampler {
    is_interacting: bool,
    settle_frames: u8,
}

impl AdaptiveDownsampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_frame(&mut self, currently_dragging: bool) {
        if currently_dragging {
            self.is_interacting = true;
            self.settle_frames = SETTLE_FRAMES;
        } else if self.settle_frames > 0 {
            self.settle_frames -= 1;
        } else {
            self.is_interacting = false;
        }
    }

    pub fn downsample(&self, points: &[Point], target: usize) -> Vec<Point> {
        if points.len() <= target {
            return points.to_vec();
        }
        if self.is_fast_mode() {
            nth_point_sample(points, target)
        } else {
            lttb_downsample(points, target)
        }
    }

    pub fn is_fast_mode(&self) -> bool {
        self.is_interacting || self.settle_frames > 0
    }

    /// Force settle (after a data change)
    pub fn force_settle(&mut self) {
        self.settle_frames = 0;
        self.is_interacting = false;
    }
}

/// Every nth point, always ending on the last one
fn nth_point_sample(points: &[Point], target: usize) -> Vec<Point> {
    let step = (points.len() / target.max(1)).max(1);
    let mut out: Vec<Point> = points.iter().step_by(step).copied().collect();
    if let (Some(last), Some(kept)) = (points.last(), out.last()) {
        if kept.timestamp != last.timestamp {
            out.push(*last);
        }
    }
    out
}

/// LTTB (Largest Triangle Three Buckets) downsampling.
///
/// Keeps the first and last point; `target < 3` returns the input unchanged.
pub fn lttb_downsample(points: &[Point], target: usize) -> Vec<Point> {
    profiling::scope!("lttb_downsample");

    if points.len() <= target || target < 3 {
        return points.to_vec();
    }

    let xy = |p: &Point| (p.timestamp as f64, p.value);
    let last = points.len() - 1;

    let mut result = Vec::with_capacity(target);
    result.push(points[0]);

    let bucket_size = (points.len() - 2) as f64 / (target - 2) as f64;
    let mut a = 0usize;

    for i in 0..(target - 2) {
        let bucket_start = ((i as f64) * bucket_size).floor() as usize + 1;
        let bucket_end = ((((i + 1) as f64) * bucket_size).floor() as usize + 1).min(last);

        // Average of the following bucket
        let next_start = bucket_end;
        let next_end = ((((i + 2) as f64) * bucket_size).floor() as usize + 1).min(points.len());

        let (avg_x, avg_y) = if next_start < next_end {
            let (sx, sy) = points[next_start..next_end]
                .iter()
                .map(xy)
                .fold((0.0, 0.0), |acc, (x, y)| (acc.0 + x, acc.1 + y));
            let count = (next_end - next_start) as f64;
            (sx / count, sy / count)
        } else {
            xy(&points[last])
        };

        let (ax, ay) = xy(&points[a]);
        let mut max_area = -1.0f64;
        let mut max_idx = bucket_start.min(last - 1);

        for (j, point) in points
            .iter()
            .enumerate()
            .take(bucket_end)
            .skip(bucket_start)
        {
            let (bx, by) = xy(point);
            let area = ((ax - avg_x) * (by - ay) - (ax - bx) * (avg_y - ay)).abs();
            if area > max_area {
                max_area = area;
                max_idx = j;
            }
        }

        result.push(points[max_idx]);
        a = max_idx;
    }

    result.push(points[last]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: i64) -> Vec<Point> {
        (0..n).map(|i| Point::new(i, (i as f64 * 0.1).sin())).collect()
    }

    #[test]
    fn test_adaptive_fast_mode() {
        let mut ds = AdaptiveDownsampler::new();
        let data = ramp(1000);

        ds.begin_frame(true);
        assert!(ds.is_fast_mode());
        let fast = ds.downsample(&data, 100);
        assert!(fast.len() <= 101);
        assert_eq!(fast[fast.len() - 1].timestamp, 999);

        ds.begin_frame(false);
        assert!(ds.is_fast_mode());

        for _ in 0..15 {
            ds.begin_frame(false);
        }
        assert!(!ds.is_fast_mode());
        assert_eq!(ds.downsample(&data, 100).len(), 100);
    }

    #[test]
    fn test_lttb_endpoints_and_order() {
        let data = ramp(100);
        let result = lttb_downsample(&data, 10);

        assert_eq!(result.len(), 10);
        assert_eq!(result[0].timestamp, 0);
        assert_eq!(result[9].timestamp, 99);
        assert!(result.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_lttb_small_input_untouched() {
        let data = ramp(5);
        assert_eq!(lttb_downsample(&data, 10), data);
        assert_eq!(lttb_downsample(&data, 2), data);
    }
}
