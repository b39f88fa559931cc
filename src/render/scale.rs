//! Scales mapping data space to screen pixels, and the zoom transform
//! applied on top of the base time scale

use serde::{Deserialize, Serialize};

use crate::data::record::{Domain, EpochMillis};

const SECOND: i64 = 1_000;
const MINUTE: i64 = 60 * SECOND;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Calendar-friendly tick steps, ascending
const TIME_STEPS: [i64; 19] = [
    SECOND,
    2 * SECOND,
    5 * SECOND,
    15 * SECOND,
    30 * SECOND,
    MINUTE,
    2 * MINUTE,
    5 * MINUTE,
    15 * MINUTE,
    30 * MINUTE,
    HOUR,
    2 * HOUR,
    3 * HOUR,
    6 * HOUR,
    12 * HOUR,
    DAY,
    2 * DAY,
    7 * DAY,
    14 * DAY,
];

/// Maps a time [`Domain`] onto a horizontal pixel range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    pub domain: Domain,
    pub range: (f32, f32),
}

impl TimeScale {
    pub fn new(domain: Domain, range: (f32, f32)) -> Self {
        Self { domain, range }
    }

    fn span(&self) -> f64 {
        (self.range.1 - self.range.0) as f64
    }

    pub fn map(&self, t: EpochMillis) -> f32 {
        self.map_f64(t as f64) as f32
    }

    fn map_f64(&self, t: f64) -> f64 {
        let width = self.domain.width() as f64;
        if width == 0.0 {
            return (self.range.0 as f64 + self.range.1 as f64) / 2.0;
        }
        self.range.0 as f64 + (t - self.domain.start as f64) / width * self.span()
    }

    fn invert_f64(&self, px: f64) -> f64 {
        let span = self.span();
        if span == 0.0 {
            return self.domain.start as f64;
        }
        self.domain.start as f64 + (px - self.range.0 as f64) / span * self.domain.width() as f64
    }

    /// Pixel → time, rounded to the nearest millisecond
    pub fn invert(&self, px: f32) -> EpochMillis {
        self.invert_f64(px as f64).round() as EpochMillis
    }

    /// About `count` tick instants inside the domain, aligned to UTC multiples of the step
    pub fn ticks(&self, count: usize) -> Vec<EpochMillis> {
        let width = self.domain.width();
        if width == 0 || count == 0 {
            return vec![self.domain.start];
        }

        let target = width / count as i64;
        let step = TIME_STEPS
            .iter()
            .copied()
            .find(|&s| s >= target)
            .unwrap_or_else(|| nice_step(target as f64 / DAY as f64).max(1.0) as i64 * DAY);

        let first = self.domain.start.div_euclid(step) * step;
        let first = if first < self.domain.start { first + step } else { first };

        (0..)
            .map(|i| first + i * step)
            .take_while(|&t| t <= self.domain.end)
            .collect()
    }
}

/// Maps a value extent onto a pixel range (usually bottom → top)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    pub domain: (f64, f64),
    pub range: (f32, f32),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f32, f32)) -> Self {
        Self { domain, range }
    }

    pub fn map(&self, v: f64) -> f32 {
        let width = self.domain.1 - self.domain.0;
        if width == 0.0 {
            return (self.range.0 + self.range.1) / 2.0;
        }
        let t = (v - self.domain.0) / width;
        (self.range.0 as f64 + t * (self.range.1 - self.range.0) as f64) as f32
    }

    pub fn invert(&self, px: f32) -> f64 {
        let span = (self.range.1 - self.range.0) as f64;
        if span == 0.0 {
            return self.domain.0;
        }
        self.domain.0 + (px - self.range.0) as f64 / span * (self.domain.1 - self.domain.0)
    }

    /// Ticks on 1/2/5 × 10^k steps
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        let (lo, hi) = (self.domain.0.min(self.domain.1), self.domain.0.max(self.domain.1));
        if lo == hi || count == 0 {
            return vec![lo];
        }

        let step = nice_step((hi - lo) / count as f64);
        let first = (lo / step).ceil() as i64;
        let last = (hi / step).floor() as i64;
        (first..=last).map(|i| i as f64 * step).collect()
    }
}

/// Round a raw step to 1, 2 or 5 × 10^k
fn nice_step(raw: f64) -> f64 {
    if raw <= 0.0 || !raw.is_finite() {
        return 1.0;
    }
    let power = 10f64.powf(raw.log10().floor());
    let error = raw / power;
    let factor = if error >= 7.07 {
        10.0
    } else if error >= 3.16 {
        5.0
    } else if error >= 1.41 {
        2.0
    } else {
        1.0
    };
    factor * power
}

/// Pan/zoom state in pixel space: `screen = base * k + x`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomTransform {
    pub k: f64,
    pub x: f64,
}

impl Default for ZoomTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ZoomTransform {
    pub const IDENTITY: ZoomTransform = ZoomTransform { k: 1.0, x: 0.0 };

    pub fn apply(&self, px: f64) -> f64 {
        px * self.k + self.x
    }

    pub fn invert(&self, px: f64) -> f64 {
        (px - self.x) / self.k
    }

    /// Scale by `factor` keeping the pixel under `anchor` fixed
    pub fn scale_by(&self, factor: f64, anchor: f64) -> ZoomTransform {
        let k = self.k * factor;
        if !k.is_finite() || k <= 0.0 {
            return *self;
        }
        let p = self.invert(anchor);
        ZoomTransform { k, x: anchor - p * k }
    }

    pub fn translate_by(&self, dx: f64) -> ZoomTransform {
        ZoomTransform {
            k: self.k,
            x: self.x + dx,
        }
    }

    /// Domain shown when this transform is applied to `base`.
    ///
    /// `None` when the result would be inverted or not finite.
    pub fn rescale(&self, base: &TimeScale) -> Option<Domain> {
        let r0 = self.invert(base.range.0 as f64);
        let r1 = self.invert(base.range.1 as f64);
        let start = base.invert_f64(r0);
        let end = base.invert_f64(r1);
        if !start.is_finite() || !end.is_finite() {
            return None;
        }
        Domain::new(start.round() as EpochMillis, end.round() as EpochMillis).ok()
    }

    /// The transform under which `base` shows exactly `domain`.
    ///
    /// `None` for a zero-width domain.
    pub fn from_domain(base: &TimeScale, domain: Domain) -> Option<ZoomTransform> {
        let p0 = base.map_f64(domain.start as f64);
        let p1 = base.map_f64(domain.end as f64);
        if p1 <= p0 {
            return None;
        }
        let k = base.span() / (p1 - p0);
        Some(ZoomTransform {
            k,
            x: base.range.0 as f64 - p0 * k,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> TimeScale {
        TimeScale::new(Domain::new(0, 1_000_000).unwrap(), (0.0, 1000.0))
    }

    #[test]
    fn test_time_scale_map_invert() {
        let scale = base();
        assert_eq!(scale.map(500_000), 500.0);
        assert_eq!(scale.invert(250.0), 250_000);
        assert_eq!(scale.invert(scale.map(123_000)), 123_000);
    }

    #[test]
    fn test_time_ticks_aligned() {
        let scale = TimeScale::new(Domain::new(HOUR + 7, 3 * HOUR).unwrap(), (0.0, 800.0));
        let ticks = scale.ticks(8);
        assert!(!ticks.is_empty());
        let step = ticks[1] - ticks[0];
        assert_eq!(step, 15 * MINUTE);
        assert!(ticks.iter().all(|t| t % step == 0 && scale.domain.contains(*t)));
    }

    #[test]
    fn test_long_ranges_use_day_multiples() {
        let scale = TimeScale::new(Domain::new(0, 400 * DAY).unwrap(), (0.0, 800.0));
        let ticks = scale.ticks(8);
        assert_eq!((ticks[1] - ticks[0]) % DAY, 0);
        assert!(ticks.len() <= 9);
    }

    #[test]
    fn test_linear_ticks() {
        let scale = LinearScale::new((0.0, 10.0), (100.0, 0.0));
        assert_eq!(scale.ticks(5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(scale.map(0.0), 100.0);
        assert_eq!(scale.map(10.0), 0.0);
        assert!((scale.invert(50.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_identity_rescale() {
        assert_eq!(
            ZoomTransform::IDENTITY.rescale(&base()),
            Some(Domain::new(0, 1_000_000).unwrap())
        );
    }

    #[test]
    fn test_zoom_from_domain_round_trip() {
        let domain = Domain::new(200_000, 400_000).unwrap();
        let transform = ZoomTransform::from_domain(&base(), domain).unwrap();
        assert!((transform.k - 5.0).abs() < 1e-9);
        assert_eq!(transform.rescale(&base()), Some(domain));
        assert_eq!(
            ZoomTransform::from_domain(&base(), Domain::new(5, 5).unwrap()),
            None
        );
    }

    #[test]
    fn test_scale_by_keeps_anchor() {
        let zoomed = ZoomTransform::IDENTITY.scale_by(2.0, 250.0);
        assert_eq!(zoomed.apply(250.0), 250.0);
        assert_eq!(
            zoomed.rescale(&base()),
            Some(Domain::new(125_000, 625_000).unwrap())
        );
    }

    #[test]
    fn test_translate_by() {
        let t = ZoomTransform::IDENTITY.scale_by(2.0, 0.0).translate_by(-100.0);
        assert_eq!(t.rescale(&base()), Some(Domain::new(50_000, 550_000).unwrap()));
    }
}
