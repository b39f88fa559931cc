//! RenderEngine: turns series and a domain into screen-space geometry
//!
//! Output is plain `egui` geometry (`Pos2`, `Shape`) so the viewer only has
//! to hand it to a painter. Series are drawn with step-after interpolation.

pub mod lookup;
pub mod scale;

use egui::{pos2, Color32, Pos2, Rect, Shape, Stroke};
use serde::{Deserialize, Serialize};

use crate::constants::performance::DOWNSAMPLE_THRESHOLD;
use crate::constants::plot::{
    MARGIN_BOTTOM, MARGIN_LEFT, MARGIN_RIGHT, MARGIN_TOP, TIME_TICKS, VALUE_TICKS,
};
use crate::data::record::{value_extent, Domain, EpochMillis, Point, Series, VariableId};
use crate::perf::{cull_points, AdaptiveDownsampler};
use lookup::nearest_point;
use scale::{LinearScale, TimeScale};

/// d3 `schemeCategory10`
pub const PALETTE: [Color32; 10] = [
    Color32::from_rgb(0x1f, 0x77, 0xb4),
    Color32::from_rgb(0xff, 0x7f, 0x0e),
    Color32::from_rgb(0x2c, 0xa0, 0x2c),
    Color32::from_rgb(0xd6, 0x27, 0x28),
    Color32::from_rgb(0x94, 0x67, 0xbd),
    Color32::from_rgb(0x8c, 0x56, 0x4b),
    Color32::from_rgb(0xe3, 0x77, 0xc2),
    Color32::from_rgb(0x7f, 0x7f, 0x7f),
    Color32::from_rgb(0xbc, 0xbd, 0x22),
    Color32::from_rgb(0x17, 0xbe, 0xcf),
];

/// Color of the `selection_index`-th selected variable
pub fn color_for(selection_index: usize) -> Color32 {
    PALETTE[selection_index % PALETTE.len()]
}

/// How the value axis is bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum YAxisPolicy {
    /// Extent of every point of every series; stays put while panning
    #[default]
    GlobalExtent,
    /// Extent of the points inside the current domain
    VisibleWindow,
}

impl YAxisPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            YAxisPolicy::GlobalExtent => "Fixed Y",
            YAxisPolicy::VisibleWindow => "Fit Y to window",
        }
    }
}

/// Margins between the widget rect and the plot area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartLayout {
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self {
            margin_top: MARGIN_TOP,
            margin_right: MARGIN_RIGHT,
            margin_bottom: MARGIN_BOTTOM,
            margin_left: MARGIN_LEFT,
        }
    }
}

impl ChartLayout {
    /// Plot area inside `outer`
    pub fn plot_rect(&self, outer: Rect) -> Rect {
        Rect::from_min_max(
            pos2(outer.left() + self.margin_left, outer.top() + self.margin_top),
            pos2(
                (outer.right() - self.margin_right).max(outer.left() + self.margin_left + 1.0),
                (outer.bottom() - self.margin_bottom).max(outer.top() + self.margin_top + 1.0),
            ),
        )
    }

    pub fn horizontal_range(&self, outer: Rect) -> (f32, f32) {
        let plot = self.plot_rect(outer);
        (plot.left(), plot.right())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPath {
    pub variable: VariableId,
    pub color: Color32,
    pub points: Vec<Pos2>,
}

/// Geometry for one chart in one frame
#[derive(Debug, Clone)]
pub struct RenderFrame {
    pub plot: Rect,
    pub time_scale: TimeScale,
    pub value_scale: LinearScale,
    pub paths: Vec<SeriesPath>,
    pub time_ticks: Vec<EpochMillis>,
    pub value_ticks: Vec<f64>,
}

/// The sample closest to the pointer in one series
#[derive(Debug, Clone, PartialEq)]
pub struct Hover {
    pub variable: VariableId,
    pub color: Color32,
    pub point: Point,
    pub position: Pos2,
}

#[derive(Debug)]
pub struct RenderEngine {
    pub layout: ChartLayout,
    pub y_policy: YAxisPolicy,
    pub max_render_points: usize,
    downsampler: AdaptiveDownsampler,
}

impl Default for RenderEngine {
    fn default() -> Self {
        Self::new(YAxisPolicy::default(), DOWNSAMPLE_THRESHOLD)
    }
}

impl RenderEngine {
    pub fn new(y_policy: YAxisPolicy, max_render_points: usize) -> Self {
        Self {
            layout: ChartLayout::default(),
            y_policy,
            max_render_points,
            downsampler: AdaptiveDownsampler::new(),
        }
    }

    /// Call once per UI frame before building frames
    pub fn begin_frame(&mut self, interacting: bool) {
        self.downsampler.begin_frame(interacting);
    }

    /// Data changed: go straight back to full-quality decimation
    pub fn data_changed(&mut self) {
        self.downsampler.force_settle();
    }

    /// Value extent under the current policy, padded when flat
    pub fn value_extent(&self, series: &[Series], domain: Domain) -> Option<(f64, f64)> {
        let extents = series.iter().filter_map(|s| match self.y_policy {
            YAxisPolicy::GlobalExtent => s.value_extent(),
            YAxisPolicy::VisibleWindow => value_extent(s.window(domain)),
        });
        let (lo, hi) = extents.reduce(|a, b| (a.0.min(b.0), a.1.max(b.1)))?;
        Some(if lo == hi { (lo - 1.0, hi + 1.0) } else { (lo, hi) })
    }

    /// Main chart geometry for `series` (in selection order) over `domain`
    pub fn frame(&self, series: &[Series], domain: Domain, outer: Rect) -> RenderFrame {
        profiling::scope!("RenderEngine::frame");

        let plot = self.layout.plot_rect(outer);
        let extent = self.value_extent(series, domain).unwrap_or((0.0, 1.0));
        self.build(series, domain, extent, plot)
    }

    /// Navigator geometry: full extent, global value scale, no margins on top
    pub fn navigator_frame(&self, series: &[Series], full_extent: Domain, outer: Rect) -> RenderFrame {
        profiling::scope!("RenderEngine::navigator_frame");

        let plot = Rect::from_min_max(
            pos2(outer.left() + self.layout.margin_left, outer.top()),
            pos2(
                (outer.right() - self.layout.margin_right).max(outer.left() + self.layout.margin_left + 1.0),
                (outer.bottom() - self.layout.margin_bottom).max(outer.top() + 1.0),
            ),
        );
        let extent = series
            .iter()
            .filter_map(Series::value_extent)
            .reduce(|a, b| (a.0.min(b.0), a.1.max(b.1)))
            .map(|(lo, hi)| if lo == hi { (lo - 1.0, hi + 1.0) } else { (lo, hi) })
            .unwrap_or((0.0, 1.0));
        self.build(series, full_extent, extent, plot)
    }

    fn build(&self, series: &[Series], domain: Domain, extent: (f64, f64), plot: Rect) -> RenderFrame {
        let time_scale = TimeScale::new(domain, (plot.left(), plot.right()));
        let value_scale = LinearScale::new(extent, (plot.bottom(), plot.top()));

        let paths = series
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .map(|(index, s)| {
                let visible = cull_points(&s.points, domain);
                let decimated = self.downsampler.downsample(visible, self.max_render_points);
                SeriesPath {
                    variable: s.variable.clone(),
                    color: color_for(index),
                    points: step_after(&decimated, &time_scale, &value_scale),
                }
            })
            .collect();

        RenderFrame {
            plot,
            time_scale,
            value_scale,
            paths,
            time_ticks: time_scale.ticks(TIME_TICKS),
            value_ticks: value_scale.ticks(VALUE_TICKS),
        }
    }

    /// Nearest full-resolution sample per series for a pointer at `pointer_x`
    pub fn hover(&self, frame: &RenderFrame, series: &[Series], pointer_x: f32) -> Vec<Hover> {
        let t = frame.time_scale.invert(pointer_x);
        series
            .iter()
            .enumerate()
            .filter_map(|(index, s)| {
                let point = nearest_point(&s.points, t)?;
                Some(Hover {
                    variable: s.variable.clone(),
                    color: color_for(index),
                    point,
                    position: pos2(
                        frame.time_scale.map(point.timestamp),
                        frame.value_scale.map(point.value),
                    ),
                })
            })
            .collect()
    }

    /// Grid lines and series strokes, ready for `Painter::extend`
    pub fn shapes(&self, frame: &RenderFrame, stroke_width: f32, grid: Color32) -> Vec<Shape> {
        let plot = frame.plot;
        let mut shapes = Vec::with_capacity(frame.paths.len() + frame.time_ticks.len() + frame.value_ticks.len());

        for &t in &frame.time_ticks {
            let x = frame.time_scale.map(t);
            shapes.push(Shape::line_segment(
                [pos2(x, plot.top()), pos2(x, plot.bottom())],
                Stroke::new(1.0, grid),
            ));
        }
        for &v in &frame.value_ticks {
            let y = frame.value_scale.map(v);
            shapes.push(Shape::line_segment(
                [pos2(plot.left(), y), pos2(plot.right(), y)],
                Stroke::new(1.0, grid),
            ));
        }

        for path in &frame.paths {
            if path.points.len() >= 2 {
                shapes.push(Shape::line(path.points.clone(), Stroke::new(stroke_width, path.color)));
            } else if let Some(&p) = path.points.first() {
                shapes.push(Shape::circle_filled(p, stroke_width * 1.5, path.color));
            }
        }
        shapes
    }
}

/// Step-after polyline: each value holds until the next sample replaces it
pub fn step_after(points: &[Point], time_scale: &TimeScale, value_scale: &LinearScale) -> Vec<Pos2> {
    let mut out = Vec::with_capacity(points.len() * 2);
    for pair in points.windows(2) {
        let y = value_scale.map(pair[0].value);
        out.push(pos2(time_scale.map(pair[0].timestamp), y));
        out.push(pos2(time_scale.map(pair[1].timestamp), y));
    }
    if let Some(last) = points.last() {
        out.push(pos2(time_scale.map(last.timestamp), value_scale.map(last.value)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(key: &str, points: &[(i64, f64)]) -> Series {
        Series::new(
            VariableId::new(key, ""),
            points
                .iter()
                .map(|&(t, v)| Point::new(t, v))
                .collect::<Vec<_>>(),
        )
    }

    fn outer() -> Rect {
        // Plot area becomes x 60..1060, y 20..220
        Rect::from_min_max(pos2(0.0, 0.0), pos2(1090.0, 250.0))
    }

    #[test]
    fn test_palette_follows_selection_order() {
        assert_eq!(color_for(0), Color32::from_rgb(0x1f, 0x77, 0xb4));
        assert_eq!(color_for(10), color_for(0));

        let engine = RenderEngine::default();
        let a = series("A", &[(0, 1.0), (10, 2.0)]);
        let b = series("B", &[(0, 1.0), (10, 2.0)]);
        let domain = Domain::new(0, 10).unwrap();

        let ab = engine.frame(&[a.clone(), b.clone()], domain, outer());
        let ba = engine.frame(&[b, a], domain, outer());
        assert_eq!(ab.paths[0].color, ba.paths[0].color);
        assert_eq!(ab.paths[0].variable, VariableId::new("A", ""));
        assert_eq!(ba.paths[0].variable, VariableId::new("B", ""));
    }

    #[test]
    fn test_step_after_geometry() {
        let engine = RenderEngine::default();
        let s = series("A", &[(0, 0.0), (500, 10.0), (1000, 0.0)]);
        let frame = engine.frame(&[s], Domain::new(0, 1000).unwrap(), outer());
        let pts = &frame.paths[0].points;

        assert_eq!(pts.len(), 5);
        // Horizontal run first, then the vertical jump
        assert_eq!(pts[0].y, pts[1].y);
        assert_eq!(pts[1].x, pts[2].x);
        assert_eq!(pts[0].x, 60.0);
        assert_eq!(pts[4].x, 1060.0);
    }

    #[test]
    fn test_global_extent_ignores_window() {
        let engine = RenderEngine::default();
        let s = series("A", &[(0, -5.0), (100, 1.0), (200, 2.0), (300, 50.0)]);
        let zoomed = Domain::new(100, 200).unwrap();

        let frame = engine.frame(std::slice::from_ref(&s), zoomed, outer());
        assert_eq!(frame.value_scale.domain, (-5.0, 50.0));

        let fitted = RenderEngine::new(YAxisPolicy::VisibleWindow, 5000);
        let frame = fitted.frame(&[s], zoomed, outer());
        assert_eq!(frame.value_scale.domain, (1.0, 2.0));
    }

    #[test]
    fn test_empty_series_skipped() {
        let engine = RenderEngine::default();
        let frame = engine.frame(
            &[series("A", &[]), series("B", &[(0, 1.0), (5, 1.0)])],
            Domain::new(0, 5).unwrap(),
            outer(),
        );
        assert_eq!(frame.paths.len(), 1);
        // Color still follows the selection slot
        assert_eq!(frame.paths[0].color, color_for(1));
    }

    #[test]
    fn test_decimation_bounds_points() {
        let engine = RenderEngine::new(YAxisPolicy::GlobalExtent, 100);
        let s = series(
            "A",
            &(0..10_000).map(|i| (i, (i % 13) as f64)).collect::<Vec<_>>(),
        );
        let frame = engine.frame(&[s], Domain::new(0, 9_999).unwrap(), outer());
        assert!(frame.paths[0].points.len() <= 2 * 100);
    }

    #[test]
    fn test_hover_uses_full_resolution_and_earlier_tie() {
        let engine = RenderEngine::default();
        let s = series("A", &[(0, 1.0), (1000, 2.0)]);
        let frame = engine.frame(std::slice::from_ref(&s), Domain::new(0, 1000).unwrap(), outer());

        // Pixel 560 is the midpoint → t = 500, equidistant
        let hovers = engine.hover(&frame, &[s], 560.0);
        assert_eq!(hovers.len(), 1);
        assert_eq!(hovers[0].point.timestamp, 0);
        assert_eq!(hovers[0].position.x, 60.0);
    }

    #[test]
    fn test_shapes_include_grid_and_series() {
        let engine = RenderEngine::default();
        let s = series("A", &[(0, 0.0), (1000, 1.0)]);
        let frame = engine.frame(&[s], Domain::new(0, 1000).unwrap(), outer());
        let shapes = engine.shapes(&frame, 1.5, Color32::GRAY);
        assert_eq!(
            shapes.len(),
            frame.time_ticks.len() + frame.value_ticks.len() + 1
        );
    }
}
