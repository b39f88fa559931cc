//! Interaction adapters: translate raw pointer input into viewport actions
//!
//! The controller has a single domain pipeline; adapters only decide which
//! gestures are available and what they mean.

use serde::{Deserialize, Serialize};

use super::viewport::{BrushSelection, ViewportAction};
use crate::constants::viewport::{REFERENCE_AFTER_SECS, REFERENCE_BEFORE_SECS, ZOOM_STEP};
use crate::data::record::{Domain, EpochMillis};
use crate::render::scale::{TimeScale, ZoomTransform};

/// Which adapter drives the chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InteractionMode {
    BrushOnly,
    #[default]
    ZoomAndBrush,
    ClickToSetReference,
}

impl InteractionMode {
    pub const ALL: [InteractionMode; 3] = [
        InteractionMode::BrushOnly,
        InteractionMode::ZoomAndBrush,
        InteractionMode::ClickToSetReference,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            InteractionMode::BrushOnly => "Brush",
            InteractionMode::ZoomAndBrush => "Zoom + brush",
            InteractionMode::ClickToSetReference => "Reference time",
        }
    }
}

/// Pointer input in screen pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    /// Brush dragged on the navigator from `x0` to `x1`
    NavigatorDrag { x0: f32, x1: f32 },
    /// Wheel over the main chart; positive `notches` zoom in
    Scroll { anchor_px: f32, notches: f32 },
    /// Horizontal drag on the main chart
    Pan { delta_px: f32 },
    DoubleClick { x_px: f32 },
}

/// What an adapter may look at when translating input
#[derive(Debug, Clone, Copy)]
pub struct AdapterView {
    pub full_extent: Domain,
    pub domain: Domain,
    pub zoom: ZoomTransform,
    /// Current domain mapped onto the main chart
    pub main_scale: TimeScale,
}

pub trait InteractionAdapter {
    fn mode(&self) -> InteractionMode;

    fn translate(&mut self, input: &PointerInput, view: &AdapterView) -> Option<ViewportAction>;
}

fn navigator_brush(input: &PointerInput) -> Option<ViewportAction> {
    match *input {
        PointerInput::NavigatorDrag { x0, x1 } => Some(ViewportAction::Brush(BrushSelection { x0, x1 })),
        _ => None,
    }
}

/// Navigator brush only
#[derive(Debug, Default)]
pub struct BrushOnly;

impl InteractionAdapter for BrushOnly {
    fn mode(&self) -> InteractionMode {
        InteractionMode::BrushOnly
    }

    fn translate(&mut self, input: &PointerInput, _view: &AdapterView) -> Option<ViewportAction> {
        navigator_brush(input)
    }
}

/// Navigator brush plus wheel zoom and drag pan on the main chart
#[derive(Debug)]
pub struct ZoomAndBrush {
    pub zoom_step: f64,
}

impl Default for ZoomAndBrush {
    fn default() -> Self {
        Self {
            zoom_step: ZOOM_STEP,
        }
    }
}

impl InteractionAdapter for ZoomAndBrush {
    fn mode(&self) -> InteractionMode {
        InteractionMode::ZoomAndBrush
    }

    fn translate(&mut self, input: &PointerInput, view: &AdapterView) -> Option<ViewportAction> {
        match *input {
            PointerInput::NavigatorDrag { .. } => navigator_brush(input),
            PointerInput::Scroll { anchor_px, notches } => {
                let factor = self.zoom_step.powf(notches as f64);
                Some(ViewportAction::Zoom(view.zoom.scale_by(factor, anchor_px as f64)))
            }
            PointerInput::Pan { delta_px } => {
                Some(ViewportAction::Zoom(view.zoom.translate_by(delta_px as f64)))
            }
            PointerInput::DoubleClick { .. } => None,
        }
    }
}

/// Navigator brush plus double-click to focus a window around an instant
#[derive(Debug)]
pub struct ClickToSetReference {
    pub before_ms: EpochMillis,
    pub after_ms: EpochMillis,
}

impl ClickToSetReference {
    pub fn new(before_secs: i64, after_secs: i64) -> Self {
        Self {
            before_ms: before_secs * 1000,
            after_ms: after_secs * 1000,
        }
    }
}

impl Default for ClickToSetReference {
    fn default() -> Self {
        Self::new(REFERENCE_BEFORE_SECS, REFERENCE_AFTER_SECS)
    }
}

impl InteractionAdapter for ClickToSetReference {
    fn mode(&self) -> InteractionMode {
        InteractionMode::ClickToSetReference
    }

    fn translate(&mut self, input: &PointerInput, view: &AdapterView) -> Option<ViewportAction> {
        match *input {
            PointerInput::NavigatorDrag { .. } => navigator_brush(input),
            PointerInput::DoubleClick { x_px } => {
                let t = view.main_scale.invert(x_px);
                Some(ViewportAction::Reference(Domain::ordered(
                    t.saturating_sub(self.before_ms),
                    t.saturating_add(self.after_ms),
                )))
            }
            PointerInput::Scroll { .. } | PointerInput::Pan { .. } => None,
        }
    }
}

/// Build the adapter for `mode`
pub fn adapter_for(mode: InteractionMode, before_secs: i64, after_secs: i64) -> Box<dyn InteractionAdapter> {
    match mode {
        InteractionMode::BrushOnly => Box::new(BrushOnly),
        InteractionMode::ZoomAndBrush => Box::new(ZoomAndBrush::default()),
        InteractionMode::ClickToSetReference => Box::new(ClickToSetReference::new(before_secs, after_secs)),
    }
}
