//! ViewportController: the single owner of the shared time domain
//!
//! ```text
//! Idle ──load──▶ Ready ──brush/zoom/reference──▶ Zoomed
//!   ▲              ▲ ◀──────────reset─────────────┘
//!   └─data_cleared─┴──────────────────────────────┘
//! ```
//!
//! Every accepted change is published to subscribers and arms a debounced
//! statistics recompute. Inverted or zero-width candidates never leave the
//! controller: the previous domain stays in place.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::interaction::{adapter_for, AdapterView, InteractionAdapter, InteractionMode, PointerInput};
use super::schedule::ScheduledTask;
use crate::constants::viewport::{DEBOUNCE_MS, REFERENCE_AFTER_SECS, REFERENCE_BEFORE_SECS};
use crate::data::record::{Domain, Series};
use crate::render::scale::{TimeScale, ZoomTransform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewportState {
    /// No data loaded
    Idle,
    /// Domain equals the full extent
    Ready,
    /// Domain is a sub-range chosen by the user
    Zoomed,
}

/// What caused a domain change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DomainOrigin {
    Load,
    Brush,
    Zoom,
    Reset,
    Reference,
}

/// Brush extent on the navigator, in pixels; either order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushSelection {
    pub x0: f32,
    pub x1: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportAction {
    Brush(BrushSelection),
    Zoom(ZoomTransform),
    Reset,
    /// Focus a window around a reference instant
    Reference(Domain),
}

impl ViewportAction {
    /// The origin this action has when it comes straight from the user
    pub fn natural_origin(&self) -> DomainOrigin {
        match self {
            ViewportAction::Brush(_) => DomainOrigin::Brush,
            ViewportAction::Zoom(_) => DomainOrigin::Zoom,
            ViewportAction::Reset => DomainOrigin::Reset,
            ViewportAction::Reference(_) => DomainOrigin::Reference,
        }
    }
}

/// An action tagged with the origin of the update that produced it.
///
/// When the UI moves the brush handle to follow a zoom gesture, the widget
/// reports a brush event; tagging it with `DomainOrigin::Zoom` marks it as
/// an echo of the zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainEvent {
    pub origin: DomainOrigin,
    pub action: ViewportAction,
}

impl DomainEvent {
    /// A direct user action
    pub fn user(action: ViewportAction) -> Self {
        Self {
            origin: action.natural_origin(),
            action,
        }
    }

    /// An action propagated from an update with a different origin
    pub fn propagated(origin: DomainOrigin, action: ViewportAction) -> Self {
        Self { origin, action }
    }

    fn is_echo(&self) -> bool {
        self.origin != self.action.natural_origin()
    }
}

/// Published after every accepted domain change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainChange {
    pub domain: Domain,
    pub previous: Option<Domain>,
    pub origin: DomainOrigin,
    pub state: ViewportState,
    /// Brush handle on the navigator; `None` when the full extent is shown
    pub brush_px: Option<(f32, f32)>,
    pub zoom: ZoomTransform,
}

/// Handle returned by [`ViewportController::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type DomainCallback = Box<dyn FnMut(&DomainChange)>;

pub struct ViewportController {
    state: ViewportState,
    full_extent: Option<Domain>,
    domain: Option<Domain>,
    zoom: ZoomTransform,
    brush_px: Option<(f32, f32)>,
    main_range: (f32, f32),
    navigator_range: (f32, f32),
    /// Origins with an update in progress; echoes from these are dropped
    cycle: Vec<DomainOrigin>,
    subscribers: Vec<(Subscription, DomainCallback)>,
    next_subscription: u64,
    recompute: ScheduledTask,
    pending_recompute: Option<Domain>,
    adapter: Box<dyn InteractionAdapter>,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEBOUNCE_MS))
    }
}

impl std::fmt::Debug for ViewportController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportController")
            .field("state", &self.state)
            .field("full_extent", &self.full_extent)
            .field("domain", &self.domain)
            .field("zoom", &self.zoom)
            .field("mode", &self.adapter.mode())
            .finish_non_exhaustive()
    }
}

impl ViewportController {
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: ViewportState::Idle,
            full_extent: None,
            domain: None,
            zoom: ZoomTransform::IDENTITY,
            brush_px: None,
            main_range: (0.0, 1.0),
            navigator_range: (0.0, 1.0),
            cycle: Vec::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
            recompute: ScheduledTask::new(debounce),
            pending_recompute: None,
            adapter: adapter_for(
                InteractionMode::default(),
                REFERENCE_BEFORE_SECS,
                REFERENCE_AFTER_SECS,
            ),
        }
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn domain(&self) -> Option<Domain> {
        self.domain
    }

    pub fn full_extent(&self) -> Option<Domain> {
        self.full_extent
    }

    pub fn zoom(&self) -> ZoomTransform {
        self.zoom
    }

    pub fn brush_px(&self) -> Option<(f32, f32)> {
        self.brush_px
    }

    pub fn mode(&self) -> InteractionMode {
        self.adapter.mode()
    }

    pub fn set_adapter(&mut self, adapter: Box<dyn InteractionAdapter>) {
        self.adapter = adapter;
    }

    pub fn set_debounce(&mut self, delay: Duration) {
        self.recompute.set_delay(delay);
    }

    /// Pixel ranges of the main chart and the navigator.
    ///
    /// Zoom transform and brush handle are re-derived from the current domain.
    pub fn set_ranges(&mut self, main: (f32, f32), navigator: (f32, f32)) {
        if main == self.main_range && navigator == self.navigator_range {
            return;
        }
        self.main_range = main;
        self.navigator_range = navigator;
        if let Some(domain) = self.domain {
            self.sync_widgets(domain);
        }
    }

    /// Base scale of the main chart: full extent over the main range
    pub fn base_scale(&self) -> Option<TimeScale> {
        Some(TimeScale::new(self.full_extent?, self.main_range))
    }

    /// Fixed full-extent scale of the navigator
    pub fn navigator_scale(&self) -> Option<TimeScale> {
        Some(TimeScale::new(self.full_extent?, self.navigator_range))
    }

    /// Current domain over the main range
    pub fn main_scale(&self) -> Option<TimeScale> {
        Some(TimeScale::new(self.domain?, self.main_range))
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&DomainChange) + 'static) -> Subscription {
        let subscription = Subscription(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((subscription, Box::new(callback)));
        subscription
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) {
        self.subscribers.retain(|(s, _)| *s != subscription);
    }

    /// `Idle → Ready` with the domain set to the extent of `series`.
    ///
    /// Called again after the selection changes; the zoom is reset. With no
    /// points at all the controller goes back to `Idle`.
    pub fn load(&mut self, series: &[Series]) -> Option<DomainChange> {
        let Some(extent) = Domain::extent_of(series) else {
            self.data_cleared();
            return None;
        };
        self.full_extent = Some(extent);
        self.begin_cycle(DomainOrigin::Load);
        let change = self.apply(extent, DomainOrigin::Load, ViewportState::Ready);
        self.recompute.schedule_now(Instant::now());
        change
    }

    pub fn brush(&mut self, selection: BrushSelection) -> Option<DomainChange> {
        self.dispatch(DomainEvent::user(ViewportAction::Brush(selection)))
    }

    pub fn zoom_gesture(&mut self, transform: ZoomTransform) -> Option<DomainChange> {
        self.dispatch(DomainEvent::user(ViewportAction::Zoom(transform)))
    }

    pub fn reset(&mut self) -> Option<DomainChange> {
        self.dispatch(DomainEvent::user(ViewportAction::Reset))
    }

    /// Any state `→ Idle`; pending recomputes are dropped
    pub fn data_cleared(&mut self) {
        self.state = ViewportState::Idle;
        self.full_extent = None;
        self.domain = None;
        self.zoom = ZoomTransform::IDENTITY;
        self.brush_px = None;
        self.recompute.cancel();
        self.pending_recompute = None;
        self.cycle.clear();
        tracing::debug!("viewport cleared");
    }

    /// Set the domain directly, clamped to the full extent
    pub fn set_domain(&mut self, domain: Domain, origin: DomainOrigin) -> Option<DomainChange> {
        let extent = self.full_extent?;
        let domain = domain.clamp_to(&extent).filter(|d| !d.is_zero_width())?;
        let state = if origin == DomainOrigin::Reset || domain == extent {
            ViewportState::Ready
        } else {
            ViewportState::Zoomed
        };
        self.begin_cycle(origin);
        self.apply(domain, origin, state)
    }

    /// Translate pointer input with the current adapter and apply it
    pub fn input(&mut self, input: &PointerInput) -> Option<DomainChange> {
        let view = AdapterView {
            full_extent: self.full_extent?,
            domain: self.domain?,
            zoom: self.zoom,
            main_scale: self.main_scale()?,
        };
        let action = self.adapter.translate(input, &view)?;
        self.dispatch(DomainEvent::user(action))
    }

    /// Apply one event. Echoes of an update still in progress are ignored.
    pub fn dispatch(&mut self, event: DomainEvent) -> Option<DomainChange> {
        if self.state == ViewportState::Idle {
            return None;
        }
        if event.is_echo() && self.cycle.contains(&event.origin) {
            tracing::trace!(origin = ?event.origin, action = ?event.action, "ignored re-entrant domain event");
            return None;
        }

        let extent = self.full_extent?;
        let (candidate, state) = match event.action {
            ViewportAction::Brush(selection) => {
                if selection.x0 == selection.x1 {
                    return None;
                }
                let scale = self.navigator_scale()?;
                let domain = Domain::ordered(scale.invert(selection.x0), scale.invert(selection.x1));
                (domain, ViewportState::Zoomed)
            }
            ViewportAction::Zoom(transform) => {
                let domain = transform.rescale(&self.base_scale()?)?;
                (domain, ViewportState::Zoomed)
            }
            ViewportAction::Reset => (extent, ViewportState::Ready),
            ViewportAction::Reference(domain) => (domain, ViewportState::Zoomed),
        };

        // Pan and zoom slide back inside the extent; the rest is intersected
        let clamped = match event.action {
            ViewportAction::Zoom(_) => Some(candidate.shift_into(&extent)),
            _ => candidate.clamp_to(&extent),
        };
        let Some(domain) = clamped.filter(|d| !d.is_zero_width()) else {
            tracing::trace!(?candidate, "rejected empty domain candidate");
            return None;
        };
        let state = if domain == extent {
            ViewportState::Ready
        } else {
            state
        };

        self.begin_cycle(event.origin);
        self.apply(domain, event.origin, state)
    }

    /// Close the current update cycle; call once per frame
    pub fn end_cycle(&mut self) {
        self.cycle.clear();
    }

    /// The domain to recompute statistics for, once the debounce has elapsed
    pub fn take_due_recompute(&mut self, now: Instant) -> Option<Domain> {
        if self.recompute.poll(now) {
            self.pending_recompute.take()
        } else {
            None
        }
    }

    /// Fire any pending recompute immediately
    pub fn flush_recompute(&mut self) -> Option<Domain> {
        if self.recompute.flush() {
            self.pending_recompute.take()
        } else {
            None
        }
    }

    /// Time until the pending recompute fires
    pub fn recompute_remaining(&self, now: Instant) -> Option<Duration> {
        self.recompute.remaining(now)
    }

    fn begin_cycle(&mut self, origin: DomainOrigin) {
        if !self.cycle.contains(&origin) {
            self.cycle.push(origin);
        }
    }

    fn sync_widgets(&mut self, domain: Domain) {
        let at_full_extent = self.full_extent == Some(domain);
        self.zoom = self
            .base_scale()
            .and_then(|base| ZoomTransform::from_domain(&base, domain))
            .unwrap_or(ZoomTransform::IDENTITY);
        self.brush_px = match self.navigator_scale() {
            Some(scale) if !at_full_extent => Some((scale.map(domain.start), scale.map(domain.end))),
            _ => None,
        };
    }

    fn apply(&mut self, domain: Domain, origin: DomainOrigin, state: ViewportState) -> Option<DomainChange> {
        let previous = self.domain;
        self.domain = Some(domain);
        self.state = state;
        self.sync_widgets(domain);

        self.pending_recompute = Some(domain);
        self.recompute.schedule(Instant::now());

        let change = DomainChange {
            domain,
            previous,
            origin,
            state,
            brush_px: self.brush_px,
            zoom: self.zoom,
        };

        tracing::debug!(?origin, ?state, start = domain.start, end = domain.end, "domain changed");

        for (_, callback) in self.subscribers.iter_mut() {
            callback(&change);
        }
        Some(change)
    }
}
