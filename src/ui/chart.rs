use eframe::egui::{self, pos2, vec2, Align2, Color32, FontId, Rect, Sense, Stroke};

use crate::app::TrendOxide;
use crate::constants::plot::{MAIN_HEIGHT, MAIN_STROKE, NAVIGATOR_HEIGHT, NAVIGATOR_STROKE};
use crate::format::{format_axis_tick, format_number, format_timestamp};
use crate::render::RenderFrame;
use crate::state::{InteractionMode, PointerInput};

/// Wheel delta (points) counted as one zoom notch
const SCROLL_NOTCH: f32 = 50.0;

fn grid_color(ui: &egui::Ui) -> Color32 {
    ui.visuals().widgets.noninteractive.bg_stroke.color.gamma_multiply(0.6)
}

fn draw_axes(painter: &egui::Painter, frame: &RenderFrame, ui: &egui::Ui, with_values: bool) {
    let text_color = ui.visuals().text_color();
    let font = FontId::proportional(11.0);
    let plot = frame.plot;

    for &t in &frame.time_ticks {
        painter.text(
            pos2(frame.time_scale.map(t), plot.bottom() + 4.0),
            Align2::CENTER_TOP,
            format_axis_tick(t),
            font.clone(),
            text_color,
        );
    }
    if with_values {
        for &v in &frame.value_ticks {
            painter.text(
                pos2(plot.left() - 4.0, frame.value_scale.map(v)),
                Align2::RIGHT_CENTER,
                format_number(v),
                font.clone(),
                text_color,
            );
        }
    }
    painter.rect_stroke(
        plot,
        0.0,
        Stroke::new(1.0, grid_color(ui)),
        egui::StrokeKind::Inside,
    );
}

/// Main chart with the navigator below it
pub fn render_chart(app: &mut TrendOxide, ui: &mut egui::Ui) {
    profiling::scope!("render_chart");

    let series = app.ctx.selected_series();
    let (Some(domain), Some(full_extent)) = (app.viewport.domain(), app.viewport.full_extent()) else {
        ui.centered_and_justified(|ui| {
            ui.weak("Select one or more variables to plot");
        });
        return;
    };

    let width = ui.available_width();
    let main_height = (ui.available_height() - NAVIGATOR_HEIGHT - ui.spacing().item_spacing.y)
        .max(MAIN_HEIGHT / 2.0);

    let (main_response, main_painter) = ui.allocate_painter(vec2(width, main_height), Sense::click_and_drag());
    let (nav_response, nav_painter) = ui.allocate_painter(vec2(width, NAVIGATOR_HEIGHT), Sense::click_and_drag());

    let main_outer = main_response.rect;
    let nav_outer = nav_response.rect;
    let layout = app.render.layout;
    app.viewport
        .set_ranges(layout.horizontal_range(main_outer), layout.horizontal_range(nav_outer));

    handle_main_input(app, ui, &main_response, layout.plot_rect(main_outer));
    handle_navigator_input(app, &nav_response, layout.horizontal_range(nav_outer));

    let interacting = main_response.dragged() || nav_response.dragged();
    app.render.begin_frame(interacting);

    // Input above may have moved the domain
    let domain = app.viewport.domain().unwrap_or(domain);

    let frame = app.render.frame(&series, domain, main_outer);
    main_painter
        .with_clip_rect(frame.plot)
        .extend(app.render.shapes(&frame, MAIN_STROKE, grid_color(ui)));
    draw_axes(&main_painter, &frame, ui, true);

    if let Some(t) = app.ui.reference_time.filter(|t| domain.contains(*t)) {
        let x = frame.time_scale.map(t);
        main_painter.line_segment(
            [pos2(x, frame.plot.top()), pos2(x, frame.plot.bottom())],
            Stroke::new(1.0, ui.visuals().warn_fg_color),
        );
    }

    if let Some(pointer) = main_response.hover_pos().filter(|p| frame.plot.contains(*p)) {
        let hovers = app.render.hover(&frame, &series, pointer.x);
        main_painter.line_segment(
            [pos2(pointer.x, frame.plot.top()), pos2(pointer.x, frame.plot.bottom())],
            Stroke::new(1.0, grid_color(ui)),
        );
        for hover in &hovers {
            if frame.plot.contains(hover.position) {
                main_painter.circle_filled(hover.position, 3.5, hover.color);
            }
        }
        if !hovers.is_empty() {
            main_response.clone().on_hover_ui_at_pointer(|ui| {
                for hover in &hovers {
                    ui.horizontal(|ui| {
                        ui.colored_label(hover.color, "■");
                        ui.label(format!(
                            "{}: {}  ({})",
                            hover.variable.display_label(),
                            format_number(hover.point.value),
                            format_timestamp(hover.point.timestamp)
                        ));
                    });
                }
            });
        }
    }

    let nav_frame = app.render.navigator_frame(&series, full_extent, nav_outer);
    nav_painter
        .with_clip_rect(nav_frame.plot)
        .extend(app.render.shapes(&nav_frame, NAVIGATOR_STROKE, grid_color(ui)));
    draw_axes(&nav_painter, &nav_frame, ui, false);

    let brush = match (app.ui.brush_anchor, nav_response.interact_pointer_pos()) {
        (Some(anchor), Some(pointer)) => Some((anchor, pointer.x)),
        _ => app.viewport.brush_px(),
    };
    if let Some((x0, x1)) = brush {
        let plot = nav_frame.plot;
        let rect = Rect::from_x_y_ranges(x0.min(x1)..=x0.max(x1), plot.y_range()).intersect(plot);
        let accent = ui.visuals().selection.bg_fill;
        nav_painter.rect_filled(rect, 0.0, accent.gamma_multiply(0.35));
        nav_painter.rect_stroke(rect, 0.0, Stroke::new(1.0, accent), egui::StrokeKind::Inside);
    }
}

fn handle_main_input(app: &mut TrendOxide, ui: &egui::Ui, response: &egui::Response, plot: Rect) {
    if response.double_clicked() {
        if let Some(pos) = response.interact_pointer_pos().filter(|p| plot.contains(*p)) {
            if app.viewport.mode() == InteractionMode::ClickToSetReference {
                app.ui.reference_time = app.viewport.main_scale().map(|s| s.invert(pos.x));
            }
            app.viewport.input(&PointerInput::DoubleClick { x_px: pos.x });
        }
        return;
    }

    if response.dragged() {
        let dx = response.drag_delta().x;
        if dx != 0.0 {
            app.viewport.input(&PointerInput::Pan { delta_px: dx });
        }
    }

    if let Some(pos) = response.hover_pos().filter(|p| plot.contains(*p)) {
        let scroll = ui.input(|i| i.smooth_scroll_delta.y);
        if scroll != 0.0 {
            app.viewport.input(&PointerInput::Scroll {
                anchor_px: pos.x,
                notches: scroll / SCROLL_NOTCH,
            });
        }
    }
}

fn handle_navigator_input(app: &mut TrendOxide, response: &egui::Response, range: (f32, f32)) {
    let clamp = |x: f32| x.clamp(range.0, range.1);

    if response.drag_started() {
        app.ui.brush_anchor = response.interact_pointer_pos().map(|p| clamp(p.x));
    }
    if response.dragged() {
        if let (Some(x0), Some(pos)) = (app.ui.brush_anchor, response.interact_pointer_pos()) {
            app.viewport.input(&PointerInput::NavigatorDrag { x0, x1: clamp(pos.x) });
        }
    }
    if response.drag_stopped() {
        app.ui.brush_anchor = None;
    }
    if response.clicked() {
        // A click without a drag clears the brush
        app.reset_view();
    }
}
