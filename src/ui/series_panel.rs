use eframe::egui::{self, Color32};

use crate::app::TrendOxide;
use crate::render::color_for;

/// Variable selector (left sidebar)
pub fn render_series_panel(app: &mut TrendOxide, ui: &mut egui::Ui) {
    ui.heading("Variables");
    ui.add(
        egui::TextEdit::singleline(&mut app.ui.variable_filter)
            .hint_text("Filter")
            .desired_width(f32::INFINITY),
    );
    ui.separator();

    if app.ctx.dataset.variables.is_empty() {
        ui.weak("Open or drop a file to start");
        return;
    }

    let mut toggled = None;
    egui::ScrollArea::vertical().show(ui, |ui| {
        for variable in app.ctx.variables() {
            if !app.ui.matches_filter(&variable.display_label) {
                continue;
            }
            ui.horizontal(|ui| {
                let swatch = app
                    .ctx
                    .selection_index(&variable.id)
                    .map(color_for)
                    .unwrap_or(Color32::GRAY);
                let (rect, _) = ui.allocate_exact_size(egui::vec2(10.0, 10.0), egui::Sense::hover());
                if variable.selected {
                    ui.painter().rect_filled(rect, 2.0, swatch);
                } else {
                    ui.painter().rect_stroke(
                        rect,
                        2.0,
                        egui::Stroke::new(1.0, swatch),
                        egui::StrokeKind::Inside,
                    );
                }

                let points = app
                    .ctx
                    .dataset
                    .series_for(&variable.id)
                    .map_or(0, |s| s.len());
                if ui
                    .selectable_label(variable.selected, variable.display_label.as_str())
                    .on_hover_text(format!("{points} points"))
                    .clicked()
                {
                    toggled = Some(variable.id.clone());
                }
            });
        }
    });

    if let Some(id) = toggled {
        app.ctx = app.ctx.with_toggled(&id);
        app.selection_changed();
    }

    ui.separator();
    ui.horizontal(|ui| {
        ui.weak(format!(
            "{} selected / {}",
            app.ctx.selection.len(),
            app.ctx.dataset.variables.len()
        ));
        if !app.ctx.selection.is_empty() && ui.small_button("Clear").clicked() {
            app.ctx = app.ctx.with_selection(Vec::new());
            app.selection_changed();
        }
    });
}
