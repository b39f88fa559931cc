use eframe::egui::{self, Color32, ComboBox};

use crate::app::TrendOxide;
use crate::render::YAxisPolicy;
use crate::state::interaction::adapter_for;
use crate::state::{InteractionMode, StatusLevel};

const DATA_EXTENSIONS: [&str; 3] = ["csv", "txt", "parquet"];

fn open_file(app: &mut TrendOxide, append: bool) {
    if let Some(path) = rfd::FileDialog::new()
        .add_filter("Data Files", &DATA_EXTENSIONS)
        .pick_file()
    {
        if let Err(e) = app.load_file(path, append) {
            tracing::warn!(error = %e, "load failed");
            app.ui.set_error(e.title(), e.user_message());
        }
    }
}

/// File actions, view settings and the status line
pub fn render_toolbar(app: &mut TrendOxide, ctx: &egui::Context, ui: &mut egui::Ui) {
    ui.horizontal(|ui| {
        if ui.button("📂").on_hover_text("Open data file").clicked() {
            open_file(app, false);
        }
        let has_data = !app.ctx.dataset.is_empty();
        if ui
            .add_enabled(has_data, egui::Button::new("➕"))
            .on_hover_text("Append data file")
            .clicked()
        {
            open_file(app, true);
        }

        ui.separator();

        if ui
            .add_enabled(app.viewport.domain().is_some(), egui::Button::new("⟲"))
            .on_hover_text("Reset zoom")
            .clicked()
        {
            app.reset_view();
        }

        let mut policy = app.config.y_axis;
        ComboBox::from_id_salt("y_axis")
            .selected_text(policy.label())
            .show_ui(ui, |ui| {
                for p in [YAxisPolicy::GlobalExtent, YAxisPolicy::VisibleWindow] {
                    ui.selectable_value(&mut policy, p, p.label());
                }
            });
        if policy != app.config.y_axis {
            app.config.y_axis = policy;
            app.render.y_policy = policy;
        }

        let mut mode = app.config.interaction;
        ComboBox::from_id_salt("interaction")
            .selected_text(mode.label())
            .show_ui(ui, |ui| {
                for m in InteractionMode::ALL {
                    ui.selectable_value(&mut mode, m, m.label());
                }
            });
        if mode != app.config.interaction {
            tracing::debug!(?mode, "interaction mode changed");
            app.config.interaction = mode;
            app.viewport.set_adapter(adapter_for(
                mode,
                app.config.reference_before_secs,
                app.config.reference_after_secs,
            ));
            app.ui.reference_time = None;
            app.reference_records.clear();
        }

        ui.separator();

        if ui.button("💾").on_hover_text("Save settings").clicked() {
            app.save_config();
        }
        if ui.button("⚙").on_hover_text("Load settings").clicked() {
            app.load_config();
        }
        let theme = if app.config.dark_mode { "☀" } else { "🌙" };
        if ui.button(theme).on_hover_text("Toggle theme").clicked() {
            app.config.dark_mode = !app.config.dark_mode;
        }

        if let Some(progress) = app.ui.stats_progress {
            ui.separator();
            ui.spinner();
            ui.label(format!("Statistics {progress}%"));
        }
    });

    let mut dismiss = false;
    if let Some(status) = &app.ui.status {
        ui.horizontal(|ui| {
            let color = match status.level {
                StatusLevel::Error => Color32::from_rgb(255, 90, 90),
                StatusLevel::Info => ui.visuals().weak_text_color(),
            };
            let text = if status.title.is_empty() {
                status.text.clone()
            } else {
                format!("{}: {}", status.title, status.text)
            };
            ui.colored_label(color, text);
            dismiss = ui.small_button("✖").clicked();
        });
    }
    if dismiss {
        app.ui.clear_status();
    }

    let dropped = ctx.input(|i| {
        i.raw
            .dropped_files
            .iter()
            .filter_map(|f| f.path.clone())
            .collect::<Vec<_>>()
    });
    for (index, path) in dropped.into_iter().enumerate() {
        // First drop replaces, the rest append
        let append = index > 0 || ctx.input(|i| i.modifiers.shift);
        if let Err(e) = app.load_file(path, append) {
            app.ui.set_error(e.title(), e.user_message());
        }
    }
}
