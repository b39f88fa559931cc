use eframe::egui::{self, Color32};
use egui_extras::{Column, TableBuilder};

use crate::app::TrendOxide;
use crate::data::stats::VariableStats;
use crate::format::{format_duration, format_file_size, format_number, format_timestamp};
use crate::render::color_for;

fn stats_table(ui: &mut egui::Ui, id: &str, rows: &[VariableStats], app: &TrendOxide) {
    ui.push_id(id, |ui| {
        TableBuilder::new(ui)
            .striped(true)
            .column(Column::auto().at_least(140.0))
            .columns(Column::auto().at_least(70.0), 6)
            .header(18.0, |mut header| {
                for title in ["Variable", "Count", "Min", "Max", "Mean", "Median", "Std dev"] {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for row_stats in rows {
                    let color = app
                        .ctx
                        .selection_index(&row_stats.variable)
                        .map(color_for)
                        .unwrap_or(Color32::GRAY);
                    body.row(18.0, |mut row| {
                        row.col(|ui| {
                            ui.colored_label(color, row_stats.variable.display_label());
                        });
                        match row_stats.stats {
                            Some(s) => {
                                row.col(|ui| {
                                    ui.label(s.count.to_string());
                                });
                                for v in [s.min, s.max, s.mean, s.median, s.std_dev] {
                                    row.col(|ui| {
                                        ui.monospace(format_number(v));
                                    });
                                }
                            }
                            None => {
                                for _ in 0..6 {
                                    row.col(|ui| {
                                        ui.weak("-");
                                    });
                                }
                            }
                        }
                    });
                }
            });
    });
}

/// Window statistics, full-extent statistics and loaded file summaries
pub fn render_stats_panel(app: &mut TrendOxide, ui: &mut egui::Ui) {
    ui.horizontal(|ui| {
        ui.heading("Statistics");
        if let Some(domain) = app.viewport.domain() {
            ui.label(format!(
                "{} → {} ({})",
                format_timestamp(domain.start),
                format_timestamp(domain.end),
                format_duration(domain.start, domain.end)
            ));
        }
        if let Some(progress) = app.ui.stats_progress {
            ui.add(
                egui::ProgressBar::new(progress as f32 / 100.0)
                    .show_percentage()
                    .desired_width(120.0),
            );
        }
        if app.is_merging() {
            ui.spinner();
            ui.weak("Merging appended file");
        }
        ui.checkbox(&mut app.ui.show_full_stats, "Full extent");
    });
    ui.separator();

    let app: &TrendOxide = app;
    egui::ScrollArea::vertical().show(ui, |ui| {
        if app.window_stats.is_empty() {
            ui.weak("No statistics for the current selection");
        } else {
            stats_table(ui, "window_stats", &app.window_stats, app);
        }

        if app.ui.show_full_stats && !app.full_stats.is_empty() {
            ui.add_space(6.0);
            ui.label("Full extent");
            stats_table(ui, "full_stats", &app.full_stats, app);
        }

        if !app.reference_records.is_empty() {
            ui.add_space(6.0);
            egui::CollapsingHeader::new(format!(
                "Records around {}",
                app.ui.reference_time.map(format_timestamp).unwrap_or_default()
            ))
            .default_open(true)
            .show(ui, |ui| {
                for record in &app.reference_records {
                    ui.horizontal(|ui| {
                        ui.monospace(format_timestamp(record.point.timestamp));
                        ui.label(record.variable.display_label());
                        ui.monospace(format_number(record.point.value));
                    });
                }
            });
        }

        if !app.files.is_empty() {
            ui.add_space(6.0);
            egui::CollapsingHeader::new("Files").show(ui, |ui| {
                for file in &app.files {
                    let span = match (file.first_timestamp, file.last_timestamp) {
                        (Some(first), Some(last)) => format!(
                            "{} → {} ({})",
                            format_timestamp(first),
                            format_timestamp(last),
                            format_duration(first, last)
                        ),
                        _ => "no records".to_string(),
                    };
                    let exported = file
                        .exported_at
                        .map(|t| format!("  exported {}", format_timestamp(t)))
                        .unwrap_or_default();
                    ui.label(format!(
                        "{}  {}  {} variables  {}{}",
                        file.file_name,
                        format_file_size(file.file_size),
                        file.variables_count,
                        span,
                        exported
                    ));
                }
            });
        }
    });
}
