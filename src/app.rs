use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use eframe::egui;

use crate::config::ViewerConfig;
use crate::constants::config::CONFIG_FILE;
use crate::constants::merge::STEPS_PER_FRAME;
use crate::data::normalize::ingest;
use crate::data::record::Domain;
use crate::data::source::{load_records, FileInfo};
use crate::data::stats::{compute_full_stats, compute_stats, VariableStats};
use crate::error::{Result, TrendError};
use crate::perf::{SchedulerEvent, StatsScheduler};
use crate::render::lookup::{records_around, TaggedPoint};
use crate::render::RenderEngine;
use crate::state::interaction::adapter_for;
use crate::state::{
    AppContext, Dataset, DomainChange, DomainOrigin, PendingAppend, UiState, ViewportController,
};

/// The viewer application
pub struct TrendOxide {
    pub ctx: AppContext,
    pub viewport: ViewportController,
    pub render: RenderEngine,
    pub scheduler: StatsScheduler,
    pub config: ViewerConfig,
    pub config_path: PathBuf,
    pub ui: UiState,
    pub files: Vec<FileInfo>,
    /// Statistics for the current domain
    pub window_stats: Vec<VariableStats>,
    /// Statistics over each selected series' full extent
    pub full_stats: Vec<VariableStats>,
    /// Points around the reference instant, in reference mode
    pub reference_records: Vec<TaggedPoint>,
    /// Append still being merged, with the summary of its file
    pending_append: Option<(PendingAppend, FileInfo)>,
    last_change: Rc<RefCell<Option<DomainChange>>>,
}

impl Default for TrendOxide {
    fn default() -> Self {
        Self::new(ViewerConfig::load_or_default(Path::new(CONFIG_FILE)), PathBuf::from(CONFIG_FILE))
    }
}

impl TrendOxide {
    pub fn new(config: ViewerConfig, config_path: PathBuf) -> Self {
        let mut viewport = ViewportController::new(config.debounce());
        let last_change = Rc::new(RefCell::new(None));
        let sink = last_change.clone();
        viewport.subscribe(move |change: &DomainChange| {
            *sink.borrow_mut() = Some(*change);
        });

        let mut app = Self {
            ctx: AppContext::default(),
            viewport,
            render: RenderEngine::new(config.y_axis, config.max_render_points),
            scheduler: StatsScheduler::new(
                config.progress_interval,
                config.worker_budget(),
                config.worker_threshold,
            ),
            config,
            config_path,
            ui: UiState::new(),
            files: Vec::new(),
            window_stats: Vec::new(),
            full_stats: Vec::new(),
            reference_records: Vec::new(),
            pending_append: None,
            last_change,
        };
        app.apply_config();
        app
    }

    /// Push config values into the engine and controller
    pub fn apply_config(&mut self) {
        self.render.y_policy = self.config.y_axis;
        self.render.max_render_points = self.config.max_render_points;
        self.viewport.set_debounce(self.config.debounce());
        self.viewport.set_adapter(adapter_for(
            self.config.interaction,
            self.config.reference_before_secs,
            self.config.reference_after_secs,
        ));
    }

    /// Load a record file, replacing the dataset or appending to it
    pub fn load_file(&mut self, path: PathBuf, append: bool) -> Result<()> {
        let loaded = load_records(&path)?;
        let outcome = ingest(&loaded.records);
        if outcome.series.iter().all(|s| s.is_empty()) {
            return Err(TrendError::EmptyDataset);
        }

        let info = FileInfo::describe(&loaded, &outcome.series);
        let dropped = outcome.dropped_count;
        tracing::info!(path = %path.display(), append, dropped, "file ingested");

        if dropped > 0 {
            self.ui.set_info(format!("{dropped} malformed records skipped"));
        } else {
            self.ui.clear_status();
        }

        if append && !self.ctx.dataset.is_empty() {
            // Appends apply in order
            self.step_append(usize::MAX);
            let job = self
                .ctx
                .dataset
                .begin_append(outcome, self.config.merge_chunk_size);
            self.pending_append = Some((job, info));
            self.step_append(STEPS_PER_FRAME);
        } else {
            self.pending_append = None;
            self.ctx = self
                .ctx
                .with_dataset(Dataset::from_ingest(outcome))
                .with_selection(Vec::new());
            self.files = vec![info];
            self.dataset_changed();
        }
        Ok(())
    }

    pub fn is_merging(&self) -> bool {
        self.pending_append.is_some()
    }

    /// Advance a pending append; the merged snapshot is swapped in once complete
    fn step_append(&mut self, steps: usize) {
        let Some((job, _)) = self.pending_append.as_mut() else {
            return;
        };
        if !job.step(steps) {
            return;
        }
        if let Some((job, info)) = self.pending_append.take() {
            self.ctx = self.ctx.with_dataset(job.finish());
            self.files.push(info);
            self.dataset_changed();
        }
    }

    fn dataset_changed(&mut self) {
        tracing::info!(
            version = self.ctx.dataset_version(),
            variables = self.ctx.dataset.variables.len(),
            files = self.files.len(),
            "dataset updated"
        );
        self.selection_changed();
    }

    /// Rebuild everything derived from the selection
    pub fn selection_changed(&mut self) {
        let series = self.ctx.selected_series();
        self.scheduler.cancel();
        self.ui.stats_progress = None;
        self.reference_records.clear();
        self.render.data_changed();

        if self.viewport.load(&series).is_none() {
            self.window_stats.clear();
        }
        self.full_stats = compute_full_stats(&series);
        self.ctx = self.ctx.with_domain(self.viewport.domain());
    }

    pub fn reset_view(&mut self) {
        self.viewport.reset();
    }

    /// Window statistics, inline for small windows and on the worker otherwise
    fn recompute_stats(&mut self, domain: Domain) {
        let series = self.ctx.selected_series();

        if self.scheduler.should_offload(&series, domain) {
            match self.scheduler.submit(domain, series) {
                Ok(_) => self.ui.stats_progress = Some(0),
                Err(e) => self.ui.set_error(e.title(), e.user_message()),
            }
            return;
        }

        // A pending worker result would be stale now
        self.scheduler.cancel();
        self.ui.stats_progress = None;
        self.window_stats = compute_stats(&series, domain);
    }

    fn handle_scheduler_event(&mut self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::Progress { percent, .. } => self.ui.stats_progress = Some(percent),
            SchedulerEvent::Ready { domain, stats, .. } => {
                self.ui.stats_progress = None;
                if self.viewport.domain() == Some(domain) {
                    self.window_stats = stats;
                }
            }
            SchedulerEvent::Failed(TrendError::WorkerCancelled { request_id }) => {
                tracing::debug!(%request_id, "worker request cancelled");
                self.ui.stats_progress = None;
            }
            SchedulerEvent::Failed(e) => {
                self.ui.stats_progress = None;
                self.ui.set_error(e.title(), e.user_message());
            }
        }
    }

    /// Per-frame bookkeeping: domain changes, debounce, worker responses
    fn pump(&mut self, ctx: &egui::Context) {
        profiling::scope!("TrendOxide::pump");
        let now = Instant::now();

        if self.is_merging() {
            self.step_append(STEPS_PER_FRAME);
            ctx.request_repaint();
        }

        let change = self.last_change.borrow_mut().take();
        if let Some(change) = change {
            self.ctx = self.ctx.with_domain(Some(change.domain));
            if change.origin == DomainOrigin::Reference {
                if let Some(t) = self.ui.reference_time {
                    self.reference_records = records_around(
                        &self.ctx.selected_series(),
                        t,
                        self.config.reference_before_secs * 1000,
                        self.config.reference_after_secs * 1000,
                    );
                }
            }
        }

        while let Some(event) = self.scheduler.poll() {
            self.handle_scheduler_event(event);
        }
        if let Some(event) = self.scheduler.expire(now) {
            self.handle_scheduler_event(event);
        }

        if let Some(domain) = self.viewport.take_due_recompute(now) {
            self.recompute_stats(domain);
        }

        if let Some(remaining) = self.viewport.recompute_remaining(now) {
            ctx.request_repaint_after(remaining);
        }
        if self.scheduler.is_busy() {
            ctx.request_repaint_after(std::time::Duration::from_millis(50));
        }
    }

    pub fn save_config(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .set_file_name(CONFIG_FILE)
            .save_file()
        {
            match self.config.save(&path) {
                Ok(()) => self.config_path = path,
                Err(e) => self.ui.set_error(e.title(), e.user_message()),
            }
        }
    }

    pub fn load_config(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .pick_file()
        {
            match ViewerConfig::load(&path) {
                Ok(config) => {
                    self.config = config;
                    self.config_path = path;
                    // Worker settings are fixed at spawn
                    self.scheduler = StatsScheduler::new(
                        self.config.progress_interval,
                        self.config.worker_budget(),
                        self.config.worker_threshold,
                    );
                    self.ui.stats_progress = None;
                    self.apply_config();
                    self.viewport.flush_recompute();
                    if let Some(domain) = self.viewport.domain() {
                        self.recompute_stats(domain);
                    }
                }
                Err(e) => self.ui.set_error(e.title(), e.user_message()),
            }
        }
    }
}

impl eframe::App for TrendOxide {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        profiling::finish_frame!();

        ctx.set_visuals(if self.config.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        });

        self.pump(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            crate::ui::render_toolbar(self, ctx, ui);
        });

        egui::TopBottomPanel::bottom("stats")
            .resizable(true)
            .default_height(220.0)
            .show(ctx, |ui| {
                crate::ui::render_stats_panel(self, ui);
            });

        egui::SidePanel::left("variables")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| {
                crate::ui::render_series_panel(self, ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            crate::ui::render_chart(self, ui);
        });

        self.viewport.end_cycle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::VariableId;
    use std::io::Write;
    use tempfile::Builder;

    fn csv(rows: &[&str]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Name;Value;TS").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn app() -> TrendOxide {
        app_with(ViewerConfig::default())
    }

    fn app_with(config: ViewerConfig) -> TrendOxide {
        let dir = tempfile::tempdir().unwrap();
        TrendOxide::new(config, dir.path().join(CONFIG_FILE))
    }

    #[test]
    fn test_load_then_append() {
        let mut app = app();
        let first = csv(&["A;1;15/01/2024 14:30:00", "A;2;15/01/2024 14:30:10"]);
        let second = csv(&["B;5;15/01/2024 14:29:00", "A;3;15/01/2024 14:30:05", "A;x;bad"]);

        app.load_file(first.path().to_path_buf(), false).unwrap();
        assert_eq!(app.ctx.dataset_version(), 1);

        app.ctx = app.ctx.with_toggled(&VariableId::new("A", ""));
        app.selection_changed();
        assert!(app.viewport.domain().is_some());
        assert_eq!(app.full_stats[0].stats.map(|s| s.count), Some(2));

        app.load_file(second.path().to_path_buf(), true).unwrap();
        assert_eq!(app.ctx.dataset_version(), 2);
        assert_eq!(app.files.len(), 2);
        // Selection survives an append
        assert_eq!(app.full_stats[0].stats.map(|s| s.count), Some(3));
        assert!(app.ui.status.is_some());
    }

    #[test]
    fn test_large_append_merges_across_frames() {
        let mut app = app_with(ViewerConfig {
            merge_chunk_size: 1,
            ..ViewerConfig::default()
        });
        let first = csv(&[
            "A;1;15/01/2024 14:30:00",
            "A;3;15/01/2024 14:30:02",
            "A;5;15/01/2024 14:30:04",
            "A;7;15/01/2024 14:30:06",
            "A;9;15/01/2024 14:30:08",
            "A;11;15/01/2024 14:30:10",
        ]);
        let second = csv(&[
            "A;2;15/01/2024 14:30:01",
            "A;4;15/01/2024 14:30:03",
            "A;6;15/01/2024 14:30:05",
            "A;8;15/01/2024 14:30:07",
            "A;10;15/01/2024 14:30:09",
            "A;12;15/01/2024 14:30:11",
        ]);

        app.load_file(first.path().to_path_buf(), false).unwrap();
        app.ctx = app.ctx.with_toggled(&VariableId::new("A", ""));
        app.selection_changed();

        app.load_file(second.path().to_path_buf(), true).unwrap();
        // One frame's worth of steps is not enough for twelve chunks
        assert!(app.is_merging());
        assert_eq!(app.ctx.dataset_version(), 1);
        assert_eq!(app.files.len(), 1);

        let mut frames = 0;
        while app.is_merging() {
            app.step_append(STEPS_PER_FRAME);
            frames += 1;
            assert!(frames < 100, "append never finished");
        }
        assert_eq!(app.ctx.dataset_version(), 2);
        assert_eq!(app.files.len(), 2);
        let values: Vec<f64> = app.ctx.dataset.series[0].points.iter().map(|p| p.value).collect();
        assert_eq!(values, (1..=12).map(f64::from).collect::<Vec<_>>());
        assert_eq!(app.full_stats[0].stats.map(|s| s.count), Some(12));
    }

    #[test]
    fn test_inline_recompute_after_debounce() {
        let mut app = app();
        let file = csv(&["A;1;15/01/2024 14:30:00", "A;3;15/01/2024 14:31:00"]);
        app.load_file(file.path().to_path_buf(), false).unwrap();
        app.ctx = app.ctx.with_toggled(&VariableId::new("A", ""));
        app.selection_changed();

        let domain = app.viewport.flush_recompute().unwrap();
        app.recompute_stats(domain);
        assert_eq!(app.window_stats[0].stats.map(|s| s.mean), Some(2.0));
    }

    #[test]
    fn test_empty_file_is_an_error() {
        let mut app = app();
        let file = csv(&["A;x;garbage"]);
        let err = app.load_file(file.path().to_path_buf(), false).unwrap_err();
        assert!(matches!(err, TrendError::EmptyDataset));
    }
}
