//! Viewer configuration persisted as JSON

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::merge::CHUNK_SIZE;
use crate::constants::performance::DOWNSAMPLE_THRESHOLD;
use crate::constants::stats::{PROGRESS_INTERVAL, WORKER_BUDGET_MS, WORKER_THRESHOLD};
use crate::constants::viewport::{DEBOUNCE_MS, REFERENCE_AFTER_SECS, REFERENCE_BEFORE_SECS};
use crate::error::{Result, TrendError};
use crate::render::YAxisPolicy;
use crate::state::InteractionMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Quiet period after the last brush/zoom event before stats are recomputed
    pub debounce_ms: u64,
    /// Points in the window above which stats go to the background worker
    pub worker_threshold: usize,
    pub progress_interval: usize,
    /// Wall-clock budget for one worker request
    pub worker_budget_ms: u64,
    pub reference_before_secs: i64,
    pub reference_after_secs: i64,
    pub y_axis: YAxisPolicy,
    pub interaction: InteractionMode,
    pub max_render_points: usize,
    /// Appends longer than this are merged over several frames
    pub merge_chunk_size: usize,
    pub dark_mode: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEBOUNCE_MS,
            worker_threshold: WORKER_THRESHOLD,
            progress_interval: PROGRESS_INTERVAL,
            worker_budget_ms: WORKER_BUDGET_MS,
            reference_before_secs: REFERENCE_BEFORE_SECS,
            reference_after_secs: REFERENCE_AFTER_SECS,
            y_axis: YAxisPolicy::default(),
            interaction: InteractionMode::default(),
            max_render_points: DOWNSAMPLE_THRESHOLD,
            merge_chunk_size: CHUNK_SIZE,
            dark_mode: true,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ViewerConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Defaults when the file is absent; a warning and defaults when it is unreadable
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded viewer config");
                config
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable viewer config");
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.progress_interval == 0 {
            return Err(TrendError::Config("progress_interval must be positive".into()));
        }
        if self.merge_chunk_size == 0 {
            return Err(TrendError::Config("merge_chunk_size must be positive".into()));
        }
        if self.max_render_points < 3 {
            return Err(TrendError::Config("max_render_points must be at least 3".into()));
        }
        if self.reference_before_secs < 0 || self.reference_after_secs < 0 {
            return Err(TrendError::Config("reference window must not be negative".into()));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn worker_budget(&self) -> Duration {
        Duration::from_millis(self.worker_budget_ms)
    }
}
