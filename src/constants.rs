//! Application-wide constants and default values
//!
//! This module centralizes the magic numbers used by the core and the viewer,
//! making them easier to maintain and configure.

/// Raw record ingestion
pub mod ingest {
    /// Integer tick counts are divided by this to reach epoch milliseconds
    pub const TICKS_PER_MILLISECOND: i64 = 10_000;

    /// `yyyyMMddHHmmss`
    pub const COMPACT_TIMESTAMP_LENGTH: usize = 14;

    /// Localized timestamp format (`dd/mm/yyyy hh:mm:ss`)
    pub const LOCALIZED_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

    /// Column names in record files
    pub const SERIES_KEY_COLUMN: &str = "Name";
    pub const AUX_ATTRIBUTE_COLUMN: &str = "TextAttr03";
    pub const TIMESTAMP_COLUMN: &str = "TS";
    pub const TICKS_COLUMN: &str = "Chrono";
    pub const VALUE_COLUMN: &str = "Value";
    pub const QUALITY_COLUMN: &str = "Quality";
}

/// Series merging
pub mod merge {
    /// Points per chunk when splitting a large import for pairwise reduction
    pub const CHUNK_SIZE: usize = 50_000;

    /// Pairwise merge steps run per frame while an append is pending
    pub const STEPS_PER_FRAME: usize = 4;
}

/// Statistics computation
pub mod stats {
    /// Records processed between two progress messages
    pub const PROGRESS_INTERVAL: usize = 1_000;

    /// Window size (points) above which the viewer delegates to the worker
    pub const WORKER_THRESHOLD: usize = 50_000;

    /// Default wall-clock budget for a worker round trip
    pub const WORKER_BUDGET_MS: u64 = 5_000;
}

/// Viewport interaction defaults
pub mod viewport {
    /// Delay used to coalesce continuous brush/zoom before recomputing stats
    pub const DEBOUNCE_MS: u64 = 75;

    /// Reference window around a double-clicked instant
    pub const REFERENCE_BEFORE_SECS: i64 = 10;
    pub const REFERENCE_AFTER_SECS: i64 = 10;

    /// Scroll zoom factor per wheel notch
    pub const ZOOM_STEP: f64 = 1.2;
}

/// Performance and optimization constants
pub mod performance {
    /// Point threshold before applying LTTB downsampling
    pub const DOWNSAMPLE_THRESHOLD: usize = 5000;
}

/// Plotting and visualization defaults
pub mod plot {
    /// Main chart height in pixels
    pub const MAIN_HEIGHT: f32 = 400.0;

    /// Navigator height in pixels
    pub const NAVIGATOR_HEIGHT: f32 = 100.0;

    /// Margins around the main chart (top, right, bottom, left)
    pub const MARGIN_TOP: f32 = 20.0;
    pub const MARGIN_RIGHT: f32 = 30.0;
    pub const MARGIN_BOTTOM: f32 = 30.0;
    pub const MARGIN_LEFT: f32 = 60.0;

    /// Stroke widths
    pub const MAIN_STROKE: f32 = 1.5;
    pub const NAVIGATOR_STROKE: f32 = 1.0;

    /// Tick counts requested from the scales
    pub const TIME_TICKS: usize = 8;
    pub const VALUE_TICKS: usize = 6;
}

/// Configuration file paths
pub mod config {
    /// Configuration file name
    pub const CONFIG_FILE: &str = "trend-oxide.json";
}
