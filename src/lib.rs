//! trend-oxide: interactive time-series viewer with windowed statistics
//!
//! The core (`data`, `perf`, `render`, `state`) is UI-agnostic apart from
//! emitting `egui` geometry; `app` and `ui` wire it into an eframe window.

pub mod app;
pub mod config;
pub mod constants;
pub mod data;
pub mod error;
pub mod format;
pub mod perf;
pub mod render;
pub mod state;
pub mod ui;

pub use app::TrendOxide;
pub use error::{Result, TrendError};
