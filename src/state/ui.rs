//! UI interaction state of the viewer

use crate::data::record::EpochMillis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

/// Message shown in the status bar
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub status: Option<StatusMessage>,
    /// Case-insensitive filter applied to the variable list
    pub variable_filter: String,
    /// Navigator x where the current brush drag started
    pub brush_anchor: Option<f32>,
    /// Instant picked by the last double-click in reference mode
    pub reference_time: Option<EpochMillis>,
    /// Latest worker progress for the pending request
    pub stats_progress: Option<u8>,
    pub show_full_stats: bool,
}

impl UiState {
    pub fn new() -> Self {
        Self {
            show_full_stats: true,
            ..Self::default()
        }
    }

    pub fn set_error(&mut self, title: impl Into<String>, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            level: StatusLevel::Error,
            title: title.into(),
            text: text.into(),
        });
    }

    pub fn set_info(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            level: StatusLevel::Info,
            title: String::new(),
            text: text.into(),
        });
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    pub fn has_error(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.level == StatusLevel::Error)
    }

    /// Whether `label` passes the variable filter
    pub fn matches_filter(&self, label: &str) -> bool {
        self.variable_filter.is_empty()
            || label
                .to_lowercase()
                .contains(&self.variable_filter.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_levels() {
        let mut ui = UiState::new();
        assert!(ui.show_full_stats);
        ui.set_error("Timeout", "took too long");
        assert!(ui.has_error());
        ui.set_info("loaded");
        assert!(!ui.has_error());
        ui.clear_status();
        assert!(ui.status.is_none());
    }

    #[test]
    fn test_variable_filter() {
        let mut ui = UiState::new();
        assert!(ui.matches_filter("RCP001MT (°C)"));
        ui.variable_filter = "rcp".into();
        assert!(ui.matches_filter("RCP001MT (°C)"));
        assert!(!ui.matches_filter("ARE002"));
    }
}
