mod chart;
mod series_panel;
mod stats_panel;
mod toolbar;

pub use chart::render_chart;
pub use series_panel::render_series_panel;
pub use stats_panel::render_stats_panel;
pub use toolbar::render_toolbar;
