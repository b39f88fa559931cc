#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::PathBuf;

use eframe::egui;
use tracing_subscriber::EnvFilter;
use trend_oxide::TrendOxide;

#[cfg(feature = "profile-with-puffin")]
fn start_puffin_server() -> Option<puffin_http::Server> {
    puffin::set_scopes_on(true);
    match puffin_http::Server::new(&format!("127.0.0.1:{}", puffin_http::DEFAULT_PORT)) {
        Ok(server) => {
            tracing::info!(port = puffin_http::DEFAULT_PORT, "puffin server listening");
            Some(server)
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to start puffin server");
            None
        }
    }
}

fn main() -> eframe::Result {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    #[cfg(feature = "profile-with-puffin")]
    let _puffin_server = start_puffin_server();

    // Files named on the command line are loaded in order, the rest appended
    let files: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Trend Oxide",
        options,
        Box::new(move |_| {
            let mut app = TrendOxide::default();
            for (index, path) in files.into_iter().enumerate() {
                if let Err(e) = app.load_file(path.clone(), index > 0) {
                    tracing::error!(path = %path.display(), error = %e, "failed to load file");
                    app.ui.set_error(e.title(), e.user_message());
                }
            }
            Ok(Box::new(app))
        }),
    )
}
