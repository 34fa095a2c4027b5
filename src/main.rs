mod api;
mod app;
mod application;
mod config;
mod domain;
mod ui;
mod utils;

use iced::window;
use tracing_subscriber::EnvFilter;

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("video_saver=info")),
        )
        .init();

    let config = match config::AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(2);
        }
    };
    tracing::info!(
        "Using backend {} (downloads from {})",
        config.api.api_base,
        config.api.download_base
    );

    let icon_data = include_bytes!("../assets/icon.png");

    let icon = match image::load_from_memory(icon_data) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            let (width, height) = rgba.dimensions();
            window::icon::from_rgba(rgba.into_raw(), width, height).ok()
        }
        Err(e) => {
            tracing::warn!("Failed to load window icon: {}", e);
            None
        }
    };

    iced::application(
        move || app::VideoSaverApp::new(config.clone()),
        app::update,
        app::view,
    )
    .title("Video Saver")
    .window(window::Settings {
        icon,
        ..Default::default()
    })
    .run()
}
