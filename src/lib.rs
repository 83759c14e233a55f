pub mod app;
pub mod feeds;
pub mod fetch;
pub mod poller;
pub mod render;
pub mod settings;
mod utils;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use log::warn;

use app::{Application, HeadlessUi};
use feeds::release::CURRENT_VERSION;
use fetch::HttpFetchClient;
use poller::state::StateCell;
use poller::worker::Worker;
use render::HeadlessSurface;
use settings::{AppSettings, SettingsStore};

pub fn run() -> anyhow::Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    let level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();

    log::info!("isswatch {} starting up...", CURRENT_VERSION);

    let settings = load_settings()?;
    let client = Arc::new(HttpFetchClient::new().context("Failed to build HTTP client")?);

    let surface = HeadlessSurface::new();
    let _interrupt_watcher = spawn_interrupt_watcher(surface.close_handle())?;

    let mut app = Application::new(client, surface, HeadlessUi::new(), settings);
    app.run()?;

    log::info!("isswatch exited cleanly");
    Ok(())
}

fn load_settings() -> anyhow::Result<AppSettings> {
    match settings::default_path() {
        Some(path) => {
            log::info!("Loading settings from {}", path.display());
            Ok(SettingsStore::new(path)?.get())
        }
        None => {
            warn!("No config directory available; using default settings");
            Ok(AppSettings::default())
        }
    }
}

/// Asks the surface to close on Ctrl-C. The returned worker is joined when
/// dropped.
fn spawn_interrupt_watcher(close_flag: Arc<AtomicBool>) -> anyhow::Result<Worker> {
    Worker::spawn("interrupt-watcher", StateCell::default(), move |cancel_token| {
        async move {
            tokio::select! {
                _ = cancel_token.cancelled() => {}
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => {
                        log::info!("Interrupt received, closing");
                        close_flag.store(true, Ordering::SeqCst);
                    }
                    Err(err) => warn!("Failed to listen for Ctrl-C: {}", err),
                },
            }
        }
    })
}
