// Server.rs - Tethered Drive console
use std::sync::{Arc, Mutex};

use tethered_drive::config::Config;
use tethered_drive::console::{BoxedLink, Console};
use tethered_drive::gateway::{self, AppState};
use tethered_drive::link::{self, PortLink};
use tethered_drive::video::{BoxedSource, JpegFileSource};
use tethered_drive::Error;

// Explicit path if configured, otherwise the first port that opens.
fn open_link(serial_path: Option<&str>, baud: u32) -> Option<BoxedLink> {
    let path = match serial_path {
        Some(path) => path.to_string(),
        None => match link::first_available_port() {
            Some(path) => path,
            None => {
                log::warn!("No serial ports available.");
                return None;
            }
        },
    };

    match PortLink::open(&path, baud) {
        Ok(port) => Some(Box::new(port)),
        Err(e) => {
            log::warn!("Failed to connect to {}: {}", path, e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    log::info!("Starting with {:?}", config);

    let link = open_link(config.serial_path.as_deref(), config.baud);
    let console = Arc::new(Mutex::new(Console::new(link, config.steps)));

    // 1. Reconnect re-runs the same port selection
    let serial_path = config.serial_path.clone();
    let baud = config.baud;
    let mut state = AppState::new(console.clone())
        .with_links(move || open_link(serial_path.as_deref(), baud));

    // 2. Video feed, one file reader per viewer
    match config.frame_path.clone() {
        Some(path) => {
            log::info!("Serving camera frames from {}", path.display());
            state = state.with_frames(
                move || Some(Box::new(JpegFileSource::new(path.clone())) as BoxedSource),
                config.frame_interval,
            );
        }
        None => log::info!("TETHER_FRAME_PATH unset, video feed disabled"),
    }

    // 3. Serve until Ctrl+C
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    log::info!("Console listening on http://{}", config.bind_addr());
    axum::serve(listener, gateway::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if let Ok(mut console) = console.lock() {
        console.disconnect();
    }
    log::info!("Shut down");
    Ok(())
}
