// gateway.rs - Browser-facing HTTP: control page, command events, video feed
use crate::console::{BoxedLink, Console, Stamp};
use crate::dispatch::Event;
use crate::video::{self, BoxedSource};
use crate::{CommandRequest, CommandResponse};
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const INDEX_HTML: &str = include_str!("../static/index.html");

pub type SharedConsole = Arc<Mutex<Console>>;
type FrameFactory = Arc<dyn Fn() -> Option<BoxedSource> + Send + Sync>;
type LinkFactory = Arc<dyn Fn() -> Option<BoxedLink> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    console: SharedConsole,
    frames: FrameFactory,
    frame_interval: Duration,
    links: LinkFactory,
}

impl AppState {
    pub fn new(console: SharedConsole) -> Self {
        Self {
            console,
            frames: Arc::new(|| None),
            frame_interval: Duration::from_millis(50),
            links: Arc::new(|| None),
        }
    }

    /// Each `/video_feed` client gets its own source from `factory`.
    pub fn with_frames<F>(mut self, factory: F, interval: Duration) -> Self
    where
        F: Fn() -> Option<BoxedSource> + Send + Sync + 'static,
    {
        self.frames = Arc::new(factory);
        self.frame_interval = interval;
        self
    }

    /// How `/reconnect` opens a new serial link.
    pub fn with_links<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Option<BoxedLink> + Send + Sync + 'static,
    {
        self.links = Arc::new(factory);
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/command", post(command))
        .route("/reconnect", post(reconnect))
        .route("/video_feed", get(video_feed))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Json<CommandResponse> {
    let command = request.command.unwrap_or_default();
    if command.trim().is_empty() {
        return Json(CommandResponse::failure("No command received"));
    }

    let event = Event::parse(&command);
    let stamp = request.seq.map(|seq| Stamp {
        session: request.session.unwrap_or_default(),
        seq,
    });
    let console = state.console.clone();
    // serial writes may block; ordering check and event run under one lock
    let handled = tokio::task::spawn_blocking(move || {
        console
            .lock()
            .map(|mut console| console.handle_stamped(stamp, &event))
            .ok()
    })
    .await
    .unwrap_or(None);

    match handled {
        Some(true) => Json(CommandResponse::success(command)),
        Some(false) => Json(CommandResponse::failure("Out of order")),
        None => {
            log::error!("Console unavailable, dropped {:?}", command);
            Json(CommandResponse::failure("Console unavailable"))
        }
    }
}

async fn reconnect(State(state): State<AppState>) -> Json<CommandResponse> {
    let AppState { console, links, .. } = state;
    let reconnected = tokio::task::spawn_blocking(move || {
        let Some(link) = links() else {
            return false;
        };
        match console.lock() {
            Ok(mut console) => {
                console.reconnect(link);
                true
            }
            Err(_) => false,
        }
    })
    .await
    .unwrap_or(false);

    if reconnected {
        Json(CommandResponse::success("RECONNECT"))
    } else {
        log::warn!("Reconnect failed, no serial port available");
        Json(CommandResponse::failure("No serial ports available."))
    }
}

async fn video_feed(State(state): State<AppState>) -> Response {
    let Some(source) = (state.frames)() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "No camera configured").into_response();
    };
    let body = Body::from_stream(video::mjpeg_stream(source, state.frame_interval));
    ([(header::CONTENT_TYPE, video::CONTENT_TYPE)], body).into_response()
}
