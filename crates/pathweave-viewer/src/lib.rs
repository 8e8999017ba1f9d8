//! Pathweave Viewer - live tail, search and download of session logs
//!
//! A watcher thread follows the logs directory and pushes new lines to every
//! connected client over server-sent events.

mod registry;

pub use registry::{client_stream, ClientRegistry, Mailbox, MAILBOX_CAPACITY};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{
        sse::{KeepAlive, Sse},
        Html, IntoResponse, Json, Response,
    },
    routing::get,
    Router,
};
use pathweave_core::{Result, WATCH_IDLE_POLL_MS};
use pathweave_logs::{ensure_log_dir, list_log_files, resolve_log_file, search, LogTailer};
use pathweave_watch::{FileWatcher, WatchConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

const VIEWER_PAGE: &str = include_str!("../static/viewer.html");

/// Shared viewer state
#[derive(Clone)]
pub struct ViewerState {
    pub logs_dir: Arc<PathBuf>,
    pub tailer: Arc<LogTailer>,
    pub clients: Arc<ClientRegistry>,
}

impl ViewerState {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        let logs_dir = logs_dir.into();
        Self {
            tailer: Arc::new(LogTailer::new(logs_dir.clone())),
            logs_dir: Arc::new(logs_dir),
            clients: Arc::new(ClientRegistry::new()),
        }
    }

    /// Deliver whatever was appended to `name` since the last poll
    pub fn handle_change(&self, name: &str) -> usize {
        match self.tailer.poll(name) {
            Ok(entries) if !entries.is_empty() => {
                debug!("{} new entries in {}", entries.len(), name);
                self.clients.broadcast(&entries)
            }
            Ok(_) => 0,
            Err(e) => {
                error!("Error reading log file {}: {}", name, e);
                0
            }
        }
    }

    /// Poll every tracked file and deliver new entries
    pub fn poll_tracked(&self) -> usize {
        self.tailer
            .poll_tracked()
            .into_iter()
            .map(|(_, entries)| self.clients.broadcast(&entries))
            .sum()
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Create the viewer router
pub fn create_router(state: ViewerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/api/logs", get(get_logs))
        .route("/api/files", get(get_files))
        .route("/api/stream", get(stream_logs))
        .route("/api/download/:filename", get(download_log))
        .route("/api/search", get(search_logs))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Follow the logs directory from a background thread
pub fn spawn_watcher(state: ViewerState) -> Result<thread::JoinHandle<()>> {
    let mut watcher = FileWatcher::new(WatchConfig::default())?;
    watcher.watch(&state.logs_dir)?;

    let handle = thread::Builder::new()
        .name("pathweave-log-watcher".to_string())
        .spawn(move || {
            let idle = Duration::from_millis(WATCH_IDLE_POLL_MS);
            loop {
                match watcher.wait(idle) {
                    Some(event) => {
                        for name in event.file_names() {
                            state.handle_change(&name);
                        }
                    }
                    None => {
                        state.poll_tracked();
                    }
                }
            }
        })?;

    Ok(handle)
}

/// Start the watcher and serve the viewer until shutdown
pub async fn start_viewer(logs_dir: PathBuf, port: u16) -> Result<()> {
    ensure_log_dir(&logs_dir)?;

    let state = ViewerState::new(logs_dir);
    spawn_watcher(state.clone())?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Log viewer listening on http://{} (logs: {})", addr, state.logs_dir.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

// === Handlers ===

#[derive(Debug, Deserialize)]
struct LogsQuery {
    file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
    file: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

async fn index() -> Html<&'static str> {
    Html(VIEWER_PAGE)
}

async fn get_logs(State(state): State<ViewerState>, Query(query): Query<LogsQuery>) -> Response {
    let tailer = state.tailer.clone();
    let file = non_empty(&query.file).map(str::to_string);
    match tokio::task::spawn_blocking(move || tailer.initial_entries(file.as_deref())).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn get_files(State(state): State<ViewerState>) -> Response {
    let logs_dir = state.logs_dir.clone();
    match tokio::task::spawn_blocking(move || list_log_files(&logs_dir)).await {
        Ok(Ok(files)) => Json(files).into_response(),
        Ok(Err(e)) => {
            error!("Error listing log files: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn stream_logs(State(state): State<ViewerState>) -> impl IntoResponse {
    Sse::new(client_stream(state.clients.clone())).keep_alive(KeepAlive::default())
}

async fn download_log(State(state): State<ViewerState>, Path(filename): Path<String>) -> Response {
    let path = match resolve_log_file(&state.logs_dir, &filename) {
        Ok(path) => path,
        Err(e) => {
            debug!("Download of {} refused: {}", filename, e);
            return error_response(StatusCode::NOT_FOUND, "File not found");
        }
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
                .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
            (
                [
                    (header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            error!("Error reading {}: {}", path.display(), e);
            error_response(StatusCode::NOT_FOUND, "File not found")
        }
    }
}

async fn search_logs(State(state): State<ViewerState>, Query(query): Query<SearchQuery>) -> Response {
    let logs_dir = state.logs_dir.clone();
    let file = non_empty(&query.file).map(str::to_string);
    let hits = tokio::task::spawn_blocking(move || search(&logs_dir, &query.q, file.as_deref()));
    match hits.await {
        Ok(Ok(hits)) => Json(hits).into_response(),
        Ok(Err(e)) => {
            error!("Error searching logs: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
