//! Dev server: the host page, the live preview document and the WebSocket
//! the two talk over.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path as AxumPath, State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;

use playpen_core::{
    Config, EditOrigin, FileSnapshotStore, Generation, SandboxStore, StoreOptions,
};
use playpen_render::{render_host, Synthesizer};

use crate::protocol::{ClientFrame, ServerFrame};
use crate::session::PreviewSession;

/// Overrides from the command line.
#[derive(Debug, Default)]
pub struct ServeOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub file: Option<PathBuf>,
    pub open: bool,
}

#[derive(Clone)]
struct AppState {
    session: Arc<PreviewSession>,
    host_page: Arc<str>,
}

/// Start the dev server.
pub async fn serve(config_path: &Path, opts: ServeOptions) -> Result<()> {
    let mut config = Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    if let Some(host) = opts.host {
        config.server.host = host;
    }
    if let Some(port) = opts.port {
        config.server.port = port;
    }

    let policy = config.sandbox_policy().context("Invalid sandbox policy")?;
    let persistence = FileSnapshotStore::new(config.state_path());
    let store = Arc::new(SandboxStore::load(
        Arc::new(persistence),
        StoreOptions {
            max_log_entries: config.console.max_entries,
            default_source: None,
        },
    ));

    // Keep the watcher alive for the lifetime of the server.
    let _watcher = match &opts.file {
        Some(path) => Some(watch_source(path, store.clone())?),
        None => None,
    };

    let session = PreviewSession::start(
        store,
        Synthesizer::new(config.preview.clone()),
        policy,
        Duration::from_millis(config.preview.debounce_ms),
    );
    let host_page = render_host("playpen", &session.policy(), &config.sandbox.referrer_policy)
        .context("Failed to render host page")?;

    let app = router(session, host_page.into());

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    let url = format!("http://{}", listener.local_addr()?);

    tracing::info!(%url, "playpen listening");
    println!("\nPlaypen at {}", url);
    println!("   Press Ctrl+C to stop\n");

    if opts.open {
        if let Err(e) = open::that(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn router(session: Arc<PreviewSession>, host_page: Arc<str>) -> Router {
    let state = AppState { session, host_page };

    Router::new()
        .route("/", get(serve_host))
        .route("/preview/{generation}", get(serve_preview))
        .route("/healthz", get(healthz))
        .route("/api/state", get(api_state))
        .route("/api/logs", get(api_logs).delete(api_clear_logs))
        .route("/api/refresh", post(api_refresh))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn serve_host(State(state): State<AppState>) -> Html<String> {
    Html(state.host_page.to_string())
}

/// Only the live generation is served; replaced documents are gone.
async fn serve_preview(
    State(state): State<AppState>,
    AxumPath(generation): AxumPath<u64>,
) -> Response {
    match state.session.document(Generation(generation)) {
        Some(doc) => (
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            doc.to_string(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "No such preview generation").into_response(),
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn api_state(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.store().state())
}

async fn api_logs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.store().logs())
}

async fn api_clear_logs(State(state): State<AppState>) -> StatusCode {
    state.session.store().clear_logs();
    StatusCode::NO_CONTENT
}

async fn api_refresh(State(state): State<AppState>) -> StatusCode {
    if state.session.refresh() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        if let Err(err) = handle_ws(socket, state.session).await {
            tracing::warn!(?err, "websocket session ended with error");
        }
    })
}

async fn handle_ws(mut socket: WebSocket, session: Arc<PreviewSession>) -> Result<()> {
    let mut frames = session.subscribe();

    let text = serde_json::to_string(&session.snapshot())?;
    socket.send(WsMessage::Text(text.into())).await?;

    loop {
        tokio::select! {
            recv = frames.recv() => {
                match recv {
                    Ok(frame) => {
                        let text = serde_json::to_string(&frame)?;
                        if socket.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Resync with a full snapshot.
                        tracing::warn!(skipped, "host page lagged, resending snapshot");
                        let text = serde_json::to_string(&session.snapshot())?;
                        if socket.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(WsMessage::Text(txt))) => {
                        match serde_json::from_str::<ClientFrame>(&txt) {
                            Ok(frame) => session.handle(frame),
                            Err(e) => tracing::debug!(error = %e, "ignoring malformed frame"),
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "websocket receive failed");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

/// Mirror `path` into the store: its contents now, and every change after.
fn watch_source(path: &Path, store: Arc<SandboxStore>) -> Result<RecommendedWatcher> {
    let path = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {:?}", path))?;
    let initial =
        std::fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
    store.set_source(&initial, EditOrigin::External);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = tx.send(res);
        },
        notify::Config::default(),
    )
    .context("Failed to initialize file watcher")?;

    // Watch the directory: editors often replace the file instead of writing it.
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {:?}", dir))?;

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                Ok(event) => {
                    if !event.paths.iter().any(|p| p == &path) {
                        continue;
                    }
                    match tokio::fs::read_to_string(&path).await {
                        Ok(text) => {
                            tracing::debug!(path = %path.display(), "source file changed");
                            store.set_source(&text, EditOrigin::External);
                        }
                        Err(e) => tracing::warn!("Failed to read {:?}: {}", path, e),
                    }
                }
                Err(err) => tracing::warn!("Watcher error: {}", err),
            }
        }
    });

    Ok(watcher)
}
