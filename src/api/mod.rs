//! HTTP surface: status, settings, folders, likes, the feed, and the media
//! files themselves.

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::api::error::ApiResult;
use crate::database::repo::open_database;
use crate::ingest::orchestrator::spawn_scan;
use crate::ingest::state::ScanScheduler;
use crate::utils::config::{load_settings, Settings};

#[derive(Debug, Clone)]
pub struct AppState {
    pub scheduler: ScanScheduler,
    pub settings: Arc<RwLock<Settings>>,
    pub config_path: Arc<PathBuf>,
    pub db_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(settings: Settings, config_path: PathBuf, db_path: PathBuf) -> Self {
        Self {
            scheduler: ScanScheduler::new(),
            settings: Arc::new(RwLock::new(settings)),
            config_path: Arc::new(config_path),
            db_path: Arc::new(db_path),
        }
    }

    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn replace_settings(&self, settings: Settings) {
        *self.settings.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = settings;
    }

    /// Runs `f` against a fresh connection on the blocking pool.
    pub async fn with_db<T, F>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db_path = Arc::clone(&self.db_path);
        let result = tokio::task::spawn_blocking(move || {
            let conn = open_database(&db_path)?;
            f(&conn)
        })
        .await?;
        Ok(result?)
    }
}

pub fn router(state: AppState, viewer_dir: Option<PathBuf>) -> Router {
    let mut app = Router::new()
        .route("/api/status", get(handlers::get_status))
        .route("/api/settings/path", post(handlers::set_path))
        .route("/api/folders", get(handlers::get_folders))
        .route("/api/like/{family}/{id}", post(handlers::toggle_like))
        .route("/api/stream", get(handlers::get_stream))
        .route("/files/{*path}", get(handlers::serve_file));

    if let Some(dir) = viewer_dir {
        app = app.nest_service("/viewer", ServeDir::new(dir).append_index_html_on_directories(true));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn serve(bind: SocketAddr, config_path: PathBuf, db_path: PathBuf, viewer_dir: Option<PathBuf>) -> Result<()> {
    let settings = load_settings(&config_path);
    open_database(&db_path).context("Failed to bootstrap database")?;

    let state = AppState::new(settings, config_path, db_path);
    if let Some(root) = state.settings().root() {
        spawn_scan(&state.scheduler, root, state.db_path.to_path_buf());
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(bind)
            .await
            .with_context(|| format!("Failed to bind {}", bind))?;
        info!("Listening on http://{}", bind);
        axum::serve(listener, router(state, viewer_dir))
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .context("Server error")
    })
}
