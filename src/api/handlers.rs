use axum::{
    body::Body,
    extract::{Path, Query, Request, State},
    http::Uri,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::AppState;
use crate::database::records::Family;
use crate::database::repo;
use crate::ingest::orchestrator::spawn_scan;
use crate::stream::hydrate::{FeedItem, UrlMapper, FILES_PREFIX};
use crate::stream::query::{SourceFilter, StreamQuery};
use crate::stream;
use crate::utils::config::{save_settings, validate_root, Settings};

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub is_scanning: bool,
    pub message: String,
    pub target_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct PathRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    pub liked: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FoldersQuery {
    pub source: SourceFilter,
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.scheduler.status();
    Json(StatusResponse {
        is_scanning: status.is_scanning,
        message: status.message,
        target_dir: state.settings().target_dir,
    })
}

/// Re-points the ingestion root and kicks off a scan of it.
pub async fn set_path(State(state): State<AppState>, Json(req): Json<PathRequest>) -> ApiResult<Json<Value>> {
    let root = validate_root(&req.path).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let settings = Settings { target_dir: req.path.clone() };
    save_settings(&state.config_path, &settings)?;
    state.replace_settings(settings);
    info!("Ingestion root set to {:?}", root);

    spawn_scan(&state.scheduler, root, state.db_path.to_path_buf());
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn get_folders(
    State(state): State<AppState>,
    Query(params): Query<FoldersQuery>,
) -> ApiResult<Json<Vec<String>>> {
    let families = params.source.families();
    let folders = state.with_db(move |conn| repo::list_folders(conn, families)).await?;
    Ok(Json(folders))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path((family, id)): Path<(String, String)>,
    Json(req): Json<LikeRequest>,
) -> ApiResult<Json<Value>> {
    let family = Family::parse(&family)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown record type: {}", family)))?;

    let lookup = id.clone();
    let updated = state
        .with_db(move |conn| repo::set_liked(conn, family, &lookup, req.liked))
        .await?;
    if !updated {
        return Err(ApiError::not_found(format!("No {} with id {}", family, id)));
    }
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn get_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> ApiResult<Json<Vec<FeedItem>>> {
    let urls = UrlMapper::new(state.settings().target_dir);
    let items = state
        .with_db(move |conn| stream::get_stream(conn, &urls, &query))
        .await?;
    Ok(Json(items))
}

/// Serves a file from whatever root is configured at request time.
pub async fn serve_file(State(state): State<AppState>, req: Request) -> Response {
    let Some(root) = state.settings().root() else {
        return ApiError::not_found("No media root configured").into_response();
    };

    let (mut parts, body) = req.into_parts();
    let relative = parts
        .uri
        .path()
        .strip_prefix(FILES_PREFIX.trim_end_matches('/'))
        .unwrap_or("/")
        .to_string();
    parts.uri = match relative.parse::<Uri>() {
        Ok(uri) => uri,
        Err(_) => return ApiError::bad_request("Invalid file path").into_response(),
    };

    match ServeDir::new(root).oneshot(Request::from_parts(parts, body)).await {
        Ok(res) => res.map(Body::new).into_response(),
        Err(never) => match never {},
    }
}
