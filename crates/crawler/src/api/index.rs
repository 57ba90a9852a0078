//! Read-only lookups into the crawl state and the torrent index.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use torrenti_core::indexer::{TorrentFileRecord, TorrentRecord};
use torrenti_core::VisitRecord;

use super::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VisitQuery {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct TorrentResponse {
    #[serde(flatten)]
    pub torrent: TorrentRecord,
    pub files: Vec<TorrentFileRecord>,
}

fn error(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { error: msg.into() }))
}

/// GET /api/v1/visits?url=...
pub async fn get_visit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VisitQuery>,
) -> Result<Json<VisitRecord>, impl IntoResponse> {
    match state.session().visits().get(&query.url) {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(error(
            StatusCode::NOT_FOUND,
            format!("No visit record for {}", query.url),
        )),
        Err(e) => Err(error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// GET /api/v1/torrents/{hash}
pub async fn get_torrent(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Json<TorrentResponse>, impl IntoResponse> {
    let indexer = state.session().indexer();
    let hash = hash.to_ascii_lowercase();

    let torrent = match indexer.get_torrent(&hash) {
        Ok(Some(t)) => t,
        Ok(None) => {
            return Err(error(
                StatusCode::NOT_FOUND,
                format!("Torrent {} not found", hash),
            ))
        }
        Err(e) => return Err(error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    };

    match indexer.list_torrent_files(&hash) {
        Ok(files) => Ok(Json(TorrentResponse { torrent, files })),
        Err(e) => Err(error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
