use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use torrenti_core::{IndexTorrentStat, StatSnapshot, SubtitleStat};

use super::ErrorResponse;
use crate::metrics::encode_metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub seed: String,
    pub stopped: bool,
    pub queue_size: usize,
    pub session: StatSnapshot,
    pub index: IndexTorrentStat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<SubtitleStat>,
}

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

/// GET /api/v1/stats
///
/// Session counters, pending frontier size and indexed totals.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let session = state.session();

    let queue_size = session.frontier().queue_size().map_err(internal_error)?;
    let index = session.indexer().stat().map_err(internal_error)?;
    let subtitles = match state.subtitles() {
        Some(s) => Some(s.stat().map_err(internal_error)?),
        None => None,
    };

    Ok(Json(StatsResponse {
        seed: session.config().seed.clone(),
        stopped: session.is_stopped(),
        queue_size,
        session: session.stat().snapshot(),
        index,
        subtitles,
    }))
}

/// GET /metrics
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
