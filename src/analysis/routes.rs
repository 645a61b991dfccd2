use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::AppError,
    models::{ImageAnalysis, OverallAnalysis, SessionAnalysis},
    state::AppState,
};

#[derive(Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<String>,
}

/// Body of `GET /analyze/{sessionId}`, shaped the way the admin dashboard reads it.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub session_id: String,
    pub image_analyses: Vec<ImageAnalysis>,
    pub overall_analysis: OverallAnalysis,
    pub created_at: DateTime<Utc>,
}

impl From<SessionAnalysis> for AnalyzeResponse {
    fn from(analysis: SessionAnalysis) -> Self {
        Self {
            session_id: analysis.session_id,
            image_analyses: analysis.image_analysis,
            overall_analysis: analysis.overall_analysis,
            created_at: analysis.created_at,
        }
    }
}

pub async fn sessions_handler(
    State(state): State<AppState>,
) -> Result<Json<SessionsResponse>, AppError> {
    let sessions = state.aggregator.list_sessions().await?;
    Ok(Json(SessionsResponse { sessions }))
}

pub async fn analyze_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let analysis = state.aggregator.aggregate(&session_id).await?;
    Ok(Json(analysis.into()))
}
