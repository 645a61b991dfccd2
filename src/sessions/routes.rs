use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::{error::AppError, state::AppState};

use super::SessionError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn start_session_handler(
    State(state): State<AppState>,
) -> Result<Json<StartSessionResponse>, AppError> {
    let session = state.sessions.start_session().await?;
    Ok(Json(StartSessionResponse {
        session_id: session.id,
    }))
}

pub async fn end_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    match state.sessions.end_session(&session_id).await {
        Ok(session) => Ok(Json(MessageResponse {
            message: format!("Session {} ended.", session.id),
        })),
        Err(err @ SessionError::NotFound(_)) => Err(AppError::SessionNotFound(err.to_string())),
        Err(err) => Err(err.into()),
    }
}
