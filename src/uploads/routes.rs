use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use log::{debug, info};

use crate::{
    error::AppError, models::CaptureRole, sessions::routes::MessageResponse, state::AppState,
};

pub const SESSION_HEADER: &str = "x-session-id";
pub const SESSION_FIELD: &str = "sessionId";

/// Stores one webcam frame and one screenshot for an active session.
pub async fn upload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<MessageResponse>, AppError> {
    let mut form_session_id: Option<String> = None;
    let mut images: HashMap<CaptureRole, Bytes> = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::MalformedUpload(err.body_text()))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == SESSION_FIELD {
            let text = field
                .text()
                .await
                .map_err(|err| AppError::MalformedUpload(err.body_text()))?;
            form_session_id = Some(text);
        } else if let Some(role) = CaptureRole::from_field_name(&name) {
            let bytes = field
                .bytes()
                .await
                .map_err(|err| AppError::MalformedUpload(err.body_text()))?;
            images.insert(role, bytes);
        } else {
            debug!("Ignoring unexpected upload field {name}");
        }
    }

    let header_session_id = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok());
    let session = state
        .sessions
        .require_active(form_session_id.as_deref().or(header_session_id))
        .await?;

    let mut captures = Vec::with_capacity(CaptureRole::ALL.len());
    for role in CaptureRole::ALL {
        match images.remove(&role) {
            Some(bytes) if !bytes.is_empty() => captures.push((role, bytes)),
            _ => {
                return Err(AppError::MalformedUpload(format!(
                    "missing {} image",
                    role.field_name()
                )))
            }
        }
    }

    let captured_at = Utc::now();
    for (role, bytes) in captures {
        state
            .sessions
            .store()
            .write_capture(&session.id, role, &bytes, captured_at)
            .await?;
    }

    info!("Stored captures for {}", session.id);
    Ok(Json(MessageResponse {
        message: "Images uploaded successfully!".to_string(),
    }))
}
