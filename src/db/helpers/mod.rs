use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Row;

use crate::models::{Emotion, EmotionVector, SessionStatus};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_status(value: &str) -> Result<SessionStatus> {
    match value {
        "Active" => Ok(SessionStatus::Active),
        "Ended" => Ok(SessionStatus::Ended),
        other => Err(anyhow!("unknown session status {other}")),
    }
}

pub fn parse_emotion(value: &str) -> Result<Emotion> {
    value
        .parse::<Emotion>()
        .with_context(|| "failed to parse dominant_emotion")
}

/// Reads the seven per-label columns, which every analysis table names identically.
pub fn row_to_vector(row: &Row) -> Result<EmotionVector> {
    let mut vector = EmotionVector::zero();
    for emotion in Emotion::ALL {
        let value: f64 = row.get(emotion.as_str())?;
        vector.set(emotion, value);
    }
    Ok(vector)
}
