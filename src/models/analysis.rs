//! Per-image and per-session analysis records.
//!
//! Field names follow the JSON shape the admin dashboard consumes
//! (`imageAnalysis`, `overallAnalysis.emotions`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::emotion::{Emotion, EmotionVector};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    /// File name inside the session's webcam directory.
    pub image_path: String,
    pub emotions: EmotionVector,
    pub dominant_emotion: Emotion,
    /// The neutral fallback was substituted because classification failed.
    #[serde(default)]
    pub fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverallAnalysis {
    pub emotions: EmotionVector,
    pub dominant_emotion: Emotion,
}

impl OverallAnalysis {
    pub fn from_images(images: &[ImageAnalysis]) -> Self {
        let emotions = EmotionVector::mean(images.iter().map(|image| &image.emotions));
        Self {
            dominant_emotion: emotions.dominant(),
            emotions,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionAnalysis {
    pub session_id: String,
    pub image_analysis: Vec<ImageAnalysis>,
    pub overall_analysis: OverallAnalysis,
    pub created_at: DateTime<Utc>,
}

impl SessionAnalysis {
    pub fn new(session_id: String, image_analysis: Vec<ImageAnalysis>) -> Self {
        let overall_analysis = OverallAnalysis::from_images(&image_analysis);
        Self {
            session_id,
            image_analysis,
            overall_analysis,
            created_at: Utc::now(),
        }
    }
}
