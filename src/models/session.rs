use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Active,
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "Active",
            SessionStatus::Ended => "Ended",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Which capture stream an uploaded image belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CaptureRole {
    Webcam,
    Screenshot,
}

impl CaptureRole {
    pub const ALL: [CaptureRole; 2] = [CaptureRole::Webcam, CaptureRole::Screenshot];

    /// Multipart field name used by the upload endpoint.
    pub fn field_name(&self) -> &'static str {
        match self {
            CaptureRole::Webcam => "webcam",
            CaptureRole::Screenshot => "screenshot",
        }
    }

    /// Directory under the uploads root holding one sub-directory per session.
    pub fn dir_name(&self) -> &'static str {
        match self {
            CaptureRole::Webcam => "webcam_images",
            CaptureRole::Screenshot => "screenshots",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        CaptureRole::ALL
            .into_iter()
            .find(|role| role.field_name() == name)
    }
}
