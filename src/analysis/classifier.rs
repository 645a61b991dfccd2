//! Client for the hosted facial-expression classifier.
//!
//! The service takes raw image bytes and answers with a list of `{label, score}`
//! pairs, or with `{"error": "..."}` while the model is unavailable.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use thiserror::Error;

use crate::models::LabelScore;

/// Substrings of the error messages the service sends while it warms a model up.
pub const LOADING_SIGNALS: [&str; 2] = ["Model is loading", "is currently loading"];

fn is_loading_message(error: &str) -> bool {
    LOADING_SIGNALS.iter().any(|signal| error.contains(signal))
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The model is still being loaded; retrying later usually succeeds.
    #[error("model is loading")]
    Loading {
        /// Seconds until the model is expected to be ready, when the service says.
        estimated_time: Option<f64>,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

impl ClassifierError {
    pub fn is_loading(&self) -> bool {
        matches!(self, ClassifierError::Loading { .. })
    }
}

#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    async fn classify(&self, image: &[u8]) -> Result<Vec<LabelScore>, ClassifierError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Scores(Vec<LabelScore>),
    Failure {
        error: String,
        #[serde(default)]
        estimated_time: Option<f64>,
    },
}

pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build classifier HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }
}

#[async_trait]
impl EmotionClassifier for HttpClassifier {
    async fn classify(&self, image: &[u8]) -> Result<Vec<LabelScore>, ClassifierError> {
        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec());

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        interpret_response(status.as_u16(), &body)
    }
}

fn interpret_response(status: u16, body: &str) -> Result<Vec<LabelScore>, ClassifierError> {
    let success = (200..300).contains(&status);

    match serde_json::from_str::<InferenceResponse>(body) {
        Ok(InferenceResponse::Failure {
            error,
            estimated_time,
        }) if is_loading_message(&error) => Err(ClassifierError::Loading { estimated_time }),
        Ok(InferenceResponse::Failure { error, .. }) => Err(ClassifierError::Api {
            status,
            message: error,
        }),
        _ if !success => Err(ClassifierError::Api {
            status,
            message: body.to_string(),
        }),
        Ok(InferenceResponse::Scores(scores)) => Ok(scores),
        Err(err) => Err(ClassifierError::Malformed(err.to_string())),
    }
}
