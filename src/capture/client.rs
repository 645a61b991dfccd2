use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::controller::CaptureSink;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionBody {
    session_id: String,
}

/// Talks to the capture server: opens and closes sessions and uploads image pairs.
#[derive(Clone)]
pub struct HttpCaptureClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCaptureClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build capture HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn start_session(&self) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/start-session", self.base_url))
            .send()
            .await
            .context("start-session request failed")?;
        let body: StartSessionBody = check_response(response)
            .await?
            .json()
            .await
            .context("start-session response was not valid JSON")?;

        Ok(body.session_id)
    }

    pub async fn end_session(&self, session_id: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/end-session/{session_id}", self.base_url))
            .send()
            .await
            .context("end-session request failed")?;
        check_response(response).await?;
        Ok(())
    }

    pub async fn upload(
        &self,
        session_id: &str,
        webcam_png: Vec<u8>,
        screenshot_png: Vec<u8>,
    ) -> Result<()> {
        let form = Form::new()
            .text("sessionId", session_id.to_string())
            .part("webcam", png_part(webcam_png, "webcam.png")?)
            .part("screenshot", png_part(screenshot_png, "screenshot.png")?);

        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .context("upload request failed")?;
        check_response(response).await?;
        Ok(())
    }
}

#[async_trait]
impl CaptureSink for HttpCaptureClient {
    async fn submit(
        &self,
        session_id: &str,
        webcam_png: Vec<u8>,
        screenshot_png: Vec<u8>,
    ) -> Result<()> {
        self.upload(session_id, webcam_png, screenshot_png).await
    }
}

fn png_part(bytes: Vec<u8>, file_name: &'static str) -> Result<Part> {
    Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("image/png")
        .context("invalid image mime type")
}

async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        bail!("server returned {status}: {message}");
    }
    Ok(response)
}
