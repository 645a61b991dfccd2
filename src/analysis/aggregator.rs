use std::{collections::HashSet, path::PathBuf};

use futures::future::join_all;
use log::info;
use thiserror::Error;

use crate::{
    db::Database,
    models::{CaptureRole, ImageAnalysis, SessionAnalysis},
    sessions::SessionRegistry,
    uploads::is_valid_session_id,
};

use super::analyzer::EmotionAnalyzer;

pub const DEFAULT_BATCH_SIZE: usize = 3;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No captures found for session {0}")]
    SessionNotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Builds and memoizes the emotion analysis of a whole session.
#[derive(Clone)]
pub struct Aggregator {
    db: Database,
    sessions: SessionRegistry,
    analyzer: EmotionAnalyzer,
    batch_size: usize,
}

impl Aggregator {
    pub fn new(
        db: Database,
        sessions: SessionRegistry,
        analyzer: EmotionAnalyzer,
        batch_size: usize,
    ) -> Self {
        Self {
            db,
            sessions,
            analyzer,
            batch_size: batch_size.max(1),
        }
    }

    /// Returns the stored analysis for `session_id`, computing and persisting it first
    /// if none exists yet.
    pub async fn aggregate(&self, session_id: &str) -> Result<SessionAnalysis, AnalysisError> {
        if !is_valid_session_id(session_id) {
            return Err(AnalysisError::SessionNotFound(session_id.to_string()));
        }

        if let Some(existing) = self.db.get_analysis(session_id).await? {
            info!("Found existing analysis for session {session_id}");
            return Ok(existing);
        }

        let images = self
            .sessions
            .store()
            .list_session_images(CaptureRole::Webcam, session_id)
            .await?
            .ok_or_else(|| AnalysisError::SessionNotFound(session_id.to_string()))?;

        // no more uploads may land while the directory is being read
        self.sessions.seal(session_id).await?;

        info!(
            "Analyzing {} images for session {session_id} in batches of {}",
            images.len(),
            self.batch_size
        );

        let image_analysis = self.analyze_in_batches(images).await;
        let fallbacks = image_analysis.iter().filter(|image| image.fallback).count();
        let analysis = SessionAnalysis::new(session_id.to_string(), image_analysis);

        if !self.db.insert_analysis_if_absent(&analysis).await? {
            info!("Analysis for session {session_id} was stored concurrently, serving that one");
        } else if fallbacks > 0 {
            info!("Stored analysis for session {session_id} ({fallbacks} images fell back to neutral)");
        }

        self.db
            .get_analysis(session_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("analysis for {session_id} vanished after insert").into())
    }

    /// Analyzed sessions newest first, then any session that only has captures on disk.
    pub async fn list_sessions(&self) -> anyhow::Result<Vec<String>> {
        let analyzed = self.db.list_analyzed_session_ids().await?;
        let on_disk = self.sessions.store().list_session_ids().await?;

        let mut seen = HashSet::new();
        Ok(analyzed
            .into_iter()
            .chain(on_disk)
            .filter(|id| seen.insert(id.clone()))
            .collect())
    }

    /// Analyzes each batch concurrently and the batches one after another, keeping the
    /// input order.
    async fn analyze_in_batches(&self, images: Vec<PathBuf>) -> Vec<ImageAnalysis> {
        let mut results = Vec::with_capacity(images.len());

        for batch in images.chunks(self.batch_size) {
            let outcomes = join_all(batch.iter().map(|path| async move {
                let outcome = self.analyzer.analyze(path).await;
                ImageAnalysis {
                    image_path: path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    emotions: outcome.emotions(),
                    dominant_emotion: outcome.dominant(),
                    fallback: outcome.is_fallback(),
                }
            }))
            .await;

            results.extend(outcomes);
        }

        results
    }
}
