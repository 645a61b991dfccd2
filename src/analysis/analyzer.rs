use std::{path::Path, sync::Arc};

use crate::models::{Emotion, EmotionVector};

use super::{
    classifier::{ClassifierError, EmotionClassifier},
    retry::RetryPolicy,
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_warn};

/// Result of analysing one image. Never an error: failures degrade to the neutral
/// fallback so one bad capture cannot sink a whole session.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    Classified(EmotionVector),
    Fallback { reason: String },
}

impl ImageOutcome {
    pub fn emotions(&self) -> EmotionVector {
        match self {
            ImageOutcome::Classified(vector) => *vector,
            ImageOutcome::Fallback { .. } => EmotionVector::neutral_fallback(),
        }
    }

    pub fn dominant(&self) -> Emotion {
        self.emotions().dominant()
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ImageOutcome::Fallback { .. })
    }
}

#[derive(Clone)]
pub struct EmotionAnalyzer {
    classifier: Arc<dyn EmotionClassifier>,
    retry: RetryPolicy,
}

impl EmotionAnalyzer {
    pub fn new(classifier: Arc<dyn EmotionClassifier>, retry: RetryPolicy) -> Self {
        Self { classifier, retry }
    }

    pub async fn analyze(&self, image_path: &Path) -> ImageOutcome {
        let name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| image_path.display().to_string());

        let bytes = match tokio::fs::read(image_path).await {
            Ok(bytes) if bytes.is_empty() => {
                log_warn!("image {name} is empty, using neutral fallback");
                return ImageOutcome::Fallback {
                    reason: "image file is empty".into(),
                };
            }
            Ok(bytes) => bytes,
            Err(err) => {
                log_warn!("image {name} is unreadable ({err}), using neutral fallback");
                return ImageOutcome::Fallback {
                    reason: format!("image file is unreadable: {err}"),
                };
            }
        };

        let mut retry = 0;
        loop {
            match self.classify_once(&bytes).await {
                Ok(vector) => return ImageOutcome::Classified(vector),
                Err(err) if retry < self.retry.max_retries => {
                    let delay = self.retry.delay_for(retry);
                    if err.is_loading() {
                        log_warn!(
                            "classifier model loading for {name}, retry {}/{} in {:?}",
                            retry + 1,
                            self.retry.max_retries,
                            delay
                        );
                    } else {
                        log_warn!(
                            "classifier failed for {name}: {err}; retry {}/{} in {:?}",
                            retry + 1,
                            self.retry.max_retries,
                            delay
                        );
                    }
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(err) => {
                    log_error!(
                        "Error analyzing image {name} after {} attempts: {err}",
                        self.retry.total_attempts()
                    );
                    return ImageOutcome::Fallback {
                        reason: err.to_string(),
                    };
                }
            }
        }
    }

    async fn classify_once(&self, bytes: &[u8]) -> Result<EmotionVector, ClassifierError> {
        let scores = self.classifier.classify(bytes).await?;
        EmotionVector::from_scores(&scores).map_err(|err| ClassifierError::Malformed(err.to_string()))
    }
}
