use std::sync::Arc;

use crate::{
    analysis::{Aggregator, EmotionAnalyzer, EmotionClassifier},
    config::Config,
    db::Database,
    sessions::SessionRegistry,
    uploads::CaptureStore,
};

/// Everything a request handler needs, cheap to clone into each request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionRegistry,
    pub aggregator: Aggregator,
}

impl AppState {
    pub fn new(config: Config, db: Database, classifier: Arc<dyn EmotionClassifier>) -> Self {
        let sessions = SessionRegistry::new(db.clone(), CaptureStore::new(&config.uploads_dir));
        let analyzer = EmotionAnalyzer::new(classifier, config.retry_policy());
        let aggregator = Aggregator::new(db, sessions.clone(), analyzer, config.batch_size);

        Self {
            config: Arc::new(config),
            sessions,
            aggregator,
        }
    }
}
