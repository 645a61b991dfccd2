pub mod aggregator;
pub mod analyzer;
pub mod classifier;
pub mod retry;
pub mod routes;

pub use aggregator::{AnalysisError, Aggregator, DEFAULT_BATCH_SIZE};
pub use analyzer::{EmotionAnalyzer, ImageOutcome};
pub use classifier::{ClassifierError, EmotionClassifier, HttpClassifier};
pub use retry::RetryPolicy;
