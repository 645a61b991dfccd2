pub mod analysis;
pub mod emotion;
pub mod session;

pub use analysis::{ImageAnalysis, OverallAnalysis, SessionAnalysis};
pub use emotion::{Emotion, EmotionVector, LabelScore};
pub use session::{CaptureRole, Session, SessionStatus};
