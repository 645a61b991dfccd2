pub mod routes;
pub mod store;

pub use store::{is_valid_session_id, CaptureStore};
