pub mod registry;
pub mod routes;

pub use registry::{SessionError, SessionRegistry};
