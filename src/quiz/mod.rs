pub mod generator;
pub mod routes;

pub use generator::{generate_round, Question, Shape};
