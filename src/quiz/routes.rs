use axum::{extract::Query, Json};
use serde::{Deserialize, Serialize};

use super::generator::{generate_round, Question};

pub const DEFAULT_ROUND_SIZE: usize = 5;
pub const MAX_ROUND_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
pub struct QuizParams {
    pub count: Option<usize>,
}

#[derive(Serialize)]
pub struct QuizResponse {
    pub questions: Vec<Question>,
}

pub async fn quiz_handler(Query(params): Query<QuizParams>) -> Json<QuizResponse> {
    let count = params
        .count
        .unwrap_or(DEFAULT_ROUND_SIZE)
        .clamp(1, MAX_ROUND_SIZE);

    let questions = generate_round(&mut rand::thread_rng(), count);
    Json(QuizResponse { questions })
}
