// src/models/review.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Review as exposed by the API: the author appears as a username.
#[derive(Debug, FromRow, Serialize)]
pub struct ReviewResponse {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub score: i64,
    pub pub_date: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a review.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub text: String,
    #[validate(range(min = 1, max = 10, message = "Score must be between 1 and 10."))]
    pub score: i64,
}

/// DTO for a partial review update.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub text: Option<String>,
    #[validate(range(min = 1, max = 10, message = "Score must be between 1 and 10."))]
    pub score: Option<i64>,
}
