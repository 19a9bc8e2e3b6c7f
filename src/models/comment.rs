// src/models/comment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Comment as exposed by the API: the author appears as a username.
#[derive(Debug, FromRow, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub pub_date: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub text: String,
}

/// DTO for a partial comment update.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub text: Option<String>,
}
