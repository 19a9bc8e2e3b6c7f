// src/handlers/comments.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{FromRow, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        comment::{CommentResponse, CreateCommentRequest, UpdateCommentRequest},
        user::Actor,
    },
    policy::{self, Action, Owner, ResourceKind},
};

/// Ownership evidence loaded for object-level checks.
#[derive(Debug, FromRow)]
struct CommentMeta {
    id: i64,
    author_id: i64,
}

const COMMENT_SELECT: &str = "SELECT c.id, c.text, u.username AS author, c.pub_date \
     FROM comments c JOIN users u ON u.id = c.author_id";

/// Lists a review's comments, newest first.
pub async fn list_comments(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::List, ResourceKind::Comment)?;
    let review_id = resolve_review(&pool, title_id, review_id).await?;

    let comments = sqlx::query_as::<_, CommentResponse>(&format!(
        "{COMMENT_SELECT} WHERE c.review_id = ? ORDER BY c.pub_date DESC, c.id DESC"
    ))
    .bind(review_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(comments))
}

/// Creates a comment on a review. Any authenticated user.
pub async fn create_comment(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Create, ResourceKind::Comment)?;
    let user = policy::require_user(&actor)?;

    payload.validate()?;
    let review_id = resolve_review(&pool, title_id, review_id).await?;

    let comment_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO comments (text, review_id, author_id, pub_date) \
         VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(&payload.text)
    .bind(review_id)
    .bind(user.id)
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await?;

    let comment = fetch_comment(&pool, review_id, comment_id).await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Retrieves a single comment, scoped to its review and title.
pub async fn get_comment(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Retrieve, ResourceKind::Comment)?;
    let review_id = resolve_review(&pool, title_id, review_id).await?;

    let comment = fetch_comment(&pool, review_id, comment_id).await?;

    Ok(Json(comment))
}

/// Partially updates a comment. Author, moderator or admin.
pub async fn update_comment(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Update, ResourceKind::Comment)?;
    let review_id = resolve_review(&pool, title_id, review_id).await?;

    let meta = fetch_meta(&pool, review_id, comment_id).await?;
    policy::check_object(
        &actor,
        Action::Update,
        ResourceKind::Comment,
        Owner::Author(meta.author_id),
    )?;

    payload.validate()?;

    if let Some(text) = &payload.text {
        sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
            .bind(text)
            .bind(meta.id)
            .execute(&pool)
            .await?;
    }

    let comment = fetch_comment(&pool, review_id, comment_id).await?;

    Ok(Json(comment))
}

/// Deletes a comment. Author, moderator or admin.
pub async fn delete_comment(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Delete, ResourceKind::Comment)?;
    let review_id = resolve_review(&pool, title_id, review_id).await?;

    let meta = fetch_meta(&pool, review_id, comment_id).await?;
    policy::check_object(
        &actor,
        Action::Delete,
        ResourceKind::Comment,
        Owner::Author(meta.author_id),
    )?;

    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(meta.id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Resolves the parent review scoped to both its own id and the declared
/// title id: a review that exists under a different title is a 404, never
/// a silent match.
async fn resolve_review(pool: &SqlitePool, title_id: i64, review_id: i64) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM reviews WHERE id = ? AND title_id = ?")
        .bind(review_id)
        .bind(title_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found.".to_string()))
}

async fn fetch_meta(
    pool: &SqlitePool,
    review_id: i64,
    comment_id: i64,
) -> Result<CommentMeta, AppError> {
    sqlx::query_as::<_, CommentMeta>(
        "SELECT id, author_id FROM comments WHERE id = ? AND review_id = ?",
    )
    .bind(comment_id)
    .bind(review_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Comment not found.".to_string()))
}

async fn fetch_comment(
    pool: &SqlitePool,
    review_id: i64,
    comment_id: i64,
) -> Result<CommentResponse, AppError> {
    sqlx::query_as::<_, CommentResponse>(&format!(
        "{COMMENT_SELECT} WHERE c.id = ? AND c.review_id = ?"
    ))
    .bind(comment_id)
    .bind(review_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Comment not found.".to_string()))
}
