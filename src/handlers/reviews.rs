// src/handlers/reviews.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{FromRow, SqlitePool};
use validator::Validate;

use crate::{
    error::{AppError, db_unique_violation},
    models::{
        review::{CreateReviewRequest, ReviewResponse, UpdateReviewRequest},
        user::Actor,
    },
    policy::{self, Action, Owner, ResourceKind},
};

/// Ownership evidence loaded for object-level checks.
#[derive(Debug, FromRow)]
struct ReviewMeta {
    id: i64,
    author_id: i64,
}

const REVIEW_SELECT: &str = "SELECT r.id, r.text, u.username AS author, r.score, r.pub_date \
     FROM reviews r JOIN users u ON u.id = r.author_id";

/// Lists a title's reviews, newest first.
pub async fn list_reviews(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path(title_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::List, ResourceKind::Review)?;
    ensure_title(&pool, title_id).await?;

    let reviews = sqlx::query_as::<_, ReviewResponse>(&format!(
        "{REVIEW_SELECT} WHERE r.title_id = ? ORDER BY r.pub_date DESC, r.id DESC"
    ))
    .bind(title_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(reviews))
}

/// Creates a review on a title. One review per (title, author): a
/// fast-path existence check rejects duplicates before the insert, and the
/// store's unique constraint decides the race when two creations run
/// concurrently. Both paths produce the same 400 body.
pub async fn create_review(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path(title_id): Path<i64>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Create, ResourceKind::Review)?;
    let user = policy::require_user(&actor)?;

    payload.validate()?;
    ensure_title(&pool, title_id).await?;

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM reviews WHERE title_id = ? AND author_id = ?",
    )
    .bind(title_id)
    .bind(user.id)
    .fetch_optional(&pool)
    .await?;

    if existing.is_some() {
        return Err(duplicate_review());
    }

    let review_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO reviews (text, score, title_id, author_id, pub_date) \
         VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&payload.text)
    .bind(payload.score)
    .bind(title_id)
    .bind(user.id)
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| match db_unique_violation(&e) {
        Some(_) => duplicate_review(),
        None => AppError::from(e),
    })?;

    let review = fetch_review(&pool, title_id, review_id).await?;

    Ok((StatusCode::CREATED, Json(review)))
}

/// Retrieves a single review, scoped to its title.
pub async fn get_review(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Retrieve, ResourceKind::Review)?;

    let review = fetch_review(&pool, title_id, review_id).await?;

    Ok(Json(review))
}

/// Partially updates a review. Author, moderator or admin.
pub async fn update_review(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Update, ResourceKind::Review)?;

    let meta = fetch_meta(&pool, title_id, review_id).await?;
    policy::check_object(
        &actor,
        Action::Update,
        ResourceKind::Review,
        Owner::Author(meta.author_id),
    )?;

    payload.validate()?;

    if let Some(text) = &payload.text {
        sqlx::query("UPDATE reviews SET text = ? WHERE id = ?")
            .bind(text)
            .bind(meta.id)
            .execute(&pool)
            .await?;
    }

    if let Some(score) = payload.score {
        sqlx::query("UPDATE reviews SET score = ? WHERE id = ?")
            .bind(score)
            .bind(meta.id)
            .execute(&pool)
            .await?;
    }

    let review = fetch_review(&pool, title_id, review_id).await?;

    Ok(Json(review))
}

/// Deletes a review. Author, moderator or admin. Comments under it are
/// cascade-deleted by the store.
pub async fn delete_review(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Delete, ResourceKind::Review)?;

    let meta = fetch_meta(&pool, title_id, review_id).await?;
    policy::check_object(
        &actor,
        Action::Delete,
        ResourceKind::Review,
        Owner::Author(meta.author_id),
    )?;

    sqlx::query("DELETE FROM reviews WHERE id = ?")
        .bind(meta.id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

fn duplicate_review() -> AppError {
    AppError::validation("non_field_errors", "You have already reviewed this title.")
}

async fn ensure_title(pool: &SqlitePool, title_id: i64) -> Result<(), AppError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM titles WHERE id = ?")
        .bind(title_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Title not found.".to_string()))?;
    Ok(())
}

async fn fetch_meta(pool: &SqlitePool, title_id: i64, review_id: i64) -> Result<ReviewMeta, AppError> {
    sqlx::query_as::<_, ReviewMeta>(
        "SELECT id, author_id FROM reviews WHERE id = ? AND title_id = ?",
    )
    .bind(review_id)
    .bind(title_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Review not found.".to_string()))
}

async fn fetch_review(
    pool: &SqlitePool,
    title_id: i64,
    review_id: i64,
) -> Result<ReviewResponse, AppError> {
    sqlx::query_as::<_, ReviewResponse>(&format!(
        "{REVIEW_SELECT} WHERE r.id = ? AND r.title_id = ?"
    ))
    .bind(review_id)
    .bind(title_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Review not found.".to_string()))
}
