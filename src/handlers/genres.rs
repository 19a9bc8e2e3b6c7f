// src/handlers/genres.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::{AppError, db_unique_violation},
    models::{
        genre::{CreateGenreRequest, Genre},
        user::Actor,
    },
    policy::{self, Action, ResourceKind},
};

/// Query parameters for listing genres.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
}

/// Lists all genres ordered by slug, optionally filtered by a
/// case-insensitive substring of the name.
pub async fn list_genres(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::List, ResourceKind::Genre)?;

    let pattern = params.search.map(|s| format!("%{}%", s));

    let genres = sqlx::query_as::<_, Genre>(
        "SELECT id, name, slug FROM genres \
         WHERE (?1 IS NULL OR name LIKE ?1) ORDER BY slug",
    )
    .bind(pattern)
    .fetch_all(&pool)
    .await?;

    Ok(Json(genres))
}

/// Creates a new genre. Admin only.
pub async fn create_genre(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Json(payload): Json<CreateGenreRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Create, ResourceKind::Genre)?;
    payload.validate()?;

    let genre = sqlx::query_as::<_, Genre>(
        "INSERT INTO genres (name, slug) VALUES (?, ?) RETURNING id, name, slug",
    )
    .bind(&payload.name)
    .bind(&payload.slug)
    .fetch_one(&pool)
    .await
    .map_err(|e| match db_unique_violation(&e) {
        Some(_) => AppError::validation("slug", "A genre with this slug already exists."),
        None => AppError::from(e),
    })?;

    Ok((StatusCode::CREATED, Json(genre)))
}

/// Deletes a genre by slug. Admin only.
pub async fn delete_genre(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Delete, ResourceKind::Genre)?;

    let result = sqlx::query("DELETE FROM genres WHERE slug = ?")
        .bind(&slug)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Genre not found.".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
