// src/handlers/categories.rs

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
        category::{Category, CreateCategoryRequest},
        user::Actor,
    },
    policy::{self, Action, ResourceKind},
};

/// Query parameters for listing categories.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
}

/// Lists all categories ordered by slug, optionally filtered by a
/// case-insensitive substring of the name.
pub async fn list_categories(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::List, ResourceKind::Category)?;

    let pattern = params.search.map(|s| format!("%{}%", s));

    let categories = sqlx::query_as::<_, Category>(
        "SELECT id, name, slug FROM categories \
         WHERE (?1 IS NULL OR name LIKE ?1) ORDER BY slug",
    )
    .bind(pattern)
    .fetch_all(&pool)
    .await?;

    Ok(Json(categories))
}

/// Creates a new category. Admin only.
pub async fn create_category(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Create, ResourceKind::Category)?;
    payload.validate()?;

    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name, slug) VALUES (?, ?) RETURNING id, name, slug",
    )
    .bind(&payload.name)
    .bind(&payload.slug)
    .fetch_one(&pool)
    .await
    .map_err(|e| match db_unique_violation(&e) {
        Some(_) => AppError::validation("slug", "A category with this slug already exists."),
        None => AppError::from(e),
    })?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// Deletes a category by slug. Admin only. Titles in the category keep
/// existing with their category unset.
pub async fn delete_category(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Delete, ResourceKind::Category)?;

    let result = sqlx::query("DELETE FROM categories WHERE slug = ?")
        .bind(&slug)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Category not found.".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
