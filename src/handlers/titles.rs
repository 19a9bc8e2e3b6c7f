// src/handlers/titles.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        category::Category,
        genre::Genre,
        title::{CreateTitleRequest, TitleResponse, TitleRow, TitleWriteResponse, UpdateTitleRequest},
        user::Actor,
    },
    policy::{self, Action, ResourceKind},
};

/// Query parameters for listing titles. All filters are exact matches;
/// category and genre filter by slug.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub name: Option<String>,
    pub year: Option<i64>,
    pub category: Option<String>,
    pub genre: Option<String>,
}

/// One query computes the aggregate rating alongside the row, so every
/// read sees the current review set. AVG over zero reviews is NULL.
const TITLE_SELECT: &str = "SELECT t.id, t.name, t.year, t.description, t.category_id, \
     AVG(r.score) AS rating \
     FROM titles t LEFT JOIN reviews r ON r.title_id = t.id";

/// Lists titles with their aggregate ratings, ordered by name then id.
pub async fn list_titles(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::List, ResourceKind::Title)?;

    let rows = sqlx::query_as::<_, TitleRow>(&format!(
        "{TITLE_SELECT} \
         WHERE (?1 IS NULL OR t.name = ?1) \
           AND (?2 IS NULL OR t.year = ?2) \
           AND (?3 IS NULL OR t.category_id IN \
                (SELECT c.id FROM categories c WHERE c.slug = ?3)) \
           AND (?4 IS NULL OR t.id IN \
                (SELECT gt.title_id FROM genre_title gt \
                 JOIN genres g ON g.id = gt.genre_id WHERE g.slug = ?4)) \
         GROUP BY t.id \
         ORDER BY t.name, t.id"
    ))
    .bind(params.name)
    .bind(params.year)
    .bind(params.category)
    .bind(params.genre)
    .fetch_all(&pool)
    .await?;

    Ok(Json(read_responses(&pool, rows).await?))
}

/// Retrieves a single title with its aggregate rating.
pub async fn get_title(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path(title_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Retrieve, ResourceKind::Title)?;

    let row = sqlx::query_as::<_, TitleRow>(&format!(
        "{TITLE_SELECT} WHERE t.id = ? GROUP BY t.id"
    ))
    .bind(title_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Title not found.".to_string()))?;

    Ok(Json(read_response(&pool, row).await?))
}

/// Creates a title. Admin only. The title and its genre links are written
/// in one transaction.
pub async fn create_title(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Json(payload): Json<CreateTitleRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Create, ResourceKind::Title)?;
    payload.validate()?;

    let category_id = resolve_category(&pool, &payload.category).await?;
    let (genre_ids, genre_slugs) = resolve_genres(&pool, &payload.genre).await?;

    let mut tx = pool.begin().await?;

    let title_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO titles (name, year, description, category_id) \
         VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(&payload.name)
    .bind(payload.year)
    .bind(&payload.description)
    .bind(category_id)
    .fetch_one(&mut *tx)
    .await?;

    for genre_id in &genre_ids {
        sqlx::query("INSERT INTO genre_title (title_id, genre_id) VALUES (?, ?)")
            .bind(title_id)
            .bind(genre_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(TitleWriteResponse {
            id: title_id,
            name: payload.name,
            year: payload.year,
            description: payload.description,
            category: Some(payload.category),
            genre: genre_slugs,
        }),
    ))
}

/// Partially updates a title. Admin only. A genre list in the payload
/// replaces the existing associations as a set.
pub async fn update_title(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path(title_id): Path<i64>,
    Json(payload): Json<UpdateTitleRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Update, ResourceKind::Title)?;

    sqlx::query_scalar::<_, i64>("SELECT id FROM titles WHERE id = ?")
        .bind(title_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Title not found.".to_string()))?;

    payload.validate()?;

    let category_id = match &payload.category {
        Some(slug) => Some(resolve_category(&pool, slug).await?),
        None => None,
    };
    let genre_ids = match &payload.genre {
        Some(slugs) => Some(resolve_genres(&pool, slugs).await?.0),
        None => None,
    };

    let mut tx = pool.begin().await?;

    if let Some(name) = &payload.name {
        sqlx::query("UPDATE titles SET name = ? WHERE id = ?")
            .bind(name)
            .bind(title_id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(year) = payload.year {
        sqlx::query("UPDATE titles SET year = ? WHERE id = ?")
            .bind(year)
            .bind(title_id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(description) = &payload.description {
        sqlx::query("UPDATE titles SET description = ? WHERE id = ?")
            .bind(description)
            .bind(title_id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(category_id) = category_id {
        sqlx::query("UPDATE titles SET category_id = ? WHERE id = ?")
            .bind(category_id)
            .bind(title_id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(genre_ids) = genre_ids {
        sqlx::query("DELETE FROM genre_title WHERE title_id = ?")
            .bind(title_id)
            .execute(&mut *tx)
            .await?;
        for genre_id in genre_ids {
            sqlx::query("INSERT INTO genre_title (title_id, genre_id) VALUES (?, ?)")
                .bind(title_id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;

    Ok(Json(write_response(&pool, title_id).await?))
}

/// Deletes a title by ID. Admin only. Reviews and comments under it are
/// cascade-deleted by the store.
pub async fn delete_title(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path(title_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Delete, ResourceKind::Title)?;

    let result = sqlx::query("DELETE FROM titles WHERE id = ?")
        .bind(title_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Title not found.".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Resolves a category slug from the request body. A miss is a validation
/// error on the payload, not a 404.
async fn resolve_category(pool: &SqlitePool, slug: &str) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM categories WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            AppError::validation("category", format!("Category '{}' does not exist.", slug))
        })
}

/// Resolves genre slugs, deduplicated and in request order. The store's
/// UNIQUE(title_id, genre_id) remains the final arbiter on the links.
async fn resolve_genres(
    pool: &SqlitePool,
    slugs: &[String],
) -> Result<(Vec<i64>, Vec<String>), AppError> {
    let mut genre_ids = Vec::new();
    let mut genre_slugs: Vec<String> = Vec::new();

    for slug in slugs {
        if genre_slugs.contains(slug) {
            continue;
        }
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM genres WHERE slug = ?")
            .bind(slug)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| {
                AppError::validation("genre", format!("Genre '{}' does not exist.", slug))
            })?;
        genre_ids.push(id);
        genre_slugs.push(slug.clone());
    }

    Ok((genre_ids, genre_slugs))
}

/// Assembles the read shape for a single row.
async fn read_response(pool: &SqlitePool, row: TitleRow) -> Result<TitleResponse, AppError> {
    read_responses(pool, vec![row])
        .await?
        .pop()
        .ok_or_else(|| AppError::InternalServerError("Lost title row during assembly".to_string()))
}

#[derive(FromRow)]
struct GenreLink {
    title_id: i64,
    id: i64,
    name: String,
    slug: String,
}

/// Assembles the read shape for a batch of rows: nested category/genre
/// objects plus rating. Categories and genres are each loaded with a
/// single query over the listed titles, not per row.
async fn read_responses(
    pool: &SqlitePool,
    rows: Vec<TitleRow>,
) -> Result<Vec<TitleResponse>, AppError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let category_ids: Vec<i64> = rows.iter().filter_map(|row| row.category_id).collect();
    let mut categories: HashMap<i64, Category> = HashMap::new();
    if !category_ids.is_empty() {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name, slug FROM categories WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in &category_ids {
            separated.push_bind(*id);
        }
        builder.push(")");

        for category in builder
            .build_query_as::<Category>()
            .fetch_all(pool)
            .await?
        {
            categories.insert(category.id, category);
        }
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT gt.title_id, g.id, g.name, g.slug FROM genres g \
         JOIN genre_title gt ON gt.genre_id = g.id WHERE gt.title_id IN (",
    );
    let mut separated = builder.separated(", ");
    for row in &rows {
        separated.push_bind(row.id);
    }
    builder.push(") ORDER BY gt.id");

    let mut genres: HashMap<i64, Vec<Genre>> = HashMap::new();
    for link in builder
        .build_query_as::<GenreLink>()
        .fetch_all(pool)
        .await?
    {
        genres.entry(link.title_id).or_default().push(Genre {
            id: link.id,
            name: link.name,
            slug: link.slug,
        });
    }

    let mut titles = Vec::with_capacity(rows.len());
    for row in rows {
        let category = row.category_id.and_then(|id| categories.get(&id).cloned());
        let genre = genres.remove(&row.id).unwrap_or_default();
        titles.push(TitleResponse {
            id: row.id,
            name: row.name,
            year: row.year,
            description: row.description,
            rating: row.rating,
            category,
            genre,
        });
    }

    Ok(titles)
}

/// Assembles the write shape from the current row: category and genres by
/// slug.
async fn write_response(pool: &SqlitePool, title_id: i64) -> Result<TitleWriteResponse, AppError> {
    let row = sqlx::query_as::<_, TitleRow>(&format!(
        "{TITLE_SELECT} WHERE t.id = ? GROUP BY t.id"
    ))
    .bind(title_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Title not found.".to_string()))?;

    let category = match row.category_id {
        Some(id) => {
            sqlx::query_scalar::<_, String>("SELECT slug FROM categories WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await?
        }
        None => None,
    };

    let genre = sqlx::query_scalar::<_, String>(
        "SELECT g.slug FROM genres g \
         JOIN genre_title gt ON gt.genre_id = g.id \
         WHERE gt.title_id = ? ORDER BY gt.id",
    )
    .bind(title_id)
    .fetch_all(pool)
    .await?;

    Ok(TitleWriteResponse {
        id: row.id,
        name: row.name,
        year: row.year,
        description: row.description,
        category,
        genre,
    })
}
