// src/handlers/users.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    error::{AppError, db_unique_violation},
    models::user::{
        Actor, AdminCreateUserRequest, AdminUpdateUserRequest, ProfileUpdateRequest, Role, User,
    },
    policy::{self, Action, Owner, ResourceKind},
};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, bio, role, \
     is_superuser, confirmation_code, created_at";

/// Query parameters for listing users.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
}

/// Lists all users ordered by username. Admin only.
pub async fn list_users(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::List, ResourceKind::UserDirectory)?;

    let pattern = params.search.map(|s| format!("%{}%", s));

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users \
         WHERE (?1 IS NULL OR username LIKE ?1) ORDER BY username"
    ))
    .bind(pattern)
    .fetch_all(&pool)
    .await?;

    Ok(Json(users))
}

/// Creates a user with an explicit role. Admin only.
pub async fn create_user(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Create, ResourceKind::UserDirectory)?;
    payload.validate()?;

    let role = payload.role.unwrap_or(Role::User);

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, email, first_name, last_name, bio, role, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {USER_COLUMNS}"
    ))
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&payload.bio)
    .bind(role)
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(unique_to_validation)?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Retrieves a user by username. Admin only.
pub async fn get_user(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Retrieve, ResourceKind::UserDirectory)?;

    let user = fetch_by_username(&pool, &username).await?;
    policy::check_object(
        &actor,
        Action::Retrieve,
        ResourceKind::UserDirectory,
        Owner::Username(&user.username),
    )?;

    Ok(Json(user))
}

/// Partially updates a user, role included. Admin only.
pub async fn update_user(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path(username): Path<String>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Update, ResourceKind::UserDirectory)?;

    let user = fetch_by_username(&pool, &username).await?;
    policy::check_object(
        &actor,
        Action::Update,
        ResourceKind::UserDirectory,
        Owner::Username(&user.username),
    )?;

    payload.validate()?;

    if payload.username.is_none()
        && payload.email.is_none()
        && payload.first_name.is_none()
        && payload.last_name.is_none()
        && payload.bio.is_none()
        && payload.role.is_none()
    {
        return Ok(Json(user));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(new_username) = &payload.username {
        separated.push("username = ");
        separated.push_bind_unseparated(new_username);
    }

    if let Some(email) = &payload.email {
        separated.push("email = ");
        separated.push_bind_unseparated(email);
    }

    if let Some(first_name) = &payload.first_name {
        separated.push("first_name = ");
        separated.push_bind_unseparated(first_name);
    }

    if let Some(last_name) = &payload.last_name {
        separated.push("last_name = ");
        separated.push_bind_unseparated(last_name);
    }

    if let Some(bio) = &payload.bio {
        separated.push("bio = ");
        separated.push_bind_unseparated(bio);
    }

    if let Some(role) = payload.role {
        separated.push("role = ");
        separated.push_bind_unseparated(role);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(user.id);

    builder
        .build()
        .execute(&pool)
        .await
        .map_err(unique_to_validation)?;

    let updated = fetch_by_id(&pool, user.id).await?;

    Ok(Json(updated))
}

/// Deletes a user by username. Admin only.
pub async fn delete_user(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Delete, ResourceKind::UserDirectory)?;

    let user = fetch_by_username(&pool, &username).await?;
    policy::check_object(
        &actor,
        Action::Delete,
        ResourceKind::UserDirectory,
        Owner::Username(&user.username),
    )?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Retrieves the authenticated actor's own record. The record is resolved
/// by the actor's own username, never a client-supplied identifier.
pub async fn me(
    State(pool): State<SqlitePool>,
    actor: Actor,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Retrieve, ResourceKind::OwnProfile)?;
    let username = policy::require_user(&actor)?.username.clone();

    let record = fetch_by_username(&pool, &username).await?;
    policy::check_object(
        &actor,
        Action::Retrieve,
        ResourceKind::OwnProfile,
        Owner::Username(&record.username),
    )?;

    Ok(Json(record))
}

/// Partially updates the authenticated actor's own record. The DTO
/// carries no role field, so the role cannot be changed here.
pub async fn update_me(
    State(pool): State<SqlitePool>,
    actor: Actor,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::check(&actor, Action::Update, ResourceKind::OwnProfile)?;
    let username = policy::require_user(&actor)?.username.clone();

    let record = fetch_by_username(&pool, &username).await?;
    policy::check_object(
        &actor,
        Action::Update,
        ResourceKind::OwnProfile,
        Owner::Username(&record.username),
    )?;

    payload.validate()?;

    if payload.username.is_none()
        && payload.email.is_none()
        && payload.first_name.is_none()
        && payload.last_name.is_none()
        && payload.bio.is_none()
    {
        return Ok(Json(record));
    }

    // One statement, so a uniqueness conflict on any field leaves the whole
    // record untouched.
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(new_username) = &payload.username {
        separated.push("username = ");
        separated.push_bind_unseparated(new_username);
    }

    if let Some(email) = &payload.email {
        separated.push("email = ");
        separated.push_bind_unseparated(email);
    }

    if let Some(first_name) = &payload.first_name {
        separated.push("first_name = ");
        separated.push_bind_unseparated(first_name);
    }

    if let Some(last_name) = &payload.last_name {
        separated.push("last_name = ");
        separated.push_bind_unseparated(last_name);
    }

    if let Some(bio) = &payload.bio {
        separated.push("bio = ");
        separated.push_bind_unseparated(bio);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(record.id);

    builder
        .build()
        .execute(&pool)
        .await
        .map_err(unique_to_validation)?;

    let updated = fetch_by_id(&pool, record.id).await?;

    Ok(Json(updated))
}

/// Translates a store uniqueness conflict on username/email into the same
/// 400 shape an application-level pre-check would produce.
fn unique_to_validation(err: sqlx::Error) -> AppError {
    match db_unique_violation(&err) {
        Some(msg) if msg.contains("users.email") => {
            AppError::validation("email", "A user with this email already exists.")
        }
        Some(_) => AppError::validation("username", "A user with this username already exists."),
        None => AppError::from(err),
    }
}

async fn fetch_by_username(pool: &SqlitePool, username: &str) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
}

async fn fetch_by_id(pool: &SqlitePool, id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
}
