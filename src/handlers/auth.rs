// src/handlers/auth.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, db_unique_violation},
    models::user::{SignUpRequest, TokenRequest, User},
    state::AppState,
    utils::jwt::sign_jwt,
};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, bio, role, \
     is_superuser, confirmation_code, created_at";

/// Registers a username/email pair and issues a confirmation code.
///
/// Signing up again with the same username and the same email regenerates
/// the code; with a different email it is rejected without touching the
/// record. The code is persisted before delivery is attempted, so a mail
/// failure never loses it.
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let existing = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
    ))
    .bind(&payload.username)
    .fetch_optional(&state.pool)
    .await?;

    let code = Uuid::new_v4().to_string();

    if let Some(user) = existing {
        if user.email != payload.email {
            return Err(AppError::validation(
                "email",
                "Email does not match this username.",
            ));
        }
        sqlx::query("UPDATE users SET confirmation_code = ? WHERE id = ?")
            .bind(&code)
            .bind(user.id)
            .execute(&state.pool)
            .await?;
    } else {
        sqlx::query(
            "INSERT INTO users (username, email, role, confirmation_code, created_at) \
             VALUES (?, ?, 'user', ?, ?)",
        )
        .bind(&payload.username)
        .bind(&payload.email)
        .bind(&code)
        .bind(chrono::Utc::now())
        .execute(&state.pool)
        .await
        .map_err(|e| match db_unique_violation(&e) {
            Some(msg) if msg.contains("users.email") => {
                AppError::validation("email", "A user with this email already exists.")
            }
            Some(_) => AppError::validation("username", "A user with this username already exists."),
            None => AppError::from(e),
        })?;
    }

    let body = format!(
        "You are registered on Critica! Your confirmation code: {}",
        code
    );
    if let Err(e) = state
        .mailer
        .send(&payload.email, "Registration confirmation code", &body)
        .await
    {
        tracing::error!(
            "Failed to deliver confirmation code to {}: {}",
            payload.email,
            e
        );
    }

    Ok(Json(json!({
        "username": payload.username,
        "email": payload.email,
    })))
}

/// Exchanges a username and confirmation code for a bearer token.
///
/// Unknown username is 404; a wrong or absent code is a 400-class
/// authentication failure per the published contract. The code is not
/// invalidated on use.
pub async fn token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
    ))
    .bind(&payload.username)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

    match user.confirmation_code.as_deref() {
        Some(code) if code == payload.confirmation_code => {}
        _ => {
            return Err(AppError::AuthenticationFailed(
                "Invalid confirmation code.".to_string(),
            ));
        }
    }

    let token = sign_jwt(user.id, &state.config.jwt_secret, state.config.jwt_expiration)?;

    Ok(Json(json!({ "token": token })))
}
