// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    models::user::{Actor, User},
    state::AppState,
};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// Signs a new JWT for the user.
pub fn sign_jwt(id: i64, secret: &str, expiration_seconds: u64) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: id.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid token.".to_string()))?;

    Ok(token_data.claims)
}

/// Builds the actor for the current request.
///
/// No Authorization header means an anonymous actor; a malformed or
/// invalid bearer is 401. The user row is re-read on every request, so a
/// role change applies immediately while issued tokens stay valid.
impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(Actor::Anonymous);
        };

        let token = value
            .to_str()
            .ok()
            .and_then(|header| header.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization header.".to_string()))?;

        let claims = verify_jwt(token, &state.config.jwt_secret)?;
        let id: i64 = claims
            .sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Invalid token.".to_string()))?;

        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, first_name, last_name, bio, role, is_superuser, \
             confirmation_code, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid token.".to_string()))?;

        Ok(Actor::User(user))
    }
}
