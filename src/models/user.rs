// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validate::{validate_not_reserved, validate_username, validate_username_pattern};

/// Permission tier stored in the `role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

/// Represents the 'users' table in the database.
///
/// API payloads identify users by username and expose exactly
/// {username, email, first_name, last_name, bio, role}; everything else is
/// skipped during serialization.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    #[serde(skip)]
    pub id: i64,

    /// Unique username, pattern `^[\w.@+-]+$`.
    pub username: String,

    /// Unique email address.
    pub email: String,

    pub first_name: String,
    pub last_name: String,
    pub bio: String,

    pub role: Role,

    #[serde(skip)]
    pub is_superuser: bool,

    /// Code issued at signup and exchanged for a bearer token.
    /// Skipped during serialization to prevent leaking the credential.
    #[serde(skip)]
    pub confirmation_code: Option<String>,

    #[serde(skip)]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl User {
    /// Capabilities are cumulative: admin covers moderator, moderator
    /// covers user. The superuser flag always grants admin.
    pub fn is_admin(&self) -> bool {
        self.is_superuser || self.role == Role::Admin
    }

    pub fn is_moderator(&self) -> bool {
        self.is_admin() || self.role == Role::Moderator
    }

    pub fn is_user(&self) -> bool {
        self.is_moderator() || self.role == Role::User
    }
}

/// The requester behind the current request: a per-request snapshot of the
/// user row, or nobody at all. Built by the `Actor` extractor in
/// `utils::jwt` and threaded explicitly through every permission check.
#[derive(Debug, Clone)]
pub enum Actor {
    Anonymous,
    User(User),
}

impl Actor {
    pub fn user(&self) -> Option<&User> {
        match self {
            Actor::User(user) => Some(user),
            Actor::Anonymous => None,
        }
    }
}

/// DTO for signup. Both fields are checked against the reserved name 'me'.
#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(
        length(max = 150, message = "Ensure this field has no more than 150 characters."),
        custom(function = validate_username)
    )]
    pub username: String,
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Ensure this field has no more than 254 characters."),
        custom(function = validate_not_reserved)
    )]
    pub email: String,
}

/// DTO for exchanging a confirmation code for a bearer token.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub confirmation_code: String,
}

/// DTO for an admin creating a user. The reserved-name rule does not apply
/// on the admin surface; the pattern rule does.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminCreateUserRequest {
    #[validate(
        length(max = 150, message = "Ensure this field has no more than 150 characters."),
        custom(function = validate_username_pattern)
    )]
    pub username: String,
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Ensure this field has no more than 254 characters.")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: String,
    #[serde(default)]
    pub bio: String,
    pub role: Option<Role>,
}

/// DTO for an admin updating a user. Fields are optional; role included.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub username: Option<String>,
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Ensure this field has no more than 254 characters.")
    )]
    pub email: Option<String>,
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: Option<String>,
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}

/// DTO for updating the own profile. Carries no role field, so a role key
/// in the request body is ignored rather than applied.
#[derive(Debug, Deserialize, Validate)]
pub struct ProfileUpdateRequest {
    #[validate(
        length(max = 150, message = "Ensure this field has no more than 150 characters."),
        custom(function = validate_username)
    )]
    pub username: Option<String>,
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Ensure this field has no more than 254 characters."),
        custom(function = validate_not_reserved)
    )]
    pub email: Option<String>,
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: Option<String>,
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: Option<String>,
    pub bio: Option<String>,
}
