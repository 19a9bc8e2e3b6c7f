// src/models/category.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validate::validate_slug;

/// Represents the 'categories' table. API payloads expose {name, slug}.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Category {
    #[serde(skip)]
    pub id: i64,
    pub name: String,
    /// Unique slug, used as the path identifier.
    pub slug: String,
}

/// DTO for creating a category. Admin only.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 256, message = "Ensure this field has between 1 and 256 characters."))]
    pub name: String,
    #[validate(
        length(min = 1, max = 50, message = "Ensure this field has between 1 and 50 characters."),
        custom(function = validate_slug)
    )]
    pub slug: String,
}
