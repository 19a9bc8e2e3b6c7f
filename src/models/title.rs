// src/models/title.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::category::Category;
use crate::models::genre::Genre;

/// Raw title row plus the aggregate rating computed in the same query.
/// `rating` is NULL (never 0) when the title has no reviews.
#[derive(Debug, FromRow)]
pub struct TitleRow {
    pub id: i64,
    pub name: String,
    pub year: i64,
    pub description: String,
    pub category_id: Option<i64>,
    pub rating: Option<f64>,
}

/// Read shape for list and detail views: nested category/genre objects and
/// the aggregate rating.
#[derive(Debug, Serialize)]
pub struct TitleResponse {
    pub id: i64,
    pub name: String,
    pub year: i64,
    pub description: String,
    pub rating: Option<f64>,
    pub category: Option<Category>,
    pub genre: Vec<Genre>,
}

/// Write shape returned from create/update: category and genres by slug.
#[derive(Debug, Serialize)]
pub struct TitleWriteResponse {
    pub id: i64,
    pub name: String,
    pub year: i64,
    pub description: String,
    pub category: Option<String>,
    pub genre: Vec<String>,
}

/// DTO for creating a title. Admin only. Category and genres are given by
/// slug; an unknown slug is a validation error (it is body data, not a
/// path identifier).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTitleRequest {
    #[validate(length(min = 1, max = 256, message = "Ensure this field has between 1 and 256 characters."))]
    pub name: String,
    #[validate(range(min = 0, max = 32767, message = "Year must be between 0 and 32767."))]
    pub year: i64,
    pub description: String,
    pub category: String,
    pub genre: Vec<String>,
}

/// DTO for updating a title. Fields are optional; a genre list replaces
/// the existing associations as a set.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTitleRequest {
    #[validate(length(min = 1, max = 256, message = "Ensure this field has between 1 and 256 characters."))]
    pub name: Option<String>,
    #[validate(range(min = 0, max = 32767, message = "Year must be between 0 and 32767."))]
    pub year: Option<i64>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub genre: Option<Vec<String>>,
}
