//! Article models and request shapes.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Article {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub image: Option<String>,
}

/// `name` and `image` may be omitted; creation then tries to derive them
/// from the target page's OpenGraph metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateArticleRequest {
    pub name: Option<String>,
    pub url: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateArticleRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub name: String,
    pub image: Option<String>,
}
