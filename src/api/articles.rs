use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use sqlx::{QueryBuilder, Sqlite};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_required, validate_url};
use super::{accept_image_upload, IdResponse, ImageResponse};
use crate::db::{
    Article, CreateArticleRequest, PreviewRequest, PreviewResponse, UpdateArticleRequest,
};
use crate::preview;
use crate::uploads::{self, ImageConstraints};
use crate::AppState;

fn validate_create_request(req: &CreateArticleRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_url(&req.url) {
        errors.add("url", e);
    }
    if let Some(name) = &req.name {
        if let Err(e) = validate_required(name, "Name") {
            errors.add("name", e);
        }
    }

    errors.finish()
}

fn validate_update_request(req: &UpdateArticleRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(url) = &req.url {
        if let Err(e) = validate_url(url) {
            errors.add("url", e);
        }
    }
    if let Some(name) = &req.name {
        if let Err(e) = validate_required(name, "Name") {
            errors.add("name", e);
        }
    }
    if let Some(image) = &req.image {
        if let Err(e) = validate_required(image, "Image") {
            errors.add("image", e);
        }
    }

    errors.finish()
}

/// Fixed allow-list of updatable columns.
fn push_article_updates<'a>(
    qb: &mut QueryBuilder<'a, Sqlite>,
    req: &'a UpdateArticleRequest,
) -> usize {
    let mut count = 0;
    let mut sep = qb.separated(", ");
    for (column, value) in [
        ("name = ", &req.name),
        ("url = ", &req.url),
        ("image = ", &req.image),
    ] {
        if let Some(v) = value {
            sep.push(column);
            sep.push_bind_unseparated(v);
            count += 1;
        }
    }
    count
}

/// Newest first: articles are shown as a reverse-chronological feed.
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Article>>, ApiError> {
    let articles = sqlx::query_as::<_, Article>("SELECT * FROM articles ORDER BY id DESC")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(articles))
}

pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Article>, ApiError> {
    let article = sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;

    Ok(Json(article))
}

/// Create an article. Missing name/image are derived from the target
/// page's OpenGraph metadata; when the fetch yields nothing the name falls
/// back to the URL itself and the image stays null.
pub async fn create_article(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    validate_create_request(&req)?;

    let mut name = req.name.clone().filter(|n| !n.trim().is_empty());
    let mut image = req.image.clone().filter(|i| !i.trim().is_empty());

    if name.is_none() || image.is_none() {
        let og = preview::fetch_preview(&state.http, &req.url).await;
        if name.is_none() {
            name = og.title;
        }
        if image.is_none() {
            image = og.image;
        }
    }

    let name = name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| req.url.clone());
    let image = image.filter(|i| !i.trim().is_empty());

    let (id,): (i64,) =
        sqlx::query_as("INSERT INTO articles (name, url, image) VALUES (?, ?, ?) RETURNING id")
            .bind(&name)
            .bind(&req.url)
            .bind(&image)
            .fetch_one(&state.db)
            .await?;

    tracing::info!(id, url = %req.url, "Article created");
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

/// Dry-run preview for the admin panel; nothing is persisted.
pub async fn preview_article(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    if let Err(e) = validate_url(&req.url) {
        return Err(ApiError::validation_field("url", e));
    }

    let og = preview::fetch_preview(&state.http, &req.url).await;
    Ok(Json(PreviewResponse {
        name: og.title.unwrap_or_else(|| req.url.clone()),
        image: og.image,
    }))
}

pub async fn update_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateArticleRequest>,
) -> Result<Json<IdResponse>, ApiError> {
    validate_update_request(&req)?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE articles SET ");
    if push_article_updates(&mut qb, &req) == 0 {
        return Err(ApiError::bad_request("No fields to update"));
    }
    qb.push(" WHERE id = ");
    qb.push_bind(id);

    let result = qb.build().execute(&state.db).await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Article not found"));
    }

    Ok(Json(IdResponse { id }))
}

pub async fn delete_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted: Option<(i64, Option<String>)> =
        sqlx::query_as("DELETE FROM articles WHERE id = ? RETURNING id, image")
            .bind(id)
            .fetch_optional(&state.db)
            .await?;

    let Some((_, image)) = deleted else {
        return Err(ApiError::not_found("Article not found"));
    };

    if let Some(image) = image {
        if uploads::is_managed_path(&image) {
            uploads::remove_managed_file(&image, &state.config.uploads.dir).await;
        }
    }

    tracing::info!(id, "Article deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_article_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<ImageResponse>, ApiError> {
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM articles WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::not_found("Article not found"));
    }

    let stored = accept_image_upload(
        &mut multipart,
        &ImageConstraints::png_jpeg("article"),
        &state.config.uploads.dir,
    )
    .await?;

    let (id, image): (i64, String) =
        sqlx::query_as("UPDATE articles SET image = ? WHERE id = ? RETURNING id, image")
            .bind(&stored.public_path)
            .bind(id)
            .fetch_one(&state.db)
            .await?;

    Ok(Json(ImageResponse { id, image }))
}
