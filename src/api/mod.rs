mod admins;
mod articles;
pub mod auth;
mod crew;
pub mod error;
mod events;
mod validation;

use axum::{
    extract::{DefaultBodyLimit, Multipart},
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::uploads::{self, ImageConstraints, StoredImage, UploadError};
use crate::AppState;
use error::ApiError;

/// Create/update responses carry just the row id.
#[derive(Debug, Serialize)]
pub struct IdResponse {
    pub id: i64,
}

/// Image-upload responses echo the updated row.
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub id: i64,
    pub image: String,
}

// Uploads are capped by the pipeline (<= 10 MB); leave headroom for the
// multipart framing so the pipeline, not the framework default, decides.
const BODY_LIMIT: usize = 11 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(auth::login))
        .route("/events", get(events::list_events))
        .route("/events/:id", get(events::get_event))
        .route("/events/:id/join", post(events::join_event))
        .route("/crew", get(crew::list_crew))
        .route("/crew/:id", get(crew::get_crew_member))
        .route("/articles", get(articles::list_articles))
        .route("/articles/:id", get(articles::get_article));

    // Protected by auth
    let admin_routes = Router::new()
        .route("/events", post(events::create_event))
        .route("/events/:id", put(events::update_event))
        .route("/events/:id", delete(events::delete_event))
        .route("/events/:id/image", post(events::upload_event_image))
        .route("/crew", post(crew::create_crew_member))
        .route("/crew/:id", put(crew::update_crew_member))
        .route("/crew/:id", delete(crew::delete_crew_member))
        .route("/crew/:id/image", post(crew::upload_crew_image))
        .route("/articles", post(articles::create_article))
        .route("/articles/preview", post(articles::preview_article))
        .route("/articles/:id", put(articles::update_article))
        .route("/articles/:id", delete(articles::delete_article))
        .route("/articles/:id/image", post(articles::upload_article_image))
        .route("/admins", get(admins::list_admins))
        .route("/admins", post(admins::create_admin))
        .route("/admins/:id", delete(admins::delete_admin))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Find the `image` part of a multipart body and run it through the upload
/// pipeline. A body without one rejects the same way as a bad file.
pub(crate) async fn accept_image_upload(
    multipart: &mut Multipart,
    constraints: &ImageConstraints,
    uploads_dir: &std::path::Path,
) -> Result<StoredImage, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Io(e.to_string()))?
    {
        if field.name() == Some("image") {
            return Ok(uploads::accept_image(field, constraints, uploads_dir).await?);
        }
    }
    Err(UploadError::MissingFile.into())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Config;

    /// Fresh state over an in-memory database and a throwaway uploads dir.
    pub(crate) async fn test_state() -> Arc<AppState> {
        let pool = crate::db::test_pool().await;
        let mut config = Config::default();
        config.uploads.dir = tempfile::tempdir().unwrap().keep();
        config.auth.jwt_secret = "test-secret".to_string();
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        Arc::new(AppState::new(config, pool, client))
    }

    #[tokio::test]
    async fn test_router_builds() {
        let state = test_state().await;
        let _router = create_router(state);
    }
}
