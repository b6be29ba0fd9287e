use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use sqlx::{QueryBuilder, Sqlite};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_age, validate_required};
use super::{accept_image_upload, IdResponse, ImageResponse};
use crate::db::{CreateCrewRequest, CrewMember, UpdateCrewRequest};
use crate::uploads::{self, ImageConstraints, PUBLIC_PREFIX};
use crate::AppState;

fn validate_create_request(req: &CreateCrewRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    for (value, field, label) in [
        (&req.first_name, "firstName", "First name"),
        (&req.last_name, "lastName", "Last name"),
        (&req.profession, "profession", "Profession"),
        (&req.description, "description", "Description"),
    ] {
        if let Err(e) = validate_required(value, label) {
            errors.add(field, e);
        }
    }
    if let Err(e) = validate_age(req.age) {
        errors.add("age", e);
    }

    errors.finish()
}

fn validate_update_request(req: &UpdateCrewRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    for (value, field, label) in [
        (&req.first_name, "firstName", "First name"),
        (&req.last_name, "lastName", "Last name"),
        (&req.profession, "profession", "Profession"),
        (&req.description, "description", "Description"),
        (&req.image, "image", "Image"),
    ] {
        if let Some(v) = value {
            if let Err(e) = validate_required(v, label) {
                errors.add(field, e);
            }
        }
    }
    if let Err(e) = validate_age(req.age) {
        errors.add("age", e);
    }

    errors.finish()
}

/// Fixed allow-list of updatable columns.
fn push_crew_updates<'a>(qb: &mut QueryBuilder<'a, Sqlite>, req: &'a UpdateCrewRequest) -> usize {
    let mut count = 0;
    let mut sep = qb.separated(", ");
    for (column, value) in [
        ("first_name = ", &req.first_name),
        ("last_name = ", &req.last_name),
        ("profession = ", &req.profession),
        ("description = ", &req.description),
        ("image = ", &req.image),
    ] {
        if let Some(v) = value {
            sep.push(column);
            sep.push_bind_unseparated(v);
            count += 1;
        }
    }
    if let Some(age) = req.age {
        sep.push("age = ");
        sep.push_bind_unseparated(age);
        count += 1;
    }
    count
}

/// Normalized avatars are re-encoded as JPEG next to the original name.
fn normalized_name(file_name: &str) -> String {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    format!("processed-{}.jpg", stem)
}

pub async fn list_crew(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CrewMember>>, ApiError> {
    let crew = sqlx::query_as::<_, CrewMember>("SELECT * FROM crew_members ORDER BY id ASC")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(crew))
}

pub async fn get_crew_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<CrewMember>, ApiError> {
    let member = sqlx::query_as::<_, CrewMember>("SELECT * FROM crew_members WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Crew member not found"))?;

    Ok(Json(member))
}

pub async fn create_crew_member(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCrewRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    validate_create_request(&req)?;

    let image = match &req.image {
        Some(i) if !i.trim().is_empty() => i.clone(),
        _ => state.config.uploads.placeholder_image.clone(),
    };

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO crew_members (first_name, last_name, age, profession, description, image)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(req.age)
    .bind(&req.profession)
    .bind(&req.description)
    .bind(&image)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(id, "Crew member created");
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

pub async fn update_crew_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCrewRequest>,
) -> Result<Json<IdResponse>, ApiError> {
    validate_update_request(&req)?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE crew_members SET ");
    if push_crew_updates(&mut qb, &req) == 0 {
        return Err(ApiError::bad_request("No fields to update"));
    }
    qb.push(" WHERE id = ");
    qb.push_bind(id);

    let result = qb.build().execute(&state.db).await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Crew member not found"));
    }

    Ok(Json(IdResponse { id }))
}

pub async fn delete_crew_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted: Option<(i64, String)> =
        sqlx::query_as("DELETE FROM crew_members WHERE id = ? RETURNING id, image")
            .bind(id)
            .fetch_optional(&state.db)
            .await?;

    let Some((_, image)) = deleted else {
        return Err(ApiError::not_found("Crew member not found"));
    };

    if uploads::is_managed_path(&image) {
        uploads::remove_managed_file(&image, &state.config.uploads.dir).await;
    }

    tracing::info!(id, "Crew member deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Avatar upload; unlike events/articles the stored file goes through the
/// normalization stage and only the normalized JPEG is kept.
pub async fn upload_crew_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<ImageResponse>, ApiError> {
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM crew_members WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::not_found("Crew member not found"));
    }

    let stored = accept_image_upload(
        &mut multipart,
        &ImageConstraints::png_jpeg("crew"),
        &state.config.uploads.dir,
    )
    .await?;

    let out_name = normalized_name(&stored.file_name);
    let out_path = state.config.uploads.dir.join(&out_name);
    uploads::normalize_avatar_file(stored.disk_path.clone(), out_path).await?;

    let public_path = format!("{}/{}", PUBLIC_PREFIX, out_name);
    let (id, image): (i64, String) =
        sqlx::query_as("UPDATE crew_members SET image = ? WHERE id = ? RETURNING id, image")
            .bind(&public_path)
            .bind(id)
            .fetch_one(&state.db)
            .await?;

    Ok(Json(ImageResponse { id, image }))
}
