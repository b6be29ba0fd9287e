use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::validate_required;
use super::{accept_image_upload, IdResponse, ImageResponse};
use crate::db::{CreateEventRequest, DbPool, Event, EventPage, JoinResponse, UpdateEventRequest};
use crate::uploads::{self, ImageConstraints};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    pub page: Option<i64>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<i64>,
}

fn clamp_page(page: i64) -> i64 {
    page.max(1)
}

fn clamp_page_size(page_size: i64) -> i64 {
    page_size.clamp(1, 100)
}

fn total_pages(total: i64, page_size: i64) -> i64 {
    ((total + page_size - 1) / page_size).max(1)
}

fn validate_create_request(req: &CreateEventRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    for (value, field, label) in [
        (&req.title, "title", "Title"),
        (&req.date, "date", "Date"),
        (&req.time, "time", "Time"),
        (&req.location, "location", "Location"),
        (&req.distance, "distance", "Distance"),
        (&req.difficulty, "difficulty", "Difficulty"),
        (&req.coffee_stop, "coffeeStop", "Coffee stop"),
        (&req.description, "description", "Description"),
    ] {
        if let Err(e) = validate_required(value, label) {
            errors.add(field, e);
        }
    }

    errors.finish()
}

fn validate_update_request(req: &UpdateEventRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    for (value, field, label) in [
        (&req.title, "title", "Title"),
        (&req.date, "date", "Date"),
        (&req.time, "time", "Time"),
        (&req.location, "location", "Location"),
        (&req.distance, "distance", "Distance"),
        (&req.difficulty, "difficulty", "Difficulty"),
        (&req.coffee_stop, "coffeeStop", "Coffee stop"),
        (&req.description, "description", "Description"),
        (&req.image, "image", "Image"),
    ] {
        if let Some(v) = value {
            if let Err(e) = validate_required(v, label) {
                errors.add(field, e);
            }
        }
    }

    errors.finish()
}

/// Append `col = ?` pairs for every supplied field. The column list is a
/// fixed allow-list; request keys never reach the SQL text.
fn push_event_updates<'a>(
    qb: &mut QueryBuilder<'a, Sqlite>,
    req: &'a UpdateEventRequest,
) -> usize {
    let mut count = 0;
    let mut sep = qb.separated(", ");
    for (column, value) in [
        ("title = ", &req.title),
        ("date = ", &req.date),
        ("time = ", &req.time),
        ("location = ", &req.location),
        ("distance = ", &req.distance),
        ("difficulty = ", &req.difficulty),
        ("coffee_stop = ", &req.coffee_stop),
        ("description = ", &req.description),
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

async fn fetch_all_events(db: &DbPool) -> Result<Vec<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>("SELECT * FROM events ORDER BY date ASC, id ASC")
        .fetch_all(db)
        .await
}

async fn fetch_event_page(
    db: &DbPool,
    page: i64,
    page_size: i64,
) -> Result<EventPage, sqlx::Error> {
    let page = clamp_page(page);
    let page_size = clamp_page_size(page_size);

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
        .fetch_one(db)
        .await?;

    let items = sqlx::query_as::<_, Event>(
        "SELECT * FROM events ORDER BY date ASC, id ASC LIMIT ? OFFSET ?",
    )
    .bind(page_size)
    .bind((page - 1) * page_size)
    .fetch_all(db)
    .await?;

    Ok(EventPage {
        items,
        page,
        page_size,
        total,
        total_pages: total_pages(total, page_size),
    })
}

/// Public listing. Returns a plain array, or the pagination envelope when
/// both `page` and `pageSize` are supplied (the admin panel pages, the
/// public site renders everything).
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Response, ApiError> {
    if let (Some(page), Some(page_size)) = (query.page, query.page_size) {
        let page = fetch_event_page(&state.db, page, page_size).await?;
        return Ok(Json(page).into_response());
    }

    let events = fetch_all_events(&state.db).await?;
    Ok(Json(events).into_response())
}

pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Event>, ApiError> {
    let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;

    Ok(Json(event))
}

pub async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    validate_create_request(&req)?;

    let image = match &req.image {
        Some(i) if !i.trim().is_empty() => i.clone(),
        _ => state.config.uploads.placeholder_image.clone(),
    };

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO events (title, date, time, location, distance, difficulty, coffee_stop, description, image, runner_count)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
        RETURNING id
        "#,
    )
    .bind(&req.title)
    .bind(&req.date)
    .bind(&req.time)
    .bind(&req.location)
    .bind(&req.distance)
    .bind(&req.difficulty)
    .bind(&req.coffee_stop)
    .bind(&req.description)
    .bind(&image)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(id, title = %req.title, "Event created");
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

pub async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<Json<IdResponse>, ApiError> {
    validate_update_request(&req)?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE events SET ");
    if push_event_updates(&mut qb, &req) == 0 {
        return Err(ApiError::bad_request("No fields to update"));
    }
    qb.push(" WHERE id = ");
    qb.push_bind(id);

    let result = qb.build().execute(&state.db).await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Event not found"));
    }

    Ok(Json(IdResponse { id }))
}

pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted: Option<(i64, String)> =
        sqlx::query_as("DELETE FROM events WHERE id = ? RETURNING id, image")
            .bind(id)
            .fetch_optional(&state.db)
            .await?;

    let Some((_, image)) = deleted else {
        return Err(ApiError::not_found("Event not found"));
    };

    if uploads::is_managed_path(&image) {
        uploads::remove_managed_file(&image, &state.config.uploads.dir).await;
    }

    tracing::info!(id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Public: anyone can join, any number of times. The single UPDATE keeps
/// concurrent joins lossless.
pub async fn join_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<JoinResponse>, ApiError> {
    let row: Option<(i64,)> = sqlx::query_as(
        "UPDATE events SET runner_count = runner_count + 1 WHERE id = ? RETURNING runner_count",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;

    let (runner_count,) = row.ok_or_else(|| ApiError::not_found("Event not found"))?;
    Ok(Json(JoinResponse { runner_count }))
}

pub async fn upload_event_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<ImageResponse>, ApiError> {
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM events WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::not_found("Event not found"));
    }

    let stored = accept_image_upload(
        &mut multipart,
        &ImageConstraints::png_jpeg("event"),
        &state.config.uploads.dir,
    )
    .await?;

    let (id, image): (i64, String) =
        sqlx::query_as("UPDATE events SET image = ? WHERE id = ? RETURNING id, image")
            .bind(&stored.public_path)
            .bind(id)
            .fetch_one(&state.db)
            .await?;

    Ok(Json(ImageResponse { id, image }))
}
