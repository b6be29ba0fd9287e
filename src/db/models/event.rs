//! Event models and request shapes.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub date: String,
    pub time: String,
    pub location: String,
    pub distance: String,
    pub difficulty: String,
    pub coffee_stop: String,
    pub description: String,
    pub image: String,
    pub runner_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    pub date: String,
    pub time: String,
    pub location: String,
    pub distance: String,
    pub difficulty: String,
    pub coffee_stop: String,
    pub description: String,
    pub image: Option<String>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub distance: Option<String>,
    pub difficulty: Option<String>,
    pub coffee_stop: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

/// Paginated listing envelope returned when `page` and `pageSize` are both
/// supplied; plain listings return a bare array instead.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    pub items: Vec<Event>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub runner_count: i64,
}
