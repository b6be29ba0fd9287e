//! Crew member models and request shapes.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CrewMember {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i64>,
    pub profession: String,
    pub description: String,
    pub image: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCrewRequest {
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i64>,
    pub profession: String,
    pub description: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCrewRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i64>,
    pub profession: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}
