use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;

use super::auth::{hash_password, AdminIdentity};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_password, validate_username};
use super::IdResponse;
use crate::db::{AdminSummary, CreateAdminRequest};
use crate::AppState;

pub async fn list_admins(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AdminSummary>>, ApiError> {
    let admins =
        sqlx::query_as::<_, AdminSummary>("SELECT id, username FROM admins ORDER BY id ASC")
            .fetch_all(&state.db)
            .await?;

    Ok(Json(admins))
}

pub async fn create_admin(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAdminRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_username(&req.username) {
        errors.add("username", e);
    }
    if let Err(e) = validate_password(&req.password) {
        errors.add("password", e);
    }
    errors.finish()?;

    let hash = hash_password(&req.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to create admin")
    })?;

    // Duplicate usernames surface as a UNIQUE violation -> 409
    let (id,): (i64,) =
        sqlx::query_as("INSERT INTO admins (username, password_hash) VALUES (?, ?) RETURNING id")
            .bind(req.username.trim())
            .bind(&hash)
            .fetch_one(&state.db)
            .await?;

    tracing::info!(id, username = %req.username, "Admin created");
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

/// Self-deletion is allowed (the admin UI blocks it client-side); it is
/// logged so a locked-out install can be diagnosed.
pub async fn delete_admin(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AdminIdentity>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted: Option<(i64,)> = sqlx::query_as("DELETE FROM admins WHERE id = ? RETURNING id")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;

    if deleted.is_none() {
        return Err(ApiError::not_found("Admin not found"));
    }

    if identity.id == id {
        tracing::warn!(id, username = %identity.username, "Admin deleted their own account");
    } else {
        tracing::info!(id, by = %identity.username, "Admin deleted");
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::verify_password;
    use crate::api::tests::test_state;
    use crate::db::Admin;

    fn identity() -> Extension<AdminIdentity> {
        Extension(AdminIdentity {
            id: 999,
            username: "root".to_string(),
        })
    }

    #[tokio::test]
    async fn test_create_list_delete() {
        let state = test_state().await;

        let (status, Json(created)) = create_admin(
            State(state.clone()),
            Json(CreateAdminRequest {
                username: "ana".to_string(),
                password: "secret1".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let Json(admins) = list_admins(State(state.clone())).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].username, "ana");

        // Password is stored hashed
        let row: Admin = sqlx::query_as("SELECT * FROM admins WHERE id = ?")
            .bind(created.id)
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_ne!(row.password_hash, "secret1");
        assert!(verify_password("secret1", &row.password_hash));

        let status = delete_admin(State(state.clone()), identity(), Path(created.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let err = delete_admin(State(state), identity(), Path(created.id))
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::api::error::ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let state = test_state().await;

        let err = create_admin(
            State(state.clone()),
            Json(CreateAdminRequest {
                username: "ab".to_string(),
                password: "12345".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), crate::api::error::ErrorCode::ValidationError);

        let Json(admins) = list_admins(State(state)).await.unwrap();
        assert!(admins.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let state = test_state().await;
        let req = CreateAdminRequest {
            username: "ana".to_string(),
            password: "secret1".to_string(),
        };

        create_admin(State(state.clone()), Json(req)).await.unwrap();
        let err = create_admin(
            State(state),
            Json(CreateAdminRequest {
                username: "ana".to_string(),
                password: "other-secret".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), crate::api::error::ErrorCode::Conflict);
    }
}
