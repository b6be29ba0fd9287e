//! Admin authentication: Argon2 password hashing, JWT issuance and the
//! bearer-token middleware guarding the admin routes.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::config::AuthConfig;
use crate::db::{Admin, DbPool, LoginRequest, LoginResponse};
use crate::AppState;

/// Token claims. `sub` is the admin row id; `role` is a fixed marker the
/// middleware checks on every protected request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Identity attached to the request by the auth middleware.
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    pub id: i64,
    pub username: String,
}

lazy_static! {
    // Verified against when the username does not exist, so login timing
    // does not reveal whether an account is present.
    static ref DUMMY_HASH: String =
        hash_password("invalid-password").expect("hashing a fixed password cannot fail");
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Issue a signed admin token with the configured lifetime.
pub fn sign_token(auth: &AuthConfig, admin_id: i64, username: &str) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: admin_id,
        username: username.to_string(),
        role: "admin".to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::days(auth.token_ttl_days)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("Failed to sign token: {}", e);
        ApiError::internal("Failed to issue token")
    })
}

/// Decode and verify a token's signature and expiry.
pub fn verify_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let admin: Option<Admin> = sqlx::query_as("SELECT * FROM admins WHERE username = ?")
        .bind(&request.username)
        .fetch_optional(&state.db)
        .await?;

    let ok = match &admin {
        Some(admin) => verify_password(&request.password, &admin.password_hash),
        None => {
            // Burn the same work as a real comparison
            verify_password(&request.password, &DUMMY_HASH);
            false
        }
    };

    let admin = match (ok, admin) {
        (true, Some(admin)) => admin,
        _ => return Err(ApiError::unauthorized("Invalid credentials")),
    };

    let token = sign_token(&state.config.auth, admin.id, &admin.username)?;

    tracing::info!(username = %admin.username, "Admin logged in");
    Ok(Json(LoginResponse { token }))
}

/// Middleware guarding admin-only routes. Attaches the decoded identity to
/// the request extensions for downstream handlers.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => return Err(ApiError::unauthorized("Missing token")),
    };

    let claims = verify_token(&state.config.auth.jwt_secret, token)
        .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;

    if claims.role != "admin" {
        return Err(ApiError::forbidden("Forbidden"));
    }

    request.extensions_mut().insert(AdminIdentity {
        id: claims.sub,
        username: claims.username,
    });

    Ok(next.run(request).await)
}

/// Create the initial admin account when none exists. Uses the configured
/// password, or generates one and logs it once.
pub async fn ensure_admin_user(pool: &DbPool, auth: &AuthConfig) -> anyhow::Result<()> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admins")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    let (password, generated) = match &auth.admin_password {
        Some(p) => (p.clone(), false),
        None => {
            let mut rng = rand::rng();
            let bytes: [u8; 9] = rng.random();
            (hex::encode(bytes), true)
        }
    };

    let hash = hash_password(&password)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?;

    sqlx::query("INSERT INTO admins (username, password_hash) VALUES (?, ?)")
        .bind(&auth.admin_username)
        .bind(&hash)
        .execute(pool)
        .await?;

    if generated {
        tracing::info!(
            "Created initial admin '{}' with password: {}",
            auth.admin_username,
            password
        );
    } else {
        tracing::info!("Created initial admin '{}'", auth.admin_username);
    }

    Ok(())
}
