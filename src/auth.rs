//! Password hashing, JWT issuance/verification and the request extractors
//! that gate the API.
//!
//! Tokens are HS256 JWTs whose subject is the user's email. `CurrentUser`
//! rejects with 401, `AdminUser` additionally requires the superuser flag
//! and rejects with 403.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::user::{self, User};
use crate::routes::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User email.
    pub sub: String,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| ApiError::Internal(format!("failed to hash password: {}", err)))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn create_access_token(
    email: &str,
    secret: &str,
    expire_minutes: i64,
) -> Result<String, ApiError> {
    let claims = Claims {
        sub: email.to_string(),
        exp: (Utc::now() + Duration::minutes(expire_minutes)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| ApiError::Internal(format!("failed to sign token: {}", err)))
}

/// Decode and verify a token, including its expiry.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::invalid_credentials())
}

/// The authenticated user, resolved from the `Authorization: Bearer` header.
pub struct CurrentUser(pub User);

/// An authenticated superuser; required for writes to linguistic data.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(ApiError::invalid_credentials)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(ApiError::invalid_credentials)?;

        let claims = decode_token(token, &state.config.secret_key)?;

        let mut conn = state.db.pool().acquire().await?;
        let user = user::get_by_email(&mut conn, &claims.sub)
            .await?
            .ok_or_else(ApiError::invalid_credentials)?;
        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_superuser {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
