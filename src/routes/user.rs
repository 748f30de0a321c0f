//! `/user` and `/auth`: registration, profile updates and token issuance.

use std::sync::OnceLock;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{patch, post};
use axum::{Form, Json, Router};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::auth::{self, CurrentUser};
use crate::error::ApiError;
use crate::language::Language;
use crate::models::user::{self, User, UserUpdate};
use crate::routes::AppState;

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

fn validate_email(email: &str) -> Result<(), ApiError> {
    let regex = EMAIL_REGEX.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
    if regex.is_match(email) {
        Ok(())
    } else {
        Err(ApiError::Validation("invalid email address".to_string()))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user", post(register_user))
        .route("/user/:user_id", patch(update_user))
        .route("/auth/token", post(issue_token))
        .route("/auth/refresh_token", post(refresh_token))
}

/// The user as the API exposes it. The password hash stays server-side.
#[derive(Debug, Serialize)]
struct UserView {
    id: i64,
    username: String,
    email: String,
    native_language: Language,
    created: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        UserView {
            id: user.id,
            username: user.username,
            email: user.email,
            native_language: user.native_language,
            created: user.created,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateUser {
    username: String,
    email: String,
    password: String,
    native_language: Language,
}

async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUser>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    validate_email(&payload.email)?;

    let mut tx = state.db.begin().await?;
    if user::get_by_email(&mut tx, &payload.email).await?.is_some() {
        return Err(ApiError::Conflict("email already registered".to_string()));
    }
    let password_hash = auth::hash_password(&payload.password)?;
    let registered = user::create(
        &mut tx,
        &payload.username,
        &payload.email,
        &password_hash,
        payload.native_language,
    )
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(registered.into())))
}

#[derive(Debug, Deserialize)]
struct UpdateUser {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    native_language: Option<Language>,
}

async fn update_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(user_id): Path<i64>,
    Json(payload): Json<UpdateUser>,
) -> Result<Json<UserView>, ApiError> {
    if caller.id != user_id {
        return Err(ApiError::Unauthorized(
            "cannot update another user".to_string(),
        ));
    }

    let mut tx = state.db.begin().await?;
    if let Some(email) = &payload.email {
        validate_email(email)?;
        if let Some(existing) = user::get_by_email(&mut tx, email).await? {
            if existing.id != user_id {
                return Err(ApiError::Conflict("email already registered".to_string()));
            }
        }
    }
    let password_hash = payload
        .password
        .as_deref()
        .map(auth::hash_password)
        .transpose()?;

    let updated = user::update(
        &mut tx,
        user_id,
        UserUpdate {
            username: payload.username,
            email: payload.email,
            password_hash,
            native_language: payload.native_language,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;
    tx.commit().await?;

    Ok(Json(updated.into()))
}

/// OAuth2 password flow: the form's `username` field carries the email.
#[derive(Debug, Deserialize)]
struct TokenForm {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
}

impl TokenResponse {
    fn bearer(access_token: String) -> Self {
        TokenResponse {
            access_token,
            token_type: "bearer",
        }
    }
}

async fn issue_token(
    State(state): State<AppState>,
    Form(form): Form<TokenForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut conn = state.db.pool().acquire().await?;
    let known = user::get_by_email(&mut conn, &form.username)
        .await?
        .filter(|candidate| auth::verify_password(&form.password, &candidate.password_hash))
        .ok_or_else(|| ApiError::Unauthorized("incorrect email or password".to_string()))?;

    let token = auth::create_access_token(
        &known.email,
        &state.config.secret_key,
        state.config.access_token_expire_minutes,
    )?;
    Ok(Json(TokenResponse::bearer(token)))
}

async fn refresh_token(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = auth::create_access_token(
        &caller.email,
        &state.config.secret_key,
        state.config.access_token_expire_minutes,
    )?;
    Ok(Json(TokenResponse::bearer(token)))
}
