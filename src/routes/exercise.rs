//! `/term/exercise`: random practice selections and the attempt history.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::language::Language;
use crate::models::card;
use crate::models::exercise::{self, Exercise, ExerciseAttempt, ExerciseFilter, ExerciseType};
use crate::routes::AppState;

const DEFAULT_AMOUNT: i64 = 10;
const MAX_AMOUNT: i64 = 256;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/term/exercise", get(list_exercises))
        .route(
            "/term/exercise/history",
            get(list_history).post(record_attempt),
        )
}

#[derive(Debug, Deserialize)]
struct ExerciseQuery {
    #[serde(rename = "type")]
    kind: ExerciseType,
    language: Language,
    translation_language: Option<Language>,
    cardset_id: Option<i64>,
    amount: Option<i64>,
}

async fn list_exercises(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ExerciseQuery>,
) -> Result<Json<Vec<Exercise>>, ApiError> {
    let mut conn = state.db.pool().acquire().await?;
    if let Some(cardset_id) = query.cardset_id {
        card::get_set(&mut conn, cardset_id, user.id)
            .await?
            .ok_or_else(|| ApiError::NotFound("card set not found".to_string()))?;
    }

    let exercises = exercise::list_random(
        &mut conn,
        &ExerciseFilter {
            kind: query.kind,
            language: query.language,
            translation_language: query.translation_language,
            cardset_id: query.cardset_id,
            amount: query.amount.unwrap_or(DEFAULT_AMOUNT).clamp(1, MAX_AMOUNT),
        },
    )
    .await?;
    Ok(Json(exercises))
}

#[derive(Debug, Deserialize)]
struct CreateAttempt {
    exercise_id: i64,
    correct: bool,
    text_request: Option<String>,
    text_response: Option<String>,
}

async fn record_attempt(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateAttempt>,
) -> Result<(StatusCode, Json<ExerciseAttempt>), ApiError> {
    let mut tx = state.db.begin().await?;
    exercise::get(&mut tx, payload.exercise_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("exercise not found".to_string()))?;
    let attempt = exercise::record_attempt(
        &mut tx,
        user.id,
        payload.exercise_id,
        payload.correct,
        payload.text_request,
        payload.text_response,
    )
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(attempt)))
}

async fn list_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ExerciseAttempt>>, ApiError> {
    let mut conn = state.db.pool().acquire().await?;
    let attempts = exercise::list_attempts(&mut conn, user.id).await?;
    Ok(Json(attempts))
}
