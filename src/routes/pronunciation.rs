//! `/term/pronunciation`: phonetic entries, audio and their single link.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::{Deserialize, Deserializer};

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::language::Language;
use crate::models::pronunciation::{self, NewPronunciation, Pronunciation, PronunciationUpdate};
use crate::models::{exercise, LinkTarget};
use crate::routes::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/term/pronunciation",
            get(list_pronunciations).post(create_pronunciation),
        )
        .route(
            "/term/pronunciation/:pronunciation_id",
            patch(update_pronunciation),
        )
}

#[derive(Debug, Deserialize)]
struct CreatePronunciation {
    language: Language,
    phonetic: String,
    text: String,
    audio_file: Option<String>,
    description: Option<String>,
    #[serde(flatten)]
    target: LinkTarget,
}

async fn create_pronunciation(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(payload): Json<CreatePronunciation>,
) -> Result<(StatusCode, Json<Pronunciation>), ApiError> {
    let mut tx = state.db.begin().await?;
    let target = payload.target.resolve_for_pronunciation(&mut tx).await?;

    let spoken = pronunciation::create(
        &mut tx,
        NewPronunciation {
            language: payload.language,
            phonetic: payload.phonetic,
            text: payload.text,
            audio_file: payload.audio_file,
            description: payload.description,
        },
    )
    .await?;
    let link = pronunciation::create_link(&mut tx, spoken.id, &target).await?;
    exercise::on_pronunciation_linked(&mut tx, &spoken, &link).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(spoken)))
}

#[derive(Debug, Deserialize)]
struct PronunciationQuery {
    term: Option<String>,
    origin_language: Option<Language>,
    term_example_id: Option<i64>,
    term_lexical_id: Option<i64>,
}

async fn list_pronunciations(
    State(state): State<AppState>,
    Query(query): Query<PronunciationQuery>,
) -> Result<Json<Vec<Pronunciation>>, ApiError> {
    let mut conn = state.db.pool().acquire().await?;
    let target = LinkTarget {
        term: query.term,
        origin_language: query.origin_language,
        term_example_id: query.term_example_id,
        term_lexical_id: query.term_lexical_id,
        ..LinkTarget::default()
    }
    .resolve_for_pronunciation(&mut conn)
    .await?;

    let entries = pronunciation::list_for_target(&mut conn, &target).await?;
    Ok(Json(entries))
}

/// `audio_file` distinguishes a missing key (keep) from an explicit
/// `null` (clear the audio, retracting the listen exercises).
#[derive(Debug, Deserialize)]
struct UpdatePronunciation {
    #[serde(default, deserialize_with = "double_option")]
    audio_file: Option<Option<String>>,
    description: Option<String>,
    phonetic: Option<String>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

async fn update_pronunciation(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(pronunciation_id): Path<i64>,
    Json(payload): Json<UpdatePronunciation>,
) -> Result<Json<Pronunciation>, ApiError> {
    let audio_changed = payload.audio_file.is_some();

    let mut tx = state.db.begin().await?;
    let updated = pronunciation::update(
        &mut tx,
        pronunciation_id,
        PronunciationUpdate {
            audio_file: payload.audio_file,
            description: payload.description,
            phonetic: payload.phonetic,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("pronunciation not found".to_string()))?;
    if audio_changed {
        exercise::on_pronunciation_updated(&mut tx, &updated).await?;
    }
    tx.commit().await?;

    Ok(Json(updated))
}
