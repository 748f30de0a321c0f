//! `/term/definition`: sense definitions and their translations.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::language::{Language, Level, PartOfSpeech};
use crate::models::definition::{
    self, DefinitionTranslationUpdate, DefinitionUpdate, NewDefinition, NewDefinitionTranslation,
    TermDefinition, TermDefinitionTranslation,
};
use crate::models::{exercise, lexical, term};
use crate::routes::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/term/definition",
            get(list_definitions).post(create_definition),
        )
        .route("/term/definition/:definition_id", patch(update_definition))
        .route("/term/definition/translation", post(create_translation))
        .route(
            "/term/definition/translation/:definition_id/:language",
            patch(update_translation),
        )
}

#[derive(Debug, Deserialize)]
struct CreateDefinition {
    term: String,
    origin_language: Language,
    part_of_speech: PartOfSpeech,
    definition: String,
    level: Option<Level>,
    term_lexical_id: Option<i64>,
    extra: Option<serde_json::Value>,
}

async fn create_definition(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(payload): Json<CreateDefinition>,
) -> Result<(StatusCode, Json<TermDefinition>), ApiError> {
    let mut tx = state.db.begin().await?;
    let owner = term::get(&mut tx, &payload.term, payload.origin_language)
        .await?
        .ok_or_else(|| ApiError::NotFound("term not found".to_string()))?;
    if let Some(lexical_id) = payload.term_lexical_id {
        lexical::get(&mut tx, lexical_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("lexical entry not found".to_string()))?;
    }

    let (created_definition, created) = definition::get_or_create(
        &mut tx,
        NewDefinition {
            term: owner.term,
            origin_language: owner.origin_language,
            part_of_speech: payload.part_of_speech,
            definition: payload.definition,
            level: payload.level,
            term_lexical_id: payload.term_lexical_id,
            extra: payload.extra,
        },
    )
    .await?;
    tx.commit().await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(created_definition)))
}

#[derive(Debug, Deserialize)]
struct DefinitionQuery {
    term: String,
    origin_language: Language,
    part_of_speech: Option<PartOfSpeech>,
    level: Option<Level>,
    translation_language: Option<Language>,
}

/// A definition with the embedded translation the query asked for.
#[derive(Debug, Serialize)]
struct TranslatedDefinition {
    #[serde(flatten)]
    definition: TermDefinition,
    translation: TermDefinitionTranslation,
}

async fn list_definitions(
    State(state): State<AppState>,
    Query(query): Query<DefinitionQuery>,
) -> Result<axum::response::Response, ApiError> {
    use axum::response::IntoResponse;

    let mut conn = state.db.pool().acquire().await?;
    let owner = term::get(&mut conn, &query.term, query.origin_language)
        .await?
        .ok_or_else(|| ApiError::NotFound("term not found".to_string()))?;

    match query.translation_language {
        None => {
            let definitions = definition::list(
                &mut conn,
                &owner.term,
                owner.origin_language,
                query.part_of_speech,
                query.level,
            )
            .await?;
            Ok(Json(definitions).into_response())
        }
        Some(translation_language) => {
            let definitions = definition::list_with_translation(
                &mut conn,
                &owner.term,
                owner.origin_language,
                translation_language,
                query.part_of_speech,
                query.level,
            )
            .await?
            .into_iter()
            .map(|(definition, translation)| TranslatedDefinition {
                definition,
                translation,
            })
            .collect::<Vec<_>>();
            Ok(Json(definitions).into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateDefinition {
    definition: Option<String>,
    level: Option<Level>,
    part_of_speech: Option<PartOfSpeech>,
    extra: Option<serde_json::Value>,
}

async fn update_definition(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(definition_id): Path<i64>,
    Json(payload): Json<UpdateDefinition>,
) -> Result<Json<TermDefinition>, ApiError> {
    let mut tx = state.db.begin().await?;
    let updated = definition::update(
        &mut tx,
        definition_id,
        DefinitionUpdate {
            definition: payload.definition,
            level: payload.level,
            part_of_speech: payload.part_of_speech,
            extra: payload.extra,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("definition not found".to_string()))?;
    tx.commit().await?;

    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
struct CreateDefinitionTranslation {
    term_definition_id: i64,
    language: Language,
    translation: String,
    meaning: String,
    extra: Option<serde_json::Value>,
}

async fn create_translation(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(payload): Json<CreateDefinitionTranslation>,
) -> Result<(StatusCode, Json<TermDefinitionTranslation>), ApiError> {
    let mut tx = state.db.begin().await?;
    let owner = definition::get(&mut tx, payload.term_definition_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("definition not found".to_string()))?;
    if definition::get_translation(&mut tx, owner.id, payload.language)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "definition translation already exists".to_string(),
        ));
    }

    let translation = definition::create_translation(
        &mut tx,
        NewDefinitionTranslation {
            term_definition_id: owner.id,
            language: payload.language,
            translation: payload.translation,
            meaning: payload.meaning,
            extra: payload.extra,
        },
    )
    .await?;
    exercise::on_definition_translated(&mut tx, &owner, payload.language).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(translation)))
}

#[derive(Debug, Deserialize)]
struct UpdateDefinitionTranslation {
    translation: Option<String>,
    meaning: Option<String>,
    extra: Option<serde_json::Value>,
}

async fn update_translation(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path((definition_id, language)): Path<(i64, Language)>,
    Json(payload): Json<UpdateDefinitionTranslation>,
) -> Result<Json<TermDefinitionTranslation>, ApiError> {
    let mut tx = state.db.begin().await?;
    let updated = definition::update_translation(
        &mut tx,
        definition_id,
        language,
        DefinitionTranslationUpdate {
            translation: payload.translation,
            meaning: payload.meaning,
            extra: payload.extra,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("definition translation not found".to_string()))?;
    tx.commit().await?;

    Ok(Json(updated))
}
