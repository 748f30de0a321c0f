//! `/term/example`: example sentences, links and translations.
//!
//! Submitted example and translation texts carry `*`-delimited highlight
//! markers; the handlers strip them, store the clean text and keep the
//! extracted spans on the link rows.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::types::Json as SqlJson;

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::highlight::{self, Span};
use crate::language::{Language, Level};
use crate::models::example::{self, LinkedExample, TermExample, TranslatedText};
use crate::models::{exercise, LinkTarget};
use crate::pagination::{Page, PageParams};
use crate::routes::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/term/example", get(list_examples).post(create_example))
        .route("/term/example/:example_id", patch(update_example))
        .route("/term/example/translation", post(create_translation))
        .route(
            "/term/example/translation/:example_id/:language",
            patch(update_translation),
        )
}

#[derive(Debug, Deserialize)]
struct CreateExample {
    language: Language,
    example: String,
    level: Option<Level>,
    #[serde(flatten)]
    target: LinkTarget,
}

async fn create_example(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(payload): Json<CreateExample>,
) -> Result<(StatusCode, Json<LinkedExample>), ApiError> {
    let (clean, spans) = highlight::extract(&payload.example)?;

    let mut tx = state.db.begin().await?;
    let target = payload.target.resolve_for_example(&mut tx).await?;

    let (sentence, created) =
        example::get_or_create(&mut tx, payload.language, &clean, payload.level).await?;
    if example::link_exists(&mut tx, sentence.id, &target, None).await? {
        return Err(ApiError::Conflict("example link already exists".to_string()));
    }
    example::create_link(&mut tx, sentence.id, &target, None, &spans).await?;
    if created {
        exercise::on_example_created(&mut tx, &sentence).await?;
    }
    tx.commit().await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(LinkedExample {
            id: sentence.id,
            language: sentence.language,
            example: sentence.example,
            level: sentence.level,
            highlight: SqlJson(spans),
        }),
    ))
}

// Target fields are spelled out instead of flattening `LinkTarget`:
// serde_urlencoded cannot drive numeric fields through a flattened struct.
#[derive(Debug, Deserialize)]
struct ExampleQuery {
    term: Option<String>,
    origin_language: Option<Language>,
    term_definition_id: Option<i64>,
    term_lexical_id: Option<i64>,
    translation_language: Option<Language>,
    level: Option<Level>,
}

/// A listed example together with the requested translation.
#[derive(Debug, Serialize)]
struct TranslatedExample {
    #[serde(flatten)]
    example: LinkedExample,
    translation: TranslatedText,
}

async fn list_examples(
    State(state): State<AppState>,
    Query(query): Query<ExampleQuery>,
    Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
    let mut conn = state.db.pool().acquire().await?;
    let target = LinkTarget {
        term: query.term,
        origin_language: query.origin_language,
        term_definition_id: query.term_definition_id,
        term_lexical_id: query.term_lexical_id,
        ..LinkTarget::default()
    }
    .resolve_for_example(&mut conn)
    .await?;

    match query.translation_language {
        None => {
            let total = example::count_linked(&mut conn, &target, query.level).await?;
            let items = example::list_linked(
                &mut conn,
                &target,
                query.level,
                params.limit(),
                params.offset(),
            )
            .await?;
            Ok(Json(Page::new(items, total, &params)).into_response())
        }
        Some(translation_language) => {
            let total = example::count_linked_translated(
                &mut conn,
                &target,
                translation_language,
                query.level,
            )
            .await?;
            let items = example::list_linked_translated(
                &mut conn,
                &target,
                translation_language,
                query.level,
                params.limit(),
                params.offset(),
            )
            .await?
            .into_iter()
            .map(|(sentence, translation)| TranslatedExample {
                example: sentence,
                translation,
            })
            .collect::<Vec<_>>();
            Ok(Json(Page::new(items, total, &params)).into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateExample {
    example: Option<String>,
    level: Option<Level>,
}

async fn update_example(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(example_id): Path<i64>,
    Json(payload): Json<UpdateExample>,
) -> Result<Json<TermExample>, ApiError> {
    let mut tx = state.db.begin().await?;
    let updated = match payload.example {
        Some(text) => {
            let (clean, spans) = highlight::extract(&text)?;
            let updated = example::update(&mut tx, example_id, Some(&clean), payload.level)
                .await?
                .ok_or_else(|| ApiError::NotFound("example not found".to_string()))?;
            // New text, new span positions on every original-text link.
            example::rewrite_highlight(&mut tx, example_id, None, &spans).await?;
            updated
        }
        None => example::update(&mut tx, example_id, None, payload.level)
            .await?
            .ok_or_else(|| ApiError::NotFound("example not found".to_string()))?,
    };
    tx.commit().await?;

    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
struct CreateExampleTranslation {
    term_example_id: i64,
    language: Language,
    translation: String,
    #[serde(flatten)]
    target: LinkTarget,
}

/// A stored translation plus the spans extracted from its text.
#[derive(Debug, Serialize)]
struct ExampleTranslationView {
    language: Language,
    term_example_id: i64,
    translation: String,
    highlight: Vec<Span>,
}

async fn create_translation(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(payload): Json<CreateExampleTranslation>,
) -> Result<(StatusCode, Json<ExampleTranslationView>), ApiError> {
    let (clean, spans) = highlight::extract(&payload.translation)?;

    let mut tx = state.db.begin().await?;
    let sentence = example::get(&mut tx, payload.term_example_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("example not found".to_string()))?;
    let target = payload.target.resolve_for_example(&mut tx).await?;

    if example::get_translation(&mut tx, sentence.id, payload.language)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "example translation already exists".to_string(),
        ));
    }
    let translation =
        example::create_translation(&mut tx, sentence.id, payload.language, &clean).await?;
    example::create_link(&mut tx, sentence.id, &target, Some(payload.language), &spans).await?;
    exercise::on_example_translated(&mut tx, &sentence, payload.language).await?;
    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(ExampleTranslationView {
            language: translation.language,
            term_example_id: translation.term_example_id,
            translation: translation.translation,
            highlight: spans,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct UpdateExampleTranslation {
    translation: String,
}

async fn update_translation(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path((example_id, language)): Path<(i64, Language)>,
    Json(payload): Json<UpdateExampleTranslation>,
) -> Result<Json<ExampleTranslationView>, ApiError> {
    let (clean, spans) = highlight::extract(&payload.translation)?;

    let mut tx = state.db.begin().await?;
    let updated = example::update_translation(&mut tx, example_id, language, &clean)
        .await?
        .ok_or_else(|| ApiError::NotFound("example translation not found".to_string()))?;
    example::rewrite_highlight(&mut tx, example_id, Some(language), &spans).await?;
    tx.commit().await?;

    Ok(Json(ExampleTranslationView {
        language: updated.language,
        term_example_id: updated.term_example_id,
        translation: updated.translation,
        highlight: spans,
    }))
}
