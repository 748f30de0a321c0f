//! `/term` and `/term/lexical`: the reference vocabulary itself.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::language::{Language, TermLexicalType};
use crate::models::lexical::{self, TermLexical};
use crate::models::pronunciation::{self, Pronunciation};
use crate::models::term::{self, Term};
use crate::models::{exercise, LinkTarget};
use crate::routes::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/term", get(get_term).post(create_term))
        .route("/term/search", get(search_terms))
        .route("/term/search/meaning", get(search_terms_by_meaning))
        .route("/term/lexical", get(list_lexicals).post(create_lexical))
}

#[derive(Debug, Deserialize)]
struct CreateTerm {
    term: String,
    origin_language: Language,
}

#[derive(Debug, Deserialize)]
struct TermQuery {
    term: String,
    origin_language: Language,
    translation_language: Option<Language>,
    #[serde(default)]
    lexical: bool,
    #[serde(default)]
    pronunciation: bool,
}

/// The term plus whatever embeds the query asked for.
#[derive(Debug, Serialize)]
struct TermView {
    term: String,
    origin_language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    meanings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lexical: Option<Vec<TermLexical>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pronunciations: Option<Vec<Pronunciation>>,
}

async fn create_term(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(payload): Json<CreateTerm>,
) -> Result<(StatusCode, Json<Term>), ApiError> {
    let mut tx = state.db.begin().await?;
    let (created_term, created) =
        term::get_or_create(&mut tx, &payload.term, payload.origin_language).await?;
    if created {
        exercise::on_term_created(&mut tx, &created_term.term, created_term.origin_language)
            .await?;
    }
    tx.commit().await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(created_term)))
}

async fn get_term(
    State(state): State<AppState>,
    Query(query): Query<TermQuery>,
) -> Result<Json<TermView>, ApiError> {
    let mut conn = state.db.pool().acquire().await?;
    let found = term::get(&mut conn, &query.term, query.origin_language)
        .await?
        .ok_or_else(|| ApiError::NotFound("term not found".to_string()))?;

    let meanings = match query.translation_language {
        Some(translation_language) => Some(
            term::meanings(
                &mut conn,
                &found.term,
                found.origin_language,
                translation_language,
            )
            .await?,
        ),
        None => None,
    };
    let lexical = if query.lexical {
        Some(lexical::list(&mut conn, &found.term, found.origin_language, None).await?)
    } else {
        None
    };
    let pronunciations = if query.pronunciation {
        let target = LinkTarget {
            term: Some(found.term.clone()),
            origin_language: Some(found.origin_language),
            ..LinkTarget::default()
        };
        Some(pronunciation::list_for_target(&mut conn, &target).await?)
    } else {
        None
    };

    Ok(Json(TermView {
        term: found.term,
        origin_language: found.origin_language,
        meanings,
        lexical,
        pronunciations,
    }))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    text: String,
    origin_language: Language,
}

async fn search_terms(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Term>>, ApiError> {
    let mut conn = state.db.pool().acquire().await?;
    let terms = term::search(&mut conn, &query.text, query.origin_language).await?;
    Ok(Json(terms))
}

#[derive(Debug, Deserialize)]
struct MeaningSearchQuery {
    text: String,
    origin_language: Language,
    translation_language: Language,
}

async fn search_terms_by_meaning(
    State(state): State<AppState>,
    Query(query): Query<MeaningSearchQuery>,
) -> Result<Json<Vec<Term>>, ApiError> {
    let mut conn = state.db.pool().acquire().await?;
    let terms = term::search_by_meaning(
        &mut conn,
        &query.text,
        query.origin_language,
        query.translation_language,
    )
    .await?;
    Ok(Json(terms))
}

#[derive(Debug, Deserialize)]
struct CreateLexical {
    term: String,
    origin_language: Language,
    value: String,
    #[serde(rename = "type")]
    kind: TermLexicalType,
    extra: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LexicalQuery {
    term: String,
    origin_language: Language,
    #[serde(rename = "type")]
    kind: Option<TermLexicalType>,
}

async fn create_lexical(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(payload): Json<CreateLexical>,
) -> Result<(StatusCode, Json<TermLexical>), ApiError> {
    let mut tx = state.db.begin().await?;
    // The row references the canonical term text, not the spelling the
    // caller sent.
    let owner = term::get(&mut tx, &payload.term, payload.origin_language)
        .await?
        .ok_or_else(|| ApiError::NotFound("term not found".to_string()))?;
    let entry = lexical::create(
        &mut tx,
        &owner.term,
        owner.origin_language,
        &payload.value,
        payload.kind,
        payload.extra,
    )
    .await?;
    if payload.kind == TermLexicalType::Antonym {
        exercise::on_antonym_created(&mut tx, &owner.term, owner.origin_language).await?;
    }
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_lexicals(
    State(state): State<AppState>,
    Query(query): Query<LexicalQuery>,
) -> Result<Json<Vec<TermLexical>>, ApiError> {
    let mut conn = state.db.pool().acquire().await?;
    let owner = term::get(&mut conn, &query.term, query.origin_language)
        .await?
        .ok_or_else(|| ApiError::NotFound("term not found".to_string()))?;
    let entries = lexical::list(&mut conn, &owner.term, owner.origin_language, query.kind).await?;
    Ok(Json(entries))
}
