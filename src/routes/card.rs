//! `/card/set` and `/card`: the caller's flashcards.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::language::Language;
use crate::models::card::{self, Card, CardSet, CardSetUpdate};
use crate::models::term;
use crate::routes::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/card/set", get(list_sets).post(create_set))
        .route(
            "/card/set/:cardset_id",
            get(get_set).patch(update_set).delete(delete_set),
        )
        .route("/card", get(list_cards).post(create_card))
        .route(
            "/card/:card_id",
            get(get_card).patch(update_card).delete(delete_card),
        )
}

#[derive(Debug, Deserialize)]
struct CreateCardSet {
    name: String,
    description: Option<String>,
    language: Option<Language>,
}

async fn create_set(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateCardSet>,
) -> Result<(StatusCode, Json<CardSet>), ApiError> {
    let mut tx = state.db.begin().await?;
    let set = card::create_set(
        &mut tx,
        user.id,
        &payload.name,
        payload.description.as_deref(),
        payload.language,
    )
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(set)))
}

#[derive(Debug, Deserialize)]
struct CardSetQuery {
    name: Option<String>,
}

async fn list_sets(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<CardSetQuery>,
) -> Result<Json<Vec<CardSet>>, ApiError> {
    let mut conn = state.db.pool().acquire().await?;
    let sets = card::list_sets(&mut conn, user.id, query.name.as_deref()).await?;
    Ok(Json(sets))
}

async fn get_set(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cardset_id): Path<i64>,
) -> Result<Json<CardSet>, ApiError> {
    let mut conn = state.db.pool().acquire().await?;
    let set = card::get_set(&mut conn, cardset_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("card set not found".to_string()))?;
    Ok(Json(set))
}

#[derive(Debug, Deserialize)]
struct UpdateCardSet {
    name: Option<String>,
    description: Option<String>,
    language: Option<Language>,
}

async fn update_set(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cardset_id): Path<i64>,
    Json(payload): Json<UpdateCardSet>,
) -> Result<Json<CardSet>, ApiError> {
    let mut tx = state.db.begin().await?;
    let set = card::update_set(
        &mut tx,
        cardset_id,
        user.id,
        CardSetUpdate {
            name: payload.name,
            description: payload.description,
            language: payload.language,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("card set not found".to_string()))?;
    tx.commit().await?;

    Ok(Json(set))
}

async fn delete_set(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cardset_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let mut tx = state.db.begin().await?;
    let deleted = card::delete_set(&mut tx, cardset_id, user.id).await?;
    tx.commit().await?;

    if deleted == 0 {
        return Err(ApiError::NotFound("card set not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct CreateCard {
    cardset_id: i64,
    term: String,
    origin_language: Language,
    note: Option<String>,
}

async fn create_card(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateCard>,
) -> Result<(StatusCode, Json<Card>), ApiError> {
    let mut tx = state.db.begin().await?;
    let set = card::get_set(&mut tx, payload.cardset_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("card set not found".to_string()))?;
    // Inflected spellings resolve to the base term; the card stores the
    // canonical text.
    let resolved = term::resolve(&mut tx, &payload.term, payload.origin_language)
        .await?
        .ok_or_else(|| ApiError::NotFound("term not found".to_string()))?;

    let note = match (payload.note, set.language) {
        (Some(note), _) => Some(note),
        (None, Some(set_language)) => {
            let meanings = term::meanings(
                &mut tx,
                &resolved.term,
                resolved.origin_language,
                set_language,
            )
            .await?;
            (!meanings.is_empty()).then(|| meanings.join(", "))
        }
        (None, None) => None,
    };

    let new_card = card::create_card(
        &mut tx,
        set.id,
        &resolved.term,
        resolved.origin_language,
        note,
    )
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(new_card)))
}

#[derive(Debug, Deserialize)]
struct CardQuery {
    cardset_id: i64,
    term: Option<String>,
    note: Option<String>,
}

async fn list_cards(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<CardQuery>,
) -> Result<Json<Vec<Card>>, ApiError> {
    let mut conn = state.db.pool().acquire().await?;
    card::get_set(&mut conn, query.cardset_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("card set not found".to_string()))?;
    let cards = card::list_cards(
        &mut conn,
        query.cardset_id,
        query.term.as_deref(),
        query.note.as_deref(),
    )
    .await?;
    Ok(Json(cards))
}

async fn get_card(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(card_id): Path<i64>,
) -> Result<Json<Card>, ApiError> {
    let mut conn = state.db.pool().acquire().await?;
    let found = card::get_card(&mut conn, card_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("card not found".to_string()))?;
    Ok(Json(found))
}

#[derive(Debug, Deserialize)]
struct UpdateCard {
    note: Option<String>,
}

async fn update_card(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(card_id): Path<i64>,
    Json(payload): Json<UpdateCard>,
) -> Result<Json<Card>, ApiError> {
    let mut tx = state.db.begin().await?;
    let updated = card::update_card(&mut tx, card_id, user.id, payload.note)
        .await?
        .ok_or_else(|| ApiError::NotFound("card not found".to_string()))?;
    tx.commit().await?;

    Ok(Json(updated))
}

async fn delete_card(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(card_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let mut tx = state.db.begin().await?;
    let deleted = card::delete_card(&mut tx, card_id, user.id).await?;
    tx.commit().await?;

    if deleted == 0 {
        return Err(ApiError::NotFound("card not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
