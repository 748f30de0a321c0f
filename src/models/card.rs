//! Flashcard sets and their cards. Every query is scoped to the owning
//! user; a set or card of someone else behaves as if it does not exist.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::info;

use crate::language::Language;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CardSet {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Card {
    pub id: i64,
    pub cardset_id: i64,
    pub term: String,
    pub origin_language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct CardSetUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub language: Option<Language>,
}

const CARD_SET_COLUMNS: &str = "id, name, description, language, user_id, created_at, updated_at";
const CARD_COLUMNS: &str = "id, cardset_id, term, origin_language, note, created_at, updated_at";

// ==================== Card sets ====================

pub async fn create_set(
    conn: &mut SqliteConnection,
    user_id: i64,
    name: &str,
    description: Option<&str>,
    language: Option<Language>,
) -> Result<CardSet, sqlx::Error> {
    let set = sqlx::query_as::<_, CardSet>(&format!(
        "INSERT INTO card_sets (name, description, language, user_id, created_at) \
         VALUES (?, ?, ?, ?, ?) RETURNING {}",
        CARD_SET_COLUMNS
    ))
    .bind(name)
    .bind(description)
    .bind(language)
    .bind(user_id)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    info!("created card set {} '{}' for user {}", set.id, set.name, user_id);
    Ok(set)
}

pub async fn get_set(
    conn: &mut SqliteConnection,
    id: i64,
    user_id: i64,
) -> Result<Option<CardSet>, sqlx::Error> {
    sqlx::query_as::<_, CardSet>(&format!(
        "SELECT {} FROM card_sets WHERE id = ? AND user_id = ?",
        CARD_SET_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn list_sets(
    conn: &mut SqliteConnection,
    user_id: i64,
    name: Option<&str>,
) -> Result<Vec<CardSet>, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM card_sets WHERE user_id = ",
        CARD_SET_COLUMNS
    ));
    query.push_bind(user_id);
    if let Some(name) = name {
        query.push(" AND name LIKE '%' || ");
        query.push_bind(name);
        query.push(" || '%'");
    }
    query.push(" ORDER BY id");

    query.build_query_as::<CardSet>().fetch_all(&mut *conn).await
}

pub async fn update_set(
    conn: &mut SqliteConnection,
    id: i64,
    user_id: i64,
    changes: CardSetUpdate,
) -> Result<Option<CardSet>, sqlx::Error> {
    sqlx::query_as::<_, CardSet>(&format!(
        "UPDATE card_sets SET \
            name = COALESCE(?, name), \
            description = COALESCE(?, description), \
            language = COALESCE(?, language), \
            updated_at = ? \
         WHERE id = ? AND user_id = ? RETURNING {}",
        CARD_SET_COLUMNS
    ))
    .bind(changes.name)
    .bind(changes.description)
    .bind(changes.language)
    .bind(Utc::now())
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Deletes the set and, through the foreign key cascade, its cards.
pub async fn delete_set(
    conn: &mut SqliteConnection,
    id: i64,
    user_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM card_sets WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

// ==================== Cards ====================

pub async fn create_card(
    conn: &mut SqliteConnection,
    cardset_id: i64,
    term: &str,
    origin_language: Language,
    note: Option<String>,
) -> Result<Card, sqlx::Error> {
    sqlx::query_as::<_, Card>(&format!(
        "INSERT INTO cards (cardset_id, term, origin_language, note, created_at) \
         VALUES (?, ?, ?, ?, ?) RETURNING {}",
        CARD_COLUMNS
    ))
    .bind(cardset_id)
    .bind(term)
    .bind(origin_language)
    .bind(note)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
}

pub async fn get_card(
    conn: &mut SqliteConnection,
    id: i64,
    user_id: i64,
) -> Result<Option<Card>, sqlx::Error> {
    sqlx::query_as::<_, Card>(&format!(
        "SELECT {} FROM cards WHERE id = ? \
         AND cardset_id IN (SELECT id FROM card_sets WHERE user_id = ?)",
        CARD_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn list_cards(
    conn: &mut SqliteConnection,
    cardset_id: i64,
    term: Option<&str>,
    note: Option<&str>,
) -> Result<Vec<Card>, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM cards WHERE cardset_id = ",
        CARD_COLUMNS
    ));
    query.push_bind(cardset_id);
    if let Some(term) = term {
        query.push(" AND term LIKE '%' || ");
        query.push_bind(term);
        query.push(" || '%'");
    }
    if let Some(note) = note {
        query.push(" AND note LIKE '%' || ");
        query.push_bind(note);
        query.push(" || '%'");
    }
    query.push(" ORDER BY id");

    query.build_query_as::<Card>().fetch_all(&mut *conn).await
}

pub async fn update_card(
    conn: &mut SqliteConnection,
    id: i64,
    user_id: i64,
    note: Option<String>,
) -> Result<Option<Card>, sqlx::Error> {
    sqlx::query_as::<_, Card>(&format!(
        "UPDATE cards SET note = COALESCE(?, note), updated_at = ? \
         WHERE id = ? \
         AND cardset_id IN (SELECT id FROM card_sets WHERE user_id = ?) \
         RETURNING {}",
        CARD_COLUMNS
    ))
    .bind(note)
    .bind(Utc::now())
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn delete_card(
    conn: &mut SqliteConnection,
    id: i64,
    user_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM cards WHERE id = ? \
         AND cardset_id IN (SELECT id FROM card_sets WHERE user_id = ?)",
    )
    .bind(id)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}
