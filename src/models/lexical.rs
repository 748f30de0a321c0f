//! Lexical relations: synonyms, antonyms, inflected forms and idioms
//! attached to a term.

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::info;

use crate::language::{Language, TermLexicalType};
use crate::normalize::normalize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TermLexical {
    pub id: i64,
    pub term: String,
    pub origin_language: Language,
    pub value: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: TermLexicalType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

pub async fn create(
    conn: &mut SqliteConnection,
    term: &str,
    origin_language: Language,
    value: &str,
    kind: TermLexicalType,
    extra: Option<serde_json::Value>,
) -> Result<TermLexical, sqlx::Error> {
    let row = sqlx::query_as::<_, TermLexical>(
        "INSERT INTO term_lexicals (term, origin_language, value, normalized_value, type, extra) \
         VALUES (?, ?, ?, ?, ?, ?) \
         RETURNING id, term, origin_language, value, type, extra",
    )
    .bind(term)
    .bind(origin_language)
    .bind(value)
    .bind(normalize(value))
    .bind(kind)
    .bind(extra)
    .fetch_one(&mut *conn)
    .await?;

    info!(
        "created {:?} lexical '{}' for term '{}'",
        row.kind, row.value, row.term
    );
    Ok(row)
}

pub async fn get(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<TermLexical>, sqlx::Error> {
    sqlx::query_as::<_, TermLexical>(
        "SELECT id, term, origin_language, value, type, extra \
         FROM term_lexicals WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn list(
    conn: &mut SqliteConnection,
    term: &str,
    origin_language: Language,
    kind: Option<TermLexicalType>,
) -> Result<Vec<TermLexical>, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT id, term, origin_language, value, type, extra \
         FROM term_lexicals WHERE term = ",
    );
    query.push_bind(term);
    query.push(" AND origin_language = ");
    query.push_bind(origin_language);
    if let Some(kind) = kind {
        query.push(" AND type = ");
        query.push_bind(kind);
    }
    query.push(" ORDER BY id");

    query
        .build_query_as::<TermLexical>()
        .fetch_all(&mut *conn)
        .await
}

/// Number of lexical entries of a given kind attached to a term. The
/// antonym count drives the multiple-choice exercise rules.
pub async fn count_by_kind(
    conn: &mut SqliteConnection,
    term: &str,
    origin_language: Language,
    kind: TermLexicalType,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM term_lexicals \
         WHERE term = ? AND origin_language = ? AND type = ?",
    )
    .bind(term)
    .bind(origin_language)
    .bind(kind)
    .fetch_one(&mut *conn)
    .await
}
