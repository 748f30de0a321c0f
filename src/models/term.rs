//! Canonical terms, keyed by `(term, origin_language)`.
//!
//! Every lookup goes through [`crate::normalize`], so `"MÚSICA!?"` finds
//! the row stored as `"música"`. [`resolve`] additionally falls back to
//! registered FORM lexical values, mapping an inflected form to its base
//! term; card creation relies on that.

use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::info;

use crate::language::{Language, TermLexicalType};
use crate::normalize::normalize;

/// A term in a given language. The normalized text column stays inside
/// the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Term {
    pub term: String,
    pub origin_language: Language,
}

/// Look a term up by its normalized text.
pub async fn get(
    conn: &mut SqliteConnection,
    term: &str,
    origin_language: Language,
) -> Result<Option<Term>, sqlx::Error> {
    sqlx::query_as::<_, Term>(
        "SELECT term, origin_language FROM terms \
         WHERE origin_language = ? AND normalized_term = ?",
    )
    .bind(origin_language)
    .bind(normalize(term))
    .fetch_optional(&mut *conn)
    .await
}

/// Return the existing row matching the normalized text, or insert a new
/// one. The boolean reports whether a row was inserted.
pub async fn get_or_create(
    conn: &mut SqliteConnection,
    term: &str,
    origin_language: Language,
) -> Result<(Term, bool), sqlx::Error> {
    if let Some(existing) = get(&mut *conn, term, origin_language).await? {
        return Ok((existing, false));
    }

    let row = sqlx::query_as::<_, Term>(
        "INSERT INTO terms (term, origin_language, normalized_term) \
         VALUES (?, ?, ?) \
         RETURNING term, origin_language",
    )
    .bind(term)
    .bind(origin_language)
    .bind(normalize(term))
    .fetch_one(&mut *conn)
    .await?;

    info!("created term '{}' [{}]", row.term, row.origin_language);
    Ok((row, true))
}

/// Resolve free text to a canonical term, falling back to FORM lexical
/// values: `"músicas"` resolves to `"música"` when registered as a form.
pub async fn resolve(
    conn: &mut SqliteConnection,
    text: &str,
    origin_language: Language,
) -> Result<Option<Term>, sqlx::Error> {
    if let Some(found) = get(&mut *conn, text, origin_language).await? {
        return Ok(Some(found));
    }

    sqlx::query_as::<_, Term>(
        "SELECT t.term, t.origin_language \
         FROM term_lexicals l \
         JOIN terms t ON t.term = l.term AND t.origin_language = l.origin_language \
         WHERE l.origin_language = ? AND l.type = ? AND l.normalized_value = ? \
         LIMIT 1",
    )
    .bind(origin_language)
    .bind(TermLexicalType::Form)
    .bind(normalize(text))
    .fetch_optional(&mut *conn)
    .await
}

/// Substring search over normalized term text. The normalized form only
/// contains alphanumerics and spaces, so no LIKE escaping is needed.
pub async fn search(
    conn: &mut SqliteConnection,
    text: &str,
    origin_language: Language,
) -> Result<Vec<Term>, sqlx::Error> {
    sqlx::query_as::<_, Term>(
        "SELECT term, origin_language FROM terms \
         WHERE origin_language = ? AND normalized_term LIKE '%' || ? || '%' \
         ORDER BY term",
    )
    .bind(origin_language)
    .bind(normalize(text))
    .fetch_all(&mut *conn)
    .await
}

/// Terms owning a definition whose translation meaning in
/// `translation_language` contains the (normalized) text.
pub async fn search_by_meaning(
    conn: &mut SqliteConnection,
    text: &str,
    origin_language: Language,
    translation_language: Language,
) -> Result<Vec<Term>, sqlx::Error> {
    sqlx::query_as::<_, Term>(
        "SELECT DISTINCT d.term, d.origin_language \
         FROM term_definitions d \
         JOIN term_definition_translations tr ON tr.term_definition_id = d.id \
         WHERE d.origin_language = ? AND tr.language = ? \
           AND tr.normalized_meaning LIKE '%' || ? || '%' \
         ORDER BY d.term",
    )
    .bind(origin_language)
    .bind(translation_language)
    .bind(normalize(text))
    .fetch_all(&mut *conn)
    .await
}

/// The meanings of the term's definition translations in the given
/// language, in definition order. Used by the term view and for default
/// card notes.
pub async fn meanings(
    conn: &mut SqliteConnection,
    term: &str,
    origin_language: Language,
    translation_language: Language,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT tr.meaning \
         FROM term_definition_translations tr \
         JOIN term_definitions d ON d.id = tr.term_definition_id \
         WHERE d.term = ? AND d.origin_language = ? AND tr.language = ? \
         ORDER BY tr.term_definition_id",
    )
    .bind(term)
    .bind(origin_language)
    .bind(translation_language)
    .fetch_all(&mut *conn)
    .await
}
