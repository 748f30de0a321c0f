//! Example sentences, their translations, and the link rows that attach
//! an example to a term, a definition or a lexical entry.
//!
//! Example text is stored clean (highlight markers stripped); the link
//! row carries the extracted spans as a JSON array of `[start, end]`
//! character index pairs. A link with `translation_language` set carries
//! the spans of that translation's text instead.

use serde::Serialize;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::info;

use crate::highlight::Span;
use crate::language::{Language, Level};
use crate::models::LinkTarget;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TermExample {
    pub id: i64,
    pub language: Language,
    pub example: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TermExampleTranslation {
    pub language: Language,
    pub term_example_id: i64,
    pub translation: String,
}

/// An example joined with the highlight spans of one of its links.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LinkedExample {
    pub id: i64,
    pub language: Language,
    pub example: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    pub highlight: Json<Vec<Span>>,
}

/// A translation of a linked example, with the spans highlighted inside
/// the translated text.
#[derive(Debug, Clone, Serialize)]
pub struct TranslatedText {
    pub language: Language,
    pub translation: String,
    pub highlight: Vec<Span>,
}

pub async fn get(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<TermExample>, sqlx::Error> {
    sqlx::query_as::<_, TermExample>(
        "SELECT id, language, example, level FROM term_examples WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

/// Return the existing row for `(language, example)` or insert a new one.
/// The boolean reports whether a row was inserted.
pub async fn get_or_create(
    conn: &mut SqliteConnection,
    language: Language,
    example: &str,
    level: Option<Level>,
) -> Result<(TermExample, bool), sqlx::Error> {
    let existing = sqlx::query_as::<_, TermExample>(
        "SELECT id, language, example, level FROM term_examples \
         WHERE language = ? AND example = ?",
    )
    .bind(language)
    .bind(example)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(existing) = existing {
        return Ok((existing, false));
    }

    let row = sqlx::query_as::<_, TermExample>(
        "INSERT INTO term_examples (language, example, level) \
         VALUES (?, ?, ?) \
         RETURNING id, language, example, level",
    )
    .bind(language)
    .bind(example)
    .bind(level)
    .fetch_one(&mut *conn)
    .await?;

    info!("created example {} [{}]", row.id, row.language);
    Ok((row, true))
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    example: Option<&str>,
    level: Option<Level>,
) -> Result<Option<TermExample>, sqlx::Error> {
    sqlx::query_as::<_, TermExample>(
        "UPDATE term_examples SET \
            example = COALESCE(?, example), \
            level = COALESCE(?, level) \
         WHERE id = ? \
         RETURNING id, language, example, level",
    )
    .bind(example)
    .bind(level)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

/// Append the target-matching conditions for the given link-table alias.
/// `IS` instead of `=` so bound NULLs match NULL columns.
fn push_target<'a>(query: &mut QueryBuilder<'a, Sqlite>, alias: &str, target: &'a LinkTarget) {
    query.push(format!(" AND {}.term IS ", alias));
    query.push_bind(target.term.as_deref());
    query.push(format!(" AND {}.origin_language IS ", alias));
    query.push_bind(target.origin_language);
    query.push(format!(" AND {}.term_definition_id IS ", alias));
    query.push_bind(target.term_definition_id);
    query.push(format!(" AND {}.term_lexical_id IS ", alias));
    query.push_bind(target.term_lexical_id);
}

pub async fn link_exists(
    conn: &mut SqliteConnection,
    term_example_id: i64,
    target: &LinkTarget,
    translation_language: Option<Language>,
) -> Result<bool, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) FROM term_example_links l WHERE l.term_example_id = ",
    );
    query.push_bind(term_example_id);
    query.push(" AND l.translation_language IS ");
    query.push_bind(translation_language);
    push_target(&mut query, "l", target);

    let count: i64 = query.build_query_scalar().fetch_one(&mut *conn).await?;
    Ok(count > 0)
}

pub async fn create_link(
    conn: &mut SqliteConnection,
    term_example_id: i64,
    target: &LinkTarget,
    translation_language: Option<Language>,
    highlight: &[Span],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO term_example_links \
            (term_example_id, highlight, term, origin_language, \
             term_definition_id, term_lexical_id, translation_language) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(term_example_id)
    .bind(Json(highlight))
    .bind(target.term.as_deref())
    .bind(target.origin_language)
    .bind(target.term_definition_id)
    .bind(target.term_lexical_id)
    .bind(translation_language)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Replace the stored spans of the example's links: the original-text
/// links when `translation_language` is `None`, that translation's links
/// otherwise. Returns the number of rewritten rows.
pub async fn rewrite_highlight(
    conn: &mut SqliteConnection,
    term_example_id: i64,
    translation_language: Option<Language>,
    highlight: &[Span],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE term_example_links SET highlight = ? \
         WHERE term_example_id = ? AND translation_language IS ?",
    )
    .bind(Json(highlight))
    .bind(term_example_id)
    .bind(translation_language)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn count_linked(
    conn: &mut SqliteConnection,
    target: &LinkTarget,
    level: Option<Level>,
) -> Result<i64, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) FROM term_examples e \
         JOIN term_example_links l ON l.term_example_id = e.id \
         WHERE l.translation_language IS NULL",
    );
    push_target(&mut query, "l", target);
    if let Some(level) = level {
        query.push(" AND e.level = ");
        query.push_bind(level);
    }
    query.build_query_scalar().fetch_one(&mut *conn).await
}

/// Examples linked to the target, each with the link's highlight spans.
pub async fn list_linked(
    conn: &mut SqliteConnection,
    target: &LinkTarget,
    level: Option<Level>,
    limit: i64,
    offset: i64,
) -> Result<Vec<LinkedExample>, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT e.id, e.language, e.example, e.level, l.highlight \
         FROM term_examples e \
         JOIN term_example_links l ON l.term_example_id = e.id \
         WHERE l.translation_language IS NULL",
    );
    push_target(&mut query, "l", target);
    if let Some(level) = level {
        query.push(" AND e.level = ");
        query.push_bind(level);
    }
    query.push(" ORDER BY e.id LIMIT ");
    query.push_bind(limit);
    query.push(" OFFSET ");
    query.push_bind(offset);

    query
        .build_query_as::<LinkedExample>()
        .fetch_all(&mut *conn)
        .await
}

#[derive(sqlx::FromRow)]
struct TranslatedExampleRow {
    id: i64,
    language: Language,
    example: String,
    level: Option<Level>,
    highlight: Json<Vec<Span>>,
    translation_language: Language,
    translation: String,
    translation_highlight: Option<Json<Vec<Span>>>,
}

pub async fn count_linked_translated(
    conn: &mut SqliteConnection,
    target: &LinkTarget,
    translation_language: Language,
    level: Option<Level>,
) -> Result<i64, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) FROM term_examples e \
         JOIN term_example_links l ON l.term_example_id = e.id \
         JOIN term_example_translations tr ON tr.term_example_id = e.id AND tr.language = ",
    );
    query.push_bind(translation_language);
    query.push(" WHERE l.translation_language IS NULL");
    push_target(&mut query, "l", target);
    if let Some(level) = level {
        query.push(" AND e.level = ");
        query.push_bind(level);
    }
    query.build_query_scalar().fetch_one(&mut *conn).await
}

/// Like [`list_linked`], but each item carries its translation into
/// `translation_language`; examples lacking one are omitted. The
/// translation's own highlight comes from the link row created with the
/// translation and may be absent when a different target created it.
pub async fn list_linked_translated(
    conn: &mut SqliteConnection,
    target: &LinkTarget,
    translation_language: Language,
    level: Option<Level>,
    limit: i64,
    offset: i64,
) -> Result<Vec<(LinkedExample, TranslatedText)>, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT e.id, e.language, e.example, e.level, l.highlight, \
                tr.language AS translation_language, tr.translation, \
                lt.highlight AS translation_highlight \
         FROM term_examples e \
         JOIN term_example_links l ON l.term_example_id = e.id \
         JOIN term_example_translations tr ON tr.term_example_id = e.id AND tr.language = ",
    );
    query.push_bind(translation_language);
    query.push(
        " LEFT JOIN term_example_links lt \
           ON lt.term_example_id = e.id AND lt.translation_language = tr.language",
    );
    push_target(&mut query, "lt", target);
    query.push(" WHERE l.translation_language IS NULL");
    push_target(&mut query, "l", target);
    if let Some(level) = level {
        query.push(" AND e.level = ");
        query.push_bind(level);
    }
    query.push(" ORDER BY e.id LIMIT ");
    query.push_bind(limit);
    query.push(" OFFSET ");
    query.push_bind(offset);

    let rows = query
        .build_query_as::<TranslatedExampleRow>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            (
                LinkedExample {
                    id: row.id,
                    language: row.language,
                    example: row.example,
                    level: row.level,
                    highlight: row.highlight,
                },
                TranslatedText {
                    language: row.translation_language,
                    translation: row.translation,
                    highlight: row.translation_highlight.map(|h| h.0).unwrap_or_default(),
                },
            )
        })
        .collect())
}

pub async fn get_translation(
    conn: &mut SqliteConnection,
    term_example_id: i64,
    language: Language,
) -> Result<Option<TermExampleTranslation>, sqlx::Error> {
    sqlx::query_as::<_, TermExampleTranslation>(
        "SELECT language, term_example_id, translation \
         FROM term_example_translations \
         WHERE term_example_id = ? AND language = ?",
    )
    .bind(term_example_id)
    .bind(language)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn create_translation(
    conn: &mut SqliteConnection,
    term_example_id: i64,
    language: Language,
    translation: &str,
) -> Result<TermExampleTranslation, sqlx::Error> {
    let row = sqlx::query_as::<_, TermExampleTranslation>(
        "INSERT INTO term_example_translations (language, term_example_id, translation) \
         VALUES (?, ?, ?) \
         RETURNING language, term_example_id, translation",
    )
    .bind(language)
    .bind(term_example_id)
    .bind(translation)
    .fetch_one(&mut *conn)
    .await?;

    info!(
        "created {} translation of example {}",
        row.language, row.term_example_id
    );
    Ok(row)
}

pub async fn update_translation(
    conn: &mut SqliteConnection,
    term_example_id: i64,
    language: Language,
    translation: &str,
) -> Result<Option<TermExampleTranslation>, sqlx::Error> {
    sqlx::query_as::<_, TermExampleTranslation>(
        "UPDATE term_example_translations SET translation = ? \
         WHERE term_example_id = ? AND language = ? \
         RETURNING language, term_example_id, translation",
    )
    .bind(translation)
    .bind(term_example_id)
    .bind(language)
    .fetch_optional(&mut *conn)
    .await
}
