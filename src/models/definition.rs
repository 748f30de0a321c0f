//! Definitions of a term and their per-language translations.
//!
//! A definition is considered a duplicate of another when it shares the
//! term, the part of speech and the normalized definition text, so
//! [`get_or_create`] compares normalized text instead of raw equality.

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::info;

use crate::language::{Language, Level, PartOfSpeech};
use crate::normalize::normalize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TermDefinition {
    pub id: i64,
    pub term: String,
    pub origin_language: Language,
    pub part_of_speech: PartOfSpeech,
    pub definition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_lexical_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TermDefinitionTranslation {
    pub language: Language,
    pub term_definition_id: i64,
    pub translation: String,
    pub meaning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct NewDefinition {
    pub term: String,
    pub origin_language: Language,
    pub part_of_speech: PartOfSpeech,
    pub definition: String,
    pub level: Option<Level>,
    pub term_lexical_id: Option<i64>,
    pub extra: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct NewDefinitionTranslation {
    pub term_definition_id: i64,
    pub language: Language,
    pub translation: String,
    pub meaning: String,
    pub extra: Option<serde_json::Value>,
}

/// Fields of a partial definition update. `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct DefinitionUpdate {
    pub definition: Option<String>,
    pub level: Option<Level>,
    pub part_of_speech: Option<PartOfSpeech>,
    pub extra: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
pub struct DefinitionTranslationUpdate {
    pub translation: Option<String>,
    pub meaning: Option<String>,
    pub extra: Option<serde_json::Value>,
}

const DEFINITION_COLUMNS: &str =
    "id, term, origin_language, part_of_speech, definition, level, term_lexical_id, extra";

/// Insert the definition unless an equivalent one already exists.
/// Returns the row plus whether it was inserted.
pub async fn get_or_create(
    conn: &mut SqliteConnection,
    new: NewDefinition,
) -> Result<(TermDefinition, bool), sqlx::Error> {
    let candidates = sqlx::query_as::<_, TermDefinition>(
        "SELECT id, term, origin_language, part_of_speech, definition, level, term_lexical_id, extra \
         FROM term_definitions \
         WHERE term = ? AND origin_language = ? AND part_of_speech = ?",
    )
    .bind(&new.term)
    .bind(new.origin_language)
    .bind(new.part_of_speech)
    .fetch_all(&mut *conn)
    .await?;

    let wanted = normalize(&new.definition);
    if let Some(existing) = candidates
        .into_iter()
        .find(|candidate| normalize(&candidate.definition) == wanted)
    {
        return Ok((existing, false));
    }

    let row = sqlx::query_as::<_, TermDefinition>(
        "INSERT INTO term_definitions \
            (term, origin_language, part_of_speech, definition, level, term_lexical_id, extra) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         RETURNING id, term, origin_language, part_of_speech, definition, level, term_lexical_id, extra",
    )
    .bind(&new.term)
    .bind(new.origin_language)
    .bind(new.part_of_speech)
    .bind(&new.definition)
    .bind(new.level)
    .bind(new.term_lexical_id)
    .bind(new.extra)
    .fetch_one(&mut *conn)
    .await?;

    info!("created definition {} for term '{}'", row.id, row.term);
    Ok((row, true))
}

pub async fn get(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<TermDefinition>, sqlx::Error> {
    sqlx::query_as::<_, TermDefinition>(
        "SELECT id, term, origin_language, part_of_speech, definition, level, term_lexical_id, extra \
         FROM term_definitions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    changes: DefinitionUpdate,
) -> Result<Option<TermDefinition>, sqlx::Error> {
    sqlx::query_as::<_, TermDefinition>(
        "UPDATE term_definitions SET \
            definition = COALESCE(?, definition), \
            level = COALESCE(?, level), \
            part_of_speech = COALESCE(?, part_of_speech), \
            extra = COALESCE(?, extra) \
         WHERE id = ? \
         RETURNING id, term, origin_language, part_of_speech, definition, level, term_lexical_id, extra",
    )
    .bind(changes.definition)
    .bind(changes.level)
    .bind(changes.part_of_speech)
    .bind(changes.extra)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn list(
    conn: &mut SqliteConnection,
    term: &str,
    origin_language: Language,
    part_of_speech: Option<PartOfSpeech>,
    level: Option<Level>,
) -> Result<Vec<TermDefinition>, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM term_definitions WHERE term = ",
        DEFINITION_COLUMNS
    ));
    query.push_bind(term);
    query.push(" AND origin_language = ");
    query.push_bind(origin_language);
    if let Some(part_of_speech) = part_of_speech {
        query.push(" AND part_of_speech = ");
        query.push_bind(part_of_speech);
    }
    if let Some(level) = level {
        query.push(" AND level = ");
        query.push_bind(level);
    }
    query.push(" ORDER BY id");

    query
        .build_query_as::<TermDefinition>()
        .fetch_all(&mut *conn)
        .await
}

/// Row shape of the definition/translation join used by
/// [`list_with_translation`].
#[derive(sqlx::FromRow)]
struct TranslatedDefinitionRow {
    id: i64,
    term: String,
    origin_language: Language,
    part_of_speech: PartOfSpeech,
    definition: String,
    level: Option<Level>,
    term_lexical_id: Option<i64>,
    extra: Option<serde_json::Value>,
    translation_language: Language,
    translation: String,
    meaning: String,
    translation_extra: Option<serde_json::Value>,
}

/// List definitions together with their translation into
/// `translation_language`; definitions lacking one are omitted.
pub async fn list_with_translation(
    conn: &mut SqliteConnection,
    term: &str,
    origin_language: Language,
    translation_language: Language,
    part_of_speech: Option<PartOfSpeech>,
    level: Option<Level>,
) -> Result<Vec<(TermDefinition, TermDefinitionTranslation)>, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT d.id, d.term, d.origin_language, d.part_of_speech, d.definition, \
                d.level, d.term_lexical_id, d.extra, \
                tr.language AS translation_language, tr.translation, tr.meaning, \
                tr.extra AS translation_extra \
         FROM term_definitions d \
         JOIN term_definition_translations tr ON tr.term_definition_id = d.id \
         WHERE d.term = ",
    );
    query.push_bind(term);
    query.push(" AND d.origin_language = ");
    query.push_bind(origin_language);
    query.push(" AND tr.language = ");
    query.push_bind(translation_language);
    if let Some(part_of_speech) = part_of_speech {
        query.push(" AND d.part_of_speech = ");
        query.push_bind(part_of_speech);
    }
    if let Some(level) = level {
        query.push(" AND d.level = ");
        query.push_bind(level);
    }
    query.push(" ORDER BY d.id");

    let rows = query
        .build_query_as::<TranslatedDefinitionRow>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            (
                TermDefinition {
                    id: row.id,
                    term: row.term,
                    origin_language: row.origin_language,
                    part_of_speech: row.part_of_speech,
                    definition: row.definition,
                    level: row.level,
                    term_lexical_id: row.term_lexical_id,
                    extra: row.extra,
                },
                TermDefinitionTranslation {
                    language: row.translation_language,
                    term_definition_id: row.id,
                    translation: row.translation,
                    meaning: row.meaning,
                    extra: row.translation_extra,
                },
            )
        })
        .collect())
}

pub async fn create_translation(
    conn: &mut SqliteConnection,
    new: NewDefinitionTranslation,
) -> Result<TermDefinitionTranslation, sqlx::Error> {
    let row = sqlx::query_as::<_, TermDefinitionTranslation>(
        "INSERT INTO term_definition_translations \
            (language, term_definition_id, translation, meaning, normalized_meaning, extra) \
         VALUES (?, ?, ?, ?, ?, ?) \
         RETURNING language, term_definition_id, translation, meaning, extra",
    )
    .bind(new.language)
    .bind(new.term_definition_id)
    .bind(&new.translation)
    .bind(&new.meaning)
    .bind(normalize(&new.meaning))
    .bind(new.extra)
    .fetch_one(&mut *conn)
    .await?;

    info!(
        "created {} translation of definition {}",
        row.language, row.term_definition_id
    );
    Ok(row)
}

pub async fn get_translation(
    conn: &mut SqliteConnection,
    term_definition_id: i64,
    language: Language,
) -> Result<Option<TermDefinitionTranslation>, sqlx::Error> {
    sqlx::query_as::<_, TermDefinitionTranslation>(
        "SELECT language, term_definition_id, translation, meaning, extra \
         FROM term_definition_translations \
         WHERE term_definition_id = ? AND language = ?",
    )
    .bind(term_definition_id)
    .bind(language)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn update_translation(
    conn: &mut SqliteConnection,
    term_definition_id: i64,
    language: Language,
    changes: DefinitionTranslationUpdate,
) -> Result<Option<TermDefinitionTranslation>, sqlx::Error> {
    // normalized_meaning follows meaning whenever it changes
    let normalized_meaning = changes.meaning.as_deref().map(normalize);

    sqlx::query_as::<_, TermDefinitionTranslation>(
        "UPDATE term_definition_translations SET \
            translation = COALESCE(?, translation), \
            meaning = COALESCE(?, meaning), \
            normalized_meaning = COALESCE(?, normalized_meaning), \
            extra = COALESCE(?, extra) \
         WHERE term_definition_id = ? AND language = ? \
         RETURNING language, term_definition_id, translation, meaning, extra",
    )
    .bind(changes.translation)
    .bind(changes.meaning)
    .bind(normalized_meaning)
    .bind(changes.extra)
    .bind(term_definition_id)
    .bind(language)
    .fetch_optional(&mut *conn)
    .await
}
