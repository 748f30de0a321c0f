//! Pronunciations: phonetic transcriptions with optional audio, each
//! linked to exactly one term, example or lexical entry.

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::info;

use crate::language::Language;
use crate::models::LinkTarget;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Pronunciation {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub language: Language,
    pub phonetic: String,
    pub text: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PronunciationLink {
    pub pronunciation_id: i64,
    pub term: Option<String>,
    pub origin_language: Option<Language>,
    pub term_example_id: Option<i64>,
    pub term_lexical_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewPronunciation {
    pub language: Language,
    pub phonetic: String,
    pub text: String,
    pub audio_file: Option<String>,
    pub description: Option<String>,
}

/// Fields of a partial pronunciation update. The nested option on
/// `audio_file` distinguishes "leave as is" (`None`) from "clear"
/// (`Some(None)`).
#[derive(Debug, Default)]
pub struct PronunciationUpdate {
    pub audio_file: Option<Option<String>>,
    pub description: Option<String>,
    pub phonetic: Option<String>,
}

pub async fn create(
    conn: &mut SqliteConnection,
    new: NewPronunciation,
) -> Result<Pronunciation, sqlx::Error> {
    let row = sqlx::query_as::<_, Pronunciation>(
        "INSERT INTO pronunciations (audio_file, description, language, phonetic, text) \
         VALUES (?, ?, ?, ?, ?) \
         RETURNING id, audio_file, description, language, phonetic, text",
    )
    .bind(new.audio_file)
    .bind(new.description)
    .bind(new.language)
    .bind(&new.phonetic)
    .bind(&new.text)
    .fetch_one(&mut *conn)
    .await?;

    info!("created pronunciation {} for '{}'", row.id, row.text);
    Ok(row)
}

pub async fn get(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Pronunciation>, sqlx::Error> {
    sqlx::query_as::<_, Pronunciation>(
        "SELECT id, audio_file, description, language, phonetic, text \
         FROM pronunciations WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    changes: PronunciationUpdate,
) -> Result<Option<Pronunciation>, sqlx::Error> {
    let set_audio = changes.audio_file.is_some();
    let audio_file = changes.audio_file.flatten();

    sqlx::query_as::<_, Pronunciation>(
        "UPDATE pronunciations SET \
            audio_file = CASE WHEN ? THEN ? ELSE audio_file END, \
            description = COALESCE(?, description), \
            phonetic = COALESCE(?, phonetic) \
         WHERE id = ? \
         RETURNING id, audio_file, description, language, phonetic, text",
    )
    .bind(set_audio)
    .bind(audio_file)
    .bind(changes.description)
    .bind(changes.phonetic)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn create_link(
    conn: &mut SqliteConnection,
    pronunciation_id: i64,
    target: &LinkTarget,
) -> Result<PronunciationLink, sqlx::Error> {
    sqlx::query_as::<_, PronunciationLink>(
        "INSERT INTO pronunciation_links \
            (pronunciation_id, term, origin_language, term_example_id, term_lexical_id) \
         VALUES (?, ?, ?, ?, ?) \
         RETURNING pronunciation_id, term, origin_language, term_example_id, term_lexical_id",
    )
    .bind(pronunciation_id)
    .bind(target.term.as_deref())
    .bind(target.origin_language)
    .bind(target.term_example_id)
    .bind(target.term_lexical_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn get_link(
    conn: &mut SqliteConnection,
    pronunciation_id: i64,
) -> Result<Option<PronunciationLink>, sqlx::Error> {
    sqlx::query_as::<_, PronunciationLink>(
        "SELECT pronunciation_id, term, origin_language, term_example_id, term_lexical_id \
         FROM pronunciation_links WHERE pronunciation_id = ?",
    )
    .bind(pronunciation_id)
    .fetch_optional(&mut *conn)
    .await
}

/// All pronunciations linked to the target.
pub async fn list_for_target(
    conn: &mut SqliteConnection,
    target: &LinkTarget,
) -> Result<Vec<Pronunciation>, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT p.id, p.audio_file, p.description, p.language, p.phonetic, p.text \
         FROM pronunciations p \
         JOIN pronunciation_links l ON l.pronunciation_id = p.id \
         WHERE l.term IS ",
    );
    query.push_bind(target.term.as_deref());
    query.push(" AND l.origin_language IS ");
    query.push_bind(target.origin_language);
    query.push(" AND l.term_example_id IS ");
    query.push_bind(target.term_example_id);
    query.push(" AND l.term_lexical_id IS ");
    query.push_bind(target.term_lexical_id);
    query.push(" ORDER BY p.id");

    query
        .build_query_as::<Pronunciation>()
        .fetch_all(&mut *conn)
        .await
}
