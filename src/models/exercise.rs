//! Derived exercises and the rules that keep them in sync with the
//! linguistic data.
//!
//! Rules are explicit functions that the write handlers call inside the
//! open transaction right after the triggering insert or update; there is
//! no hook dispatch. Every rule is idempotent: [`get_or_create`] keys the
//! exercise on its full attribute tuple, so replaying a rule never
//! duplicates a row. The one destructive rule is
//! [`on_pronunciation_updated`], which drops listen exercises once their
//! pronunciation loses its audio.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::info;

use crate::language::{Language, TermLexicalType};
use crate::models::example::TermExample;
use crate::models::pronunciation::{Pronunciation, PronunciationLink};
use crate::models::{definition::TermDefinition, example, lexical};

/// Antonyms a term needs before multiple-choice exercises make sense.
const MIN_ANTONYMS_FOR_MCHOICE: i64 = 3;

/// The practicable exercise kinds. `Random` is query-only: listings accept
/// it to mean "any type"; no stored row ever carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum ExerciseType {
    OrderSentence,
    ListenTerm,
    ListenTermMchoice,
    ListenSentence,
    SpeakTerm,
    SpeakSentence,
    MchoiceTerm,
    MchoiceTermTranslation,
    Random,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Exercise {
    pub id: i64,
    pub language: Language,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: ExerciseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_language: Option<Language>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_language: Option<Language>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_example_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pronunciation_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_lexical_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_definition_id: Option<i64>,
}

/// One recorded attempt at an exercise.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ExerciseAttempt {
    pub id: i64,
    pub exercise_id: i64,
    pub user_id: i64,
    pub created: DateTime<Utc>,
    pub correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_response: Option<String>,
}

/// Filters of an exercise listing.
#[derive(Debug, Clone)]
pub struct ExerciseFilter {
    pub kind: ExerciseType,
    pub language: Language,
    pub translation_language: Option<Language>,
    pub cardset_id: Option<i64>,
    pub amount: i64,
}

/// The full attribute tuple identifying one derived exercise.
#[derive(Debug, Clone)]
struct NewExercise {
    language: Language,
    kind: ExerciseType,
    translation_language: Option<Language>,
    term: Option<String>,
    origin_language: Option<Language>,
    term_example_id: Option<i64>,
    pronunciation_id: Option<i64>,
    term_lexical_id: Option<i64>,
    term_definition_id: Option<i64>,
}

impl NewExercise {
    fn new(kind: ExerciseType, language: Language) -> Self {
        NewExercise {
            language,
            kind,
            translation_language: None,
            term: None,
            origin_language: None,
            term_example_id: None,
            pronunciation_id: None,
            term_lexical_id: None,
            term_definition_id: None,
        }
    }
}

const EXERCISE_COLUMNS: &str = "id, language, type, translation_language, term, \
     origin_language, term_example_id, pronunciation_id, term_lexical_id, term_definition_id";

async fn get_or_create(
    conn: &mut SqliteConnection,
    new: NewExercise,
) -> Result<(Exercise, bool), sqlx::Error> {
    // IS instead of = so the NULL attributes take part in the key.
    let existing = sqlx::query_as::<_, Exercise>(
        "SELECT id, language, type, translation_language, term, origin_language, \
                term_example_id, pronunciation_id, term_lexical_id, term_definition_id \
         FROM exercises \
         WHERE language = ? AND type = ? \
           AND translation_language IS ? \
           AND term IS ? AND origin_language IS ? \
           AND term_example_id IS ? AND pronunciation_id IS ? \
           AND term_lexical_id IS ? AND term_definition_id IS ?",
    )
    .bind(new.language)
    .bind(new.kind)
    .bind(new.translation_language)
    .bind(new.term.as_deref())
    .bind(new.origin_language)
    .bind(new.term_example_id)
    .bind(new.pronunciation_id)
    .bind(new.term_lexical_id)
    .bind(new.term_definition_id)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(existing) = existing {
        return Ok((existing, false));
    }

    let row = sqlx::query_as::<_, Exercise>(
        "INSERT INTO exercises \
            (language, type, translation_language, term, origin_language, \
             term_example_id, pronunciation_id, term_lexical_id, term_definition_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
         RETURNING id, language, type, translation_language, term, origin_language, \
                   term_example_id, pronunciation_id, term_lexical_id, term_definition_id",
    )
    .bind(new.language)
    .bind(new.kind)
    .bind(new.translation_language)
    .bind(new.term.as_deref())
    .bind(new.origin_language)
    .bind(new.term_example_id)
    .bind(new.pronunciation_id)
    .bind(new.term_lexical_id)
    .bind(new.term_definition_id)
    .fetch_one(&mut *conn)
    .await?;

    info!("derived {:?} exercise {}", row.kind, row.id);
    Ok((row, true))
}

// ==================== Derivation rules ====================

/// A new term is practicable by speaking it aloud.
pub async fn on_term_created(
    conn: &mut SqliteConnection,
    term: &str,
    origin_language: Language,
) -> Result<(), sqlx::Error> {
    get_or_create(
        conn,
        NewExercise {
            term: Some(term.to_string()),
            origin_language: Some(origin_language),
            ..NewExercise::new(ExerciseType::SpeakTerm, origin_language)
        },
    )
    .await?;
    Ok(())
}

/// A new example sentence is practicable by speaking it aloud.
pub async fn on_example_created(
    conn: &mut SqliteConnection,
    example: &TermExample,
) -> Result<(), sqlx::Error> {
    get_or_create(
        conn,
        NewExercise {
            term_example_id: Some(example.id),
            ..NewExercise::new(ExerciseType::SpeakSentence, example.language)
        },
    )
    .await?;
    Ok(())
}

/// Ordering the shuffled sentence needs the translation as the prompt, so
/// the rule fires when the translation is inserted, not the example.
pub async fn on_example_translated(
    conn: &mut SqliteConnection,
    example: &TermExample,
    translation_language: Language,
) -> Result<(), sqlx::Error> {
    get_or_create(
        conn,
        NewExercise {
            translation_language: Some(translation_language),
            term_example_id: Some(example.id),
            ..NewExercise::new(ExerciseType::OrderSentence, example.language)
        },
    )
    .await?;
    Ok(())
}

/// A pronunciation link whose pronunciation carries audio yields a listen
/// exercise keyed by whatever the link points at. Without audio there is
/// nothing to listen to and the rule produces nothing.
pub async fn on_pronunciation_linked(
    conn: &mut SqliteConnection,
    pronunciation: &Pronunciation,
    link: &PronunciationLink,
) -> Result<(), sqlx::Error> {
    if pronunciation.audio_file.is_none() {
        return Ok(());
    }

    if let (Some(term), Some(origin_language)) = (&link.term, link.origin_language) {
        get_or_create(
            conn,
            NewExercise {
                term: Some(term.clone()),
                origin_language: Some(origin_language),
                pronunciation_id: Some(pronunciation.id),
                ..NewExercise::new(ExerciseType::ListenTerm, origin_language)
            },
        )
        .await?;
    } else if let Some(lexical_id) = link.term_lexical_id {
        let entry = lexical::get(&mut *conn, lexical_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        get_or_create(
            conn,
            NewExercise {
                term_lexical_id: Some(lexical_id),
                pronunciation_id: Some(pronunciation.id),
                ..NewExercise::new(ExerciseType::ListenTerm, entry.origin_language)
            },
        )
        .await?;
    } else if let Some(example_id) = link.term_example_id {
        let sentence = example::get(&mut *conn, example_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        get_or_create(
            conn,
            NewExercise {
                term_example_id: Some(example_id),
                pronunciation_id: Some(pronunciation.id),
                ..NewExercise::new(ExerciseType::ListenSentence, sentence.language)
            },
        )
        .await?;
    }
    Ok(())
}

/// Audio transitions: clearing the audio retracts the listen exercises,
/// (re)setting it replays the link rule.
pub async fn on_pronunciation_updated(
    conn: &mut SqliteConnection,
    pronunciation: &Pronunciation,
) -> Result<(), sqlx::Error> {
    if pronunciation.audio_file.is_none() {
        // Only listen exercises reference a pronunciation.
        let result = sqlx::query("DELETE FROM exercises WHERE pronunciation_id = ?")
            .bind(pronunciation.id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() > 0 {
            info!(
                "retracted {} listen exercise(s) of pronunciation {}",
                result.rows_affected(),
                pronunciation.id
            );
        }
        return Ok(());
    }

    if let Some(link) = crate::models::pronunciation::get_link(&mut *conn, pronunciation.id).await? {
        on_pronunciation_linked(conn, pronunciation, &link).await?;
    }
    Ok(())
}

/// With enough antonyms registered the term supports a multiple-choice
/// exercise using them as distractors.
pub async fn on_antonym_created(
    conn: &mut SqliteConnection,
    term: &str,
    origin_language: Language,
) -> Result<(), sqlx::Error> {
    let antonyms =
        lexical::count_by_kind(&mut *conn, term, origin_language, TermLexicalType::Antonym)
            .await?;
    if antonyms < MIN_ANTONYMS_FOR_MCHOICE {
        return Ok(());
    }

    get_or_create(
        conn,
        NewExercise {
            term: Some(term.to_string()),
            origin_language: Some(origin_language),
            ..NewExercise::new(ExerciseType::MchoiceTerm, origin_language)
        },
    )
    .await?;
    Ok(())
}

/// A translated definition of a term with enough antonyms supports the
/// translated multiple-choice variant.
pub async fn on_definition_translated(
    conn: &mut SqliteConnection,
    definition: &TermDefinition,
    translation_language: Language,
) -> Result<(), sqlx::Error> {
    let antonyms = lexical::count_by_kind(
        &mut *conn,
        &definition.term,
        definition.origin_language,
        TermLexicalType::Antonym,
    )
    .await?;
    if antonyms < MIN_ANTONYMS_FOR_MCHOICE {
        return Ok(());
    }

    get_or_create(
        conn,
        NewExercise {
            translation_language: Some(translation_language),
            term_definition_id: Some(definition.id),
            ..NewExercise::new(
                ExerciseType::MchoiceTermTranslation,
                definition.origin_language,
            )
        },
    )
    .await?;
    Ok(())
}

// ==================== Queries ====================

pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<Exercise>, sqlx::Error> {
    sqlx::query_as::<_, Exercise>(&format!(
        "SELECT {} FROM exercises WHERE id = ?",
        EXERCISE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

/// A random selection of up to `amount` exercises matching the filter.
/// `Random` as the kind matches any type; a card set restricts
/// term-bearing exercises to the terms collected in that set.
pub async fn list_random(
    conn: &mut SqliteConnection,
    filter: &ExerciseFilter,
) -> Result<Vec<Exercise>, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM exercises WHERE language = ",
        EXERCISE_COLUMNS
    ));
    query.push_bind(filter.language);
    if filter.kind != ExerciseType::Random {
        query.push(" AND type = ");
        query.push_bind(filter.kind);
    }
    if let Some(translation_language) = filter.translation_language {
        query.push(" AND translation_language = ");
        query.push_bind(translation_language);
    }
    if let Some(cardset_id) = filter.cardset_id {
        query.push(
            " AND term IS NOT NULL AND EXISTS (\
                SELECT 1 FROM cards \
                WHERE cards.cardset_id = ",
        );
        query.push_bind(cardset_id);
        query.push(
            " AND cards.term = exercises.term \
              AND cards.origin_language = exercises.origin_language)",
        );
    }
    query.push(" ORDER BY RANDOM() LIMIT ");
    query.push_bind(filter.amount);

    query
        .build_query_as::<Exercise>()
        .fetch_all(&mut *conn)
        .await
}

// ==================== History ====================

pub async fn record_attempt(
    conn: &mut SqliteConnection,
    user_id: i64,
    exercise_id: i64,
    correct: bool,
    text_request: Option<String>,
    text_response: Option<String>,
) -> Result<ExerciseAttempt, sqlx::Error> {
    sqlx::query_as::<_, ExerciseAttempt>(
        "INSERT INTO exercise_history \
            (exercise_id, user_id, created, correct, text_request, text_response) \
         VALUES (?, ?, ?, ?, ?, ?) \
         RETURNING id, exercise_id, user_id, created, correct, text_request, text_response",
    )
    .bind(exercise_id)
    .bind(user_id)
    .bind(Utc::now())
    .bind(correct)
    .bind(text_request)
    .bind(text_response)
    .fetch_one(&mut *conn)
    .await
}

/// The user's attempts, newest first.
pub async fn list_attempts(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<ExerciseAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExerciseAttempt>(
        "SELECT id, exercise_id, user_id, created, correct, text_request, text_response \
         FROM exercise_history WHERE user_id = ? \
         ORDER BY created DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
}
