use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Everything is created up front; `IF NOT EXISTS` keeps restarts cheap.
/// Highlight columns hold JSON arrays of `[start, end]` character pairs.
/// The partial unique indexes on `term_example_links` enforce one link per
/// (target, example, translation language).
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    native_language TEXT NOT NULL,
    created TEXT NOT NULL,
    is_superuser INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS terms (
    term TEXT NOT NULL,
    origin_language TEXT NOT NULL,
    normalized_term TEXT NOT NULL,
    PRIMARY KEY (term, origin_language)
);

CREATE INDEX IF NOT EXISTS idx_terms_normalized
    ON terms (origin_language, normalized_term);

CREATE TABLE IF NOT EXISTS term_lexicals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    term TEXT NOT NULL,
    origin_language TEXT NOT NULL,
    value TEXT NOT NULL,
    normalized_value TEXT NOT NULL,
    type TEXT NOT NULL,
    extra TEXT,
    FOREIGN KEY (term, origin_language)
        REFERENCES terms (term, origin_language) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_lexicals_term
    ON term_lexicals (term, origin_language);

CREATE INDEX IF NOT EXISTS idx_lexicals_value
    ON term_lexicals (origin_language, type, normalized_value);

CREATE TABLE IF NOT EXISTS term_definitions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    term TEXT NOT NULL,
    origin_language TEXT NOT NULL,
    part_of_speech TEXT NOT NULL,
    definition TEXT NOT NULL,
    level TEXT,
    term_lexical_id INTEGER REFERENCES term_lexicals (id) ON DELETE CASCADE,
    extra TEXT,
    FOREIGN KEY (term, origin_language)
        REFERENCES terms (term, origin_language) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_definitions_term
    ON term_definitions (term, origin_language);

CREATE TABLE IF NOT EXISTS term_definition_translations (
    language TEXT NOT NULL,
    term_definition_id INTEGER NOT NULL
        REFERENCES term_definitions (id) ON DELETE CASCADE,
    translation TEXT NOT NULL,
    meaning TEXT NOT NULL,
    normalized_meaning TEXT NOT NULL,
    extra TEXT,
    PRIMARY KEY (language, term_definition_id)
);

CREATE TABLE IF NOT EXISTS term_examples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    language TEXT NOT NULL,
    example TEXT NOT NULL,
    level TEXT
);

CREATE INDEX IF NOT EXISTS idx_examples_text
    ON term_examples (language, example);

CREATE TABLE IF NOT EXISTS term_example_translations (
    language TEXT NOT NULL,
    term_example_id INTEGER NOT NULL
        REFERENCES term_examples (id) ON DELETE CASCADE,
    translation TEXT NOT NULL,
    PRIMARY KEY (language, term_example_id)
);

CREATE TABLE IF NOT EXISTS term_example_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    term_example_id INTEGER NOT NULL
        REFERENCES term_examples (id) ON DELETE CASCADE,
    highlight TEXT NOT NULL,
    term TEXT,
    origin_language TEXT,
    term_definition_id INTEGER REFERENCES term_definitions (id) ON DELETE CASCADE,
    term_lexical_id INTEGER REFERENCES term_lexicals (id) ON DELETE CASCADE,
    translation_language TEXT,
    FOREIGN KEY (term, origin_language)
        REFERENCES terms (term, origin_language) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_example_links_term
    ON term_example_links (term_example_id, term, origin_language,
                           COALESCE(translation_language, ''))
    WHERE term IS NOT NULL;

CREATE UNIQUE INDEX IF NOT EXISTS idx_example_links_definition
    ON term_example_links (term_example_id, term_definition_id,
                           COALESCE(translation_language, ''))
    WHERE term_definition_id IS NOT NULL;

CREATE UNIQUE INDEX IF NOT EXISTS idx_example_links_lexical
    ON term_example_links (term_example_id, term_lexical_id,
                           COALESCE(translation_language, ''))
    WHERE term_lexical_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS pronunciations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    audio_file TEXT,
    description TEXT,
    language TEXT NOT NULL,
    phonetic TEXT NOT NULL,
    text TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pronunciation_links (
    pronunciation_id INTEGER PRIMARY KEY
        REFERENCES pronunciations (id) ON DELETE CASCADE,
    term TEXT,
    origin_language TEXT,
    term_example_id INTEGER REFERENCES term_examples (id) ON DELETE CASCADE,
    term_lexical_id INTEGER REFERENCES term_lexicals (id) ON DELETE CASCADE,
    FOREIGN KEY (term, origin_language)
        REFERENCES terms (term, origin_language) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_pronunciation_links_term
    ON pronunciation_links (term, origin_language);

CREATE TABLE IF NOT EXISTS exercises (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    language TEXT NOT NULL,
    type TEXT NOT NULL,
    translation_language TEXT,
    term TEXT,
    origin_language TEXT,
    term_example_id INTEGER REFERENCES term_examples (id) ON DELETE CASCADE,
    pronunciation_id INTEGER REFERENCES pronunciations (id) ON DELETE CASCADE,
    term_lexical_id INTEGER REFERENCES term_lexicals (id) ON DELETE CASCADE,
    term_definition_id INTEGER REFERENCES term_definitions (id) ON DELETE CASCADE,
    FOREIGN KEY (term, origin_language)
        REFERENCES terms (term, origin_language) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_exercises_language_type
    ON exercises (language, type);

CREATE TABLE IF NOT EXISTS exercise_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    exercise_id INTEGER NOT NULL REFERENCES exercises (id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    created TEXT NOT NULL,
    correct INTEGER NOT NULL,
    text_request TEXT,
    text_response TEXT
);

CREATE INDEX IF NOT EXISTS idx_exercise_history_user
    ON exercise_history (user_id, created);

CREATE TABLE IF NOT EXISTS card_sets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    language TEXT,
    user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    updated_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_card_sets_user ON card_sets (user_id);

CREATE TABLE IF NOT EXISTS cards (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cardset_id INTEGER NOT NULL REFERENCES card_sets (id) ON DELETE CASCADE,
    term TEXT NOT NULL,
    origin_language TEXT NOT NULL,
    note TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT,
    FOREIGN KEY (term, origin_language)
        REFERENCES terms (term, origin_language) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_cards_set ON cards (cardset_id);
";

#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open the database (creating the file if needed) and create tables.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context(format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context(format!("Failed to open database at {}", database_url))?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .context("Failed to create tables")?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction; write paths run their exercise rules inside it.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, sqlx::Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }
}
