//! Registered users. Password hashes never leave this layer; the HTTP
//! surface exposes its own view type without the hash.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::info;

use crate::language::Language;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub native_language: Language,
    pub created: DateTime<Utc>,
    pub is_superuser: bool,
}

/// Fields of a partial user update. `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub native_language: Option<Language>,
}

pub async fn create(
    conn: &mut SqliteConnection,
    username: &str,
    email: &str,
    password_hash: &str,
    native_language: Language,
) -> Result<User, sqlx::Error> {
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, email, password_hash, native_language, created, is_superuser) \
         VALUES (?, ?, ?, ?, ?, 0) \
         RETURNING id, username, email, password_hash, native_language, created, is_superuser",
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(native_language)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    info!("registered user '{}' (id {})", user.username, user.id);
    Ok(user)
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, email, password_hash, native_language, created, is_superuser \
         FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn get_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, email, password_hash, native_language, created, is_superuser \
         FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    changes: UserUpdate,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET \
            username = COALESCE(?, username), \
            email = COALESCE(?, email), \
            password_hash = COALESCE(?, password_hash), \
            native_language = COALESCE(?, native_language) \
         WHERE id = ? \
         RETURNING id, username, email, password_hash, native_language, created, is_superuser",
    )
    .bind(changes.username)
    .bind(changes.email)
    .bind(changes.password_hash)
    .bind(changes.native_language)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

/// Grant the superuser role. Only the `create-superuser` binary calls
/// this; registration never sets the flag.
pub async fn promote(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET is_superuser = 1 WHERE email = ? \
         RETURNING id, username, email, password_hash, native_language, created, is_superuser",
    )
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(ref user) = user {
        info!("granted superuser to '{}' (id {})", user.username, user.id);
    }
    Ok(user)
}
