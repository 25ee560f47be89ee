use rusqlite::{params, Connection, OptionalExtension};

use crate::db::is_constraint;
use crate::db::models::User;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("A user with that username already exists")]
    UsernameTaken,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Default)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub is_admin: bool,
}

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, is_admin, created_at";

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        is_admin: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn create(conn: &Connection, new: &NewUser<'_>) -> Result<i64, UserError> {
    conn.execute(
        "INSERT INTO users (username, password_hash, first_name, last_name, email, is_admin)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.username,
            new.password_hash,
            new.first_name,
            new.last_name,
            new.email,
            new.is_admin
        ],
    )
    .map_err(|e| {
        if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) {
            UserError::UsernameTaken
        } else {
            UserError::Database(e)
        }
    })?;

    let id = conn.last_insert_rowid();
    tracing::info!(user_id = id, username = new.username, "Created user");
    Ok(id)
}

pub fn find_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
        params![username],
        map_user,
    )
    .optional()
}

/// Id and password hash for a login attempt.
pub fn credentials(conn: &Connection, username: &str) -> rusqlite::Result<Option<(i64, String)>> {
    conn.query_row(
        "SELECT id, password_hash FROM users WHERE username = ?1",
        params![username],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

pub fn post_count(conn: &Connection, user_id: i64) -> rusqlite::Result<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE author_id = ?1",
        params![user_id],
        |row| row.get::<_, i64>(0).map(|n| n as u64),
    )
}
