use rusqlite::{params, Connection};

use crate::db::is_constraint;

#[derive(Debug, thiserror::Error)]
pub enum FollowError {
    #[error("Users cannot follow themselves")]
    SelfFollow,

    #[error("Already following this author")]
    AlreadyFollowing,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Insert the edge `user_id -> author_id`. Both rules are enforced by table
/// constraints; their violations come back as typed errors.
pub fn create(conn: &Connection, user_id: i64, author_id: i64) -> Result<(), FollowError> {
    conn.execute(
        "INSERT INTO follows (user_id, author_id) VALUES (?1, ?2)",
        params![user_id, author_id],
    )
    .map_err(|e| {
        if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_CHECK) {
            FollowError::SelfFollow
        } else if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) {
            FollowError::AlreadyFollowing
        } else {
            FollowError::Database(e)
        }
    })?;

    tracing::info!(user_id, author_id, "Follow created");
    Ok(())
}

/// Remove the edge if present. Returns whether one was removed.
pub fn delete(conn: &Connection, user_id: i64, author_id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
    )?;
    if rows > 0 {
        tracing::info!(user_id, author_id, "Follow removed");
    }
    Ok(rows > 0)
}

pub fn exists(conn: &Connection, user_id: i64, author_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
        |row| row.get(0),
    )
}

pub fn follower_count(conn: &Connection, author_id: i64) -> rusqlite::Result<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM follows WHERE author_id = ?1",
        params![author_id],
        |row| row.get::<_, i64>(0).map(|n| n as u64),
    )
}

pub fn following_count(conn: &Connection, user_id: i64) -> rusqlite::Result<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM follows WHERE user_id = ?1",
        params![user_id],
        |row| row.get::<_, i64>(0).map(|n| n as u64),
    )
}
