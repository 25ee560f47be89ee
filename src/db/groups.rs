use rusqlite::{params, Connection, OptionalExtension};

use crate::db::is_constraint;
use crate::db::models::Group;

#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("Group slug '{0}' is already taken")]
    SlugTaken(String),

    #[error("Invalid slug '{0}': use letters, digits, '-' or '_'")]
    InvalidSlug(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// URL-safe identifier: 1..=80 chars of ASCII letters, digits, '-' and '_'.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 80
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn map_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

pub fn create(
    conn: &Connection,
    title: &str,
    slug: &str,
    description: &str,
) -> Result<i64, GroupError> {
    if !is_valid_slug(slug) {
        return Err(GroupError::InvalidSlug(slug.to_string()));
    }

    conn.execute(
        "INSERT INTO post_groups (title, slug, description) VALUES (?1, ?2, ?3)",
        params![title, slug, description],
    )
    .map_err(|e| {
        if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) {
            GroupError::SlugTaken(slug.to_string())
        } else {
            GroupError::Database(e)
        }
    })?;

    let id = conn.last_insert_rowid();
    tracing::info!(group_id = id, slug, "Created group");
    Ok(id)
}

pub fn find_by_slug(conn: &Connection, slug: &str) -> rusqlite::Result<Option<Group>> {
    conn.query_row(
        "SELECT id, title, slug, description FROM post_groups WHERE slug = ?1",
        params![slug],
        map_group,
    )
    .optional()
}

pub fn exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM post_groups WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
}

/// All groups by title, for the post form's select box.
pub fn list(conn: &Connection) -> rusqlite::Result<Vec<Group>> {
    let mut stmt =
        conn.prepare("SELECT id, title, slug, description FROM post_groups ORDER BY title, id")?;
    let groups = stmt.query_map([], map_group)?.collect();
    groups
}
