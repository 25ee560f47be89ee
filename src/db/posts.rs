use rusqlite::{params, Connection, OptionalExtension, ToSql};

use crate::db::models::{GroupRef, Post};
use crate::pagination::{Page, Paginator};

/// Which posts a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}

impl PostFilter {
    fn clause(&self) -> (&'static str, Option<i64>) {
        match self {
            PostFilter::All => ("", None),
            PostFilter::Group(id) => ("WHERE p.group_id = ?1", Some(*id)),
            PostFilter::Author(id) => ("WHERE p.author_id = ?1", Some(*id)),
            PostFilter::FollowedBy(id) => (
                "WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = ?1)",
                Some(*id),
            ),
        }
    }
}

/// Fields a post form may set.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

const POST_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.author_id, u.username,
            g.id, g.slug, g.title, p.image
     FROM posts p
     JOIN users u ON u.id = p.author_id
     LEFT JOIN post_groups g ON g.id = p.group_id";

fn map_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let group_id: Option<i64> = row.get(5)?;
    let group = match group_id {
        Some(id) => Some(GroupRef {
            id,
            slug: row.get(6)?,
            title: row.get(7)?,
        }),
        None => None,
    };

    Ok(Post {
        id: row.get(0)?,
        text: row.get(1)?,
        pub_date: row.get(2)?,
        author_id: row.get(3)?,
        author: row.get(4)?,
        group,
        image: row.get(8)?,
    })
}

pub fn count(conn: &Connection, filter: PostFilter) -> rusqlite::Result<u64> {
    let (clause, arg) = filter.clause();
    let sql = format!("SELECT COUNT(*) FROM posts p {clause}");
    let n: i64 = match arg {
        Some(id) => conn.query_row(&sql, params![id], |row| row.get(0))?,
        None => conn.query_row(&sql, [], |row| row.get(0))?,
    };
    Ok(n as u64)
}

/// Posts newest-first, skipping `offset` and returning at most `limit`.
pub fn list(
    conn: &Connection,
    filter: PostFilter,
    limit: u64,
    offset: u64,
) -> rusqlite::Result<Vec<Post>> {
    let (clause, arg) = filter.clause();
    let sql = format!(
        "{POST_SELECT} {clause} ORDER BY p.pub_date DESC, p.id DESC LIMIT ?2 OFFSET ?3"
    );
    let limit = limit as i64;
    let offset = offset as i64;
    // ?1 is unused for unfiltered listings but keeps parameter numbering fixed.
    let filter_arg = arg.unwrap_or(0);
    let args: [&dyn ToSql; 3] = [&filter_arg, &limit, &offset];

    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt.query_map(&args[..], map_post)?.collect();
    posts
}

/// Count the filtered collection and load only the requested page.
pub fn page(
    conn: &Connection,
    filter: PostFilter,
    paginator: &Paginator,
    requested: Option<&str>,
) -> rusqlite::Result<Page<Post>> {
    let total = count(conn, filter)?;
    let window = paginator.locate(total, requested);
    let items = if window.limit == 0 {
        Vec::new()
    } else {
        list(conn, filter, window.limit, window.offset)?
    };
    Ok(Page::new(window, items))
}

pub fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!("{POST_SELECT} WHERE p.id = ?1"),
        params![id],
        map_post,
    )
    .optional()
}

pub fn create(conn: &Connection, author_id: i64, changes: &PostChanges) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO posts (text, author_id, group_id, image) VALUES (?1, ?2, ?3, ?4)",
        params![changes.text, author_id, changes.group_id, changes.image],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(post_id = id, author_id, "Created post");
    Ok(id)
}

/// Overwrite text, group and image. Author and publication date never change.
pub fn update(conn: &Connection, id: i64, changes: &PostChanges) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE posts SET text = ?1, group_id = ?2, image = ?3 WHERE id = ?4",
        params![changes.text, changes.group_id, changes.image, id],
    )?;
    tracing::info!(post_id = id, "Updated post");
    Ok(rows > 0)
}

pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    tracing::info!(post_id = id, "Deleted post");
    Ok(rows > 0)
}
