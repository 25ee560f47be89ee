use rusqlite::{params, Connection};

use crate::db::models::Comment;

pub fn create(conn: &Connection, post_id: i64, author_id: i64, text: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO comments (post_id, author_id, text) VALUES (?1, ?2, ?3)",
        params![post_id, author_id, text],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(comment_id = id, post_id, author_id, "Created comment");
    Ok(id)
}

/// Comments on a post, newest first.
pub fn for_post(conn: &Connection, post_id: i64) -> rusqlite::Result<Vec<Comment>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.post_id, c.author_id, u.username, c.text, c.created
         FROM comments c
         JOIN users u ON u.id = c.author_id
         WHERE c.post_id = ?1
         ORDER BY c.created DESC, c.id DESC",
    )?;

    let comments = stmt
        .query_map(params![post_id], |row| {
            Ok(Comment {
                id: row.get(0)?,
                post_id: row.get(1)?,
                author_id: row.get(2)?,
                author: row.get(3)?,
                text: row.get(4)?,
                created: row.get(5)?,
            })
        })?
        .collect();
    comments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::posts::{self, PostChanges};
    use crate::db::testing;

    #[test]
    fn comments_attach_to_post_newest_first() {
        let (_tmp, pool) = testing::pool();
        let conn = pool.get().unwrap();
        let alice = testing::user(&conn, "alice");
        let bob = testing::user(&conn, "bob");
        let post_id = posts::create(
            &conn,
            alice,
            &PostChanges {
                text: "hello".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        let first = create(&conn, post_id, bob, "first!").unwrap();
        let second = create(&conn, post_id, alice, "thanks").unwrap();

        let comments = for_post(&conn, post_id).unwrap();
        let ids: Vec<i64> = comments.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert_eq!(comments[1].author, "bob");
    }

    #[test]
    fn comments_go_with_their_post() {
        let (_tmp, pool) = testing::pool();
        let conn = pool.get().unwrap();
        let alice = testing::user(&conn, "alice");
        let post_id = posts::create(
            &conn,
            alice,
            &PostChanges {
                text: "hello".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        create(&conn, post_id, alice, "note to self").unwrap();

        posts::delete(&conn, post_id).unwrap();
        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(left, 0);
    }

    #[test]
    fn comment_on_missing_post_fails() {
        let (_tmp, pool) = testing::pool();
        let conn = pool.get().unwrap();
        let alice = testing::user(&conn, "alice");
        assert!(create(&conn, 42, alice, "into the void").is_err());
    }
}
