use chrono::{NaiveDateTime, Utc};

use crate::db::models::{Comment, GroupRef, Post};
use crate::media;

// --- View structs ---

#[derive(Debug, Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub pub_date: String,
    pub group: Option<GroupRef>,
    pub image_url: Option<String>,
}

pub struct CommentView {
    pub author: String,
    pub text: String,
    pub created: String,
}

impl From<Post> for PostCard {
    fn from(post: Post) -> Self {
        PostCard {
            id: post.id,
            text: post.text,
            author: post.author,
            pub_date: parse_and_format_time(&post.pub_date),
            group: post.group,
            image_url: post.image.as_deref().map(media::image_url),
        }
    }
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        CommentView {
            author: comment.author,
            text: comment.text,
            created: parse_and_format_time(&comment.created),
        }
    }
}

// --- Time formatting ---

fn parse_and_format_time(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, "%Y-%m-%d %H:%M:%S")
        .map(|dt| format_relative_time(&dt))
        .unwrap_or_else(|_| db_time.to_string())
}

pub fn format_relative_time(dt: &NaiveDateTime) -> String {
    let now = Utc::now().naive_utc();
    let diff = now.signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}
