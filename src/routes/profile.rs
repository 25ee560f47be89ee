use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;

use crate::db::follows::{self, FollowError};
use crate::db::models::User;
use crate::db::posts::{self, PostFilter};
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::pagination::{Page, PageQuery};
use crate::routes::home::Html;
use crate::routes::listing::PostCard;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub viewer: Option<String>,
    pub author: User,
    pub post_count: u64,
    pub follower_count: u64,
    pub following_count: u64,
    /// Viewer is logged in and is not the author.
    pub can_follow: bool,
    pub following: bool,
    pub page: Page<PostCard>,
}

#[derive(Template)]
#[template(path = "pages/follow.html")]
pub struct FeedTemplate {
    pub viewer: Option<String>,
    pub page: Page<PostCard>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile/{username}/", get(profile))
        .route("/profile/{username}/follow/", get(profile_follow))
        .route("/profile/{username}/unfollow/", get(profile_unfollow))
        .route("/follow/", get(follow_index))
}

fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

async fn profile(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<ProfileTemplate>> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;

    let page = posts::page(
        &conn,
        PostFilter::Author(author.id),
        &state.paginator(),
        query.page.as_deref(),
    )?
    .map(PostCard::from);

    let (can_follow, following) = match &viewer {
        Some(user) if user.id != author.id => (true, follows::exists(&conn, user.id, author.id)?),
        _ => (false, false),
    };

    Ok(Html(ProfileTemplate {
        viewer: viewer.map(|u| u.username),
        post_count: page.total,
        follower_count: follows::follower_count(&conn, author.id)?,
        following_count: follows::following_count(&conn, author.id)?,
        author,
        can_follow,
        following,
        page,
    }))
}

/// Subscribe to an author. Self-follows and repeats are refused by storage
/// and leave nothing to do here beyond returning to the profile.
async fn profile_follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;

    match follows::create(&conn, user.id, author.id) {
        Ok(()) => {}
        Err(FollowError::SelfFollow) | Err(FollowError::AlreadyFollowing) => {
            tracing::debug!(user = %user.username, author = %author.username, "Follow refused");
        }
        Err(FollowError::Database(e)) => return Err(e.into()),
    }

    Ok(Redirect::to(&profile_url(&author.username)).into_response())
}

async fn profile_unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let author = users::find_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;
    follows::delete(&conn, user.id, author.id)?;

    Ok(Redirect::to(&profile_url(&author.username)).into_response())
}

/// Posts by every author the viewer follows.
async fn follow_index(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<FeedTemplate>> {
    let conn = state.db.get()?;
    let page = posts::page(
        &conn,
        PostFilter::FollowedBy(user.id),
        &state.paginator(),
        query.page.as_deref(),
    )?
    .map(PostCard::from);

    Ok(Html(FeedTemplate {
        viewer: Some(user.username),
        page,
    }))
}
