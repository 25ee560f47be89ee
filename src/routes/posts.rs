use askama::Template;
use std::path::Path as FsPath;

use axum::extract::{Path, Request, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use rusqlite::Connection;

use crate::db::models::Post;
use crate::db::posts::{self, PostChanges};
use crate::db::{comments, groups, users};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::forms::{CommentForm, FormErrors, PostSubmission};
use crate::media;
use crate::routes::home::Html;
use crate::routes::listing::{CommentView, PostCard};
use crate::state::AppState;

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/post_detail.html")]
pub struct PostDetailTemplate {
    pub viewer: Option<String>,
    pub post: PostCard,
    pub author_post_count: u64,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
}

/// Group option in the post form's select box.
pub struct GroupChoice {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "pages/create_post.html")]
pub struct PostFormTemplate {
    pub viewer: Option<String>,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupChoice>,
    pub current_image: Option<String>,
    pub errors: FormErrors,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create/", get(create_page).post(create_post))
        .route("/posts/{id}/", get(post_detail))
        .route("/posts/{id}/edit/", get(edit_page).post(edit_post))
        .route("/posts/{id}/delete/", post(delete_post))
        .route("/posts/{id}/comment/", post(add_comment))
}

fn detail_url(id: i64) -> String {
    format!("/posts/{}/", id)
}

fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

/// Post ids in paths that are not integers name no post.
fn parse_id(raw: &str) -> AppResult<i64> {
    raw.parse().map_err(|_| AppError::NotFound)
}

fn load_post(conn: &Connection, raw_id: &str) -> AppResult<Post> {
    posts::find(conn, parse_id(raw_id)?)?.ok_or(AppError::NotFound)
}

/// Drop a freshly stored upload when the row meant to reference it was not written.
async fn discard_image_on_error<T>(
    uploads: &FsPath,
    new_image: Option<&str>,
    result: AppResult<T>,
) -> AppResult<T> {
    if result.is_err() {
        if let Some(relative) = new_image {
            media::remove_image(uploads, relative).await;
        }
    }
    result
}

fn group_choices(conn: &Connection, selected: Option<i64>) -> AppResult<Vec<GroupChoice>> {
    Ok(groups::list(conn)?
        .into_iter()
        .map(|g| GroupChoice {
            selected: Some(g.id) == selected,
            id: g.id,
            title: g.title,
        })
        .collect())
}

// --- Handlers ---

async fn post_detail(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Html<PostDetailTemplate>> {
    let conn = state.db.get()?;
    let post = load_post(&conn, &id)?;
    let author_post_count = users::post_count(&conn, post.author_id)?;
    let comments = comments::for_post(&conn, post.id)?
        .into_iter()
        .map(CommentView::from)
        .collect();
    let can_edit = viewer.as_ref().is_some_and(|u| u.id == post.author_id);

    Ok(Html(PostDetailTemplate {
        viewer: viewer.map(|u| u.username),
        post: PostCard::from(post),
        author_post_count,
        comments,
        can_edit,
    }))
}

async fn create_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Html<PostFormTemplate>> {
    let conn = state.db.get()?;
    Ok(Html(PostFormTemplate {
        viewer: Some(user.username),
        is_edit: false,
        action: "/create/".to_string(),
        text: String::new(),
        groups: group_choices(&conn, None)?,
        current_image: None,
        errors: FormErrors::default(),
    }))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    request: Request,
) -> AppResult<Response> {
    let submission = PostSubmission::from_request(request).await?;
    let outcome = {
        let conn = state.db.get()?;
        submission.validate(&conn)?
    };

    let valid = match outcome {
        Ok(valid) => valid,
        Err(errors) => {
            let conn = state.db.get()?;
            return Ok(Html(PostFormTemplate {
                viewer: Some(user.username),
                is_edit: false,
                action: "/create/".to_string(),
                text: submission.text.clone(),
                groups: group_choices(&conn, submission.selected_group())?,
                current_image: None,
                errors,
            })
            .into_response());
        }
    };

    let uploads = state.config.uploads_path();
    let image = match &valid.image {
        Some(upload) => Some(media::save_image(&uploads, upload).await?),
        None => None,
    };

    let changes = PostChanges {
        text: valid.text,
        group_id: valid.group_id,
        image: image.clone(),
    };
    let created = state
        .db
        .get()
        .map_err(AppError::from)
        .and_then(|conn| posts::create(&conn, user.id, &changes).map_err(AppError::from));
    discard_image_on_error(&uploads, image.as_deref(), created).await?;

    Ok(Redirect::to(&profile_url(&user.username)).into_response())
}

async fn edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post = load_post(&conn, &id)?;
    if post.author_id != user.id {
        return Ok(Redirect::to(&detail_url(post.id)).into_response());
    }

    Ok(Html(PostFormTemplate {
        viewer: Some(user.username),
        is_edit: true,
        action: format!("/posts/{}/edit/", post.id),
        groups: group_choices(&conn, post.group.as_ref().map(|g| g.id))?,
        current_image: post.image.as_deref().map(media::image_url),
        text: post.text,
        errors: FormErrors::default(),
    })
    .into_response())
}

async fn edit_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    request: Request,
) -> AppResult<Response> {
    let post = {
        let conn = state.db.get()?;
        load_post(&conn, &id)?
    };
    if post.author_id != user.id {
        tracing::warn!(post_id = post.id, user = %user.username, "Edit by non-author refused");
        return Ok(Redirect::to(&detail_url(post.id)).into_response());
    }

    let submission = PostSubmission::from_request(request).await?;
    let outcome = {
        let conn = state.db.get()?;
        submission.validate(&conn)?
    };

    let valid = match outcome {
        Ok(valid) => valid,
        Err(errors) => {
            let conn = state.db.get()?;
            return Ok(Html(PostFormTemplate {
                viewer: Some(user.username),
                is_edit: true,
                action: format!("/posts/{}/edit/", post.id),
                text: submission.text.clone(),
                groups: group_choices(&conn, submission.selected_group())?,
                current_image: post.image.as_deref().map(media::image_url),
                errors,
            })
            .into_response());
        }
    };

    let uploads = state.config.uploads_path();
    let new_image = match &valid.image {
        Some(upload) => Some(media::save_image(&uploads, upload).await?),
        None => None,
    };
    let image = match (&new_image, valid.clear_image) {
        (Some(stored), _) => Some(stored.clone()),
        (None, true) => None,
        (None, false) => post.image.clone(),
    };

    let changes = PostChanges {
        text: valid.text,
        group_id: valid.group_id,
        image: image.clone(),
    };
    let updated = state
        .db
        .get()
        .map_err(AppError::from)
        .and_then(|conn| posts::update(&conn, post.id, &changes).map_err(AppError::from));
    discard_image_on_error(&uploads, new_image.as_deref(), updated).await?;

    if let Some(old) = post.image.as_deref() {
        if image.as_deref() != Some(old) {
            media::remove_image(&uploads, old).await;
        }
    }

    Ok(Redirect::to(&detail_url(post.id)).into_response())
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post = {
        let conn = state.db.get()?;
        let post = load_post(&conn, &id)?;
        if post.author_id != user.id {
            return Ok(Redirect::to(&detail_url(post.id)).into_response());
        }
        posts::delete(&conn, post.id)?;
        post
    };

    if let Some(image) = post.image.as_deref() {
        media::remove_image(&state.config.uploads_path(), image).await;
    }

    Ok(Redirect::to(&profile_url(&user.username)).into_response())
}

async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post = load_post(&conn, &id)?;

    match form.validate() {
        Ok(text) => {
            comments::create(&conn, post.id, user.id, &text)?;
        }
        Err(_) => {
            tracing::debug!(post_id = post.id, "Empty comment ignored");
        }
    }

    Ok(Redirect::to(&detail_url(post.id)).into_response())
}
