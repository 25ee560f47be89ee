use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::db::posts::{self, PostFilter};
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::pagination::{Page, PageQuery, Paginator};
use crate::routes::listing::PostCard;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub viewer: Option<String>,
    pub page: Page<PostCard>,
}

#[derive(Template)]
#[template(path = "pages/not_found.html")]
pub struct NotFoundTemplate {
    pub viewer: Option<String>,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// All posts, newest first. The listing data is served from the index cache
/// while fresh; the navigation is always rendered for the current viewer.
pub async fn index(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<IndexTemplate>> {
    let key = Paginator::requested_number(query.page.as_deref());
    let cached = state.index_cache.lock().await.get(&key);

    let page = match cached {
        Some(page) => page,
        None => {
            tracing::debug!(page = key, "Index cache miss");
            let page = {
                let conn = state.db.get()?;
                posts::page(
                    &conn,
                    PostFilter::All,
                    &state.paginator(),
                    query.page.as_deref(),
                )?
                .map(PostCard::from)
            };
            state
                .index_cache
                .lock()
                .await
                .insert(key, page.clone());
            page
        }
    };

    Ok(Html(IndexTemplate {
        viewer: maybe_user.username(),
        page,
    }))
}

/// Router fallback for unknown paths.
pub async fn not_found(maybe_user: MaybeUser) -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(NotFoundTemplate {
            viewer: maybe_user.username(),
        }),
    )
        .into_response()
}
