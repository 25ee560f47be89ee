use askama::Template;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::Router;

use crate::db::models::Group;
use crate::db::posts::{self, PostFilter};
use crate::db::groups;
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::pagination::{Page, PageQuery};
use crate::routes::home::Html;
use crate::routes::listing::PostCard;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/group_list.html")]
pub struct GroupTemplate {
    pub viewer: Option<String>,
    pub group: Group,
    pub page: Page<PostCard>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/group/{slug}/", get(group_posts))
}

async fn group_posts(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<GroupTemplate>> {
    let conn = state.db.get()?;
    let group = groups::find_by_slug(&conn, &slug)?.ok_or(AppError::NotFound)?;
    let page = posts::page(
        &conn,
        PostFilter::Group(group.id),
        &state.paginator(),
        query.page.as_deref(),
    )?
    .map(PostCard::from);

    Ok(Html(GroupTemplate {
        viewer: maybe_user.username(),
        group,
        page,
    }))
}
