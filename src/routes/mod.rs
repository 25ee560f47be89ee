pub mod assets;
pub mod auth;
pub mod groups;
pub mod home;
pub mod listing;
pub mod posts;
pub mod profile;

use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router with shared state attached.
pub fn app(state: AppState) -> Router {
    let media = ServeDir::new(state.config.uploads_path());

    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .nest_service("/media", media)
        .merge(auth::router())
        .merge(posts::router())
        .merge(groups::router())
        .merge(profile::router())
        .fallback(home::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
