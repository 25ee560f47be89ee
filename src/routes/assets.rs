use axum::extract::Path;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use rust_embed::Embed;

use crate::error::AppError;

/// Stylesheets and icons compiled into the binary.
#[derive(Embed)]
#[folder = "assets/"]
struct Assets;

const ASSET_CACHE_CONTROL: &str = "public, max-age=86400";

pub async fn serve(Path(path): Path<String>) -> Response {
    let Some(file) = Assets::get(&path) else {
        return AppError::NotFound.into_response();
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    (
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, ASSET_CACHE_CONTROL.to_string()),
        ],
        file.data.into_owned(),
    )
        .into_response()
}
