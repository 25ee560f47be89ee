//! Post images: validation and storage under the uploads directory.

use axum::body::Bytes;
use std::path::{Component, Path, PathBuf};

/// Subdirectory of the uploads dir that holds post images.
pub const POSTS_DIR: &str = "posts";

/// A file field taken from a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedImage {
    /// Lower-cased extension when it names an image type.
    pub fn image_extension(&self) -> Option<String> {
        let ext = Path::new(&self.file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        let guessed = mime_guess::from_ext(&ext).first()?;
        (guessed.type_() == mime_guess::mime::IMAGE).then_some(ext)
    }

    /// Reasons this upload cannot be stored as a post image.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.data.is_empty() {
            problems.push("The submitted file is empty.".to_string());
        }
        let declared_non_image = self
            .content_type
            .as_deref()
            .is_some_and(|ct| !ct.starts_with("image/") && ct != "application/octet-stream");
        if self.image_extension().is_none() || declared_non_image {
            problems.push(
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
                    .to_string(),
            );
        }
        problems
    }
}

/// Write the image under `<uploads>/posts/` and return its relative path.
pub async fn save_image(uploads_dir: &Path, image: &UploadedImage) -> std::io::Result<String> {
    let ext = image.image_extension().unwrap_or_else(|| "bin".to_string());
    let relative = format!("{}/{}.{}", POSTS_DIR, uuid::Uuid::now_v7(), ext);

    let target = uploads_dir.join(&relative);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, &image.data).await?;

    tracing::info!(path = %relative, bytes = image.data.len(), "Stored post image");
    Ok(relative)
}

/// Best-effort removal of a stored image; missing files are fine.
pub async fn remove_image(uploads_dir: &Path, relative: &str) {
    let Some(path) = resolve(uploads_dir, relative) else {
        tracing::warn!(path = relative, "Refusing to remove image outside uploads dir");
        return;
    };
    match tokio::fs::remove_file(&path).await {
        Ok(()) => tracing::info!(path = relative, "Removed post image"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = relative, "Could not remove image: {}", e),
    }
}

/// Public URL for a stored image.
pub fn image_url(relative: &str) -> String {
    format!("/media/{}", relative)
}

/// Join `relative` onto the uploads dir, rejecting anything that escapes it.
fn resolve(uploads_dir: &Path, relative: &str) -> Option<PathBuf> {
    let rel = Path::new(relative);
    rel.components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| uploads_dir.join(rel))
}
