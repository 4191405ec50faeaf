use std::path::Path;

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    storage::new_id,
};

pub const UPLOADS_URL_PREFIX: &str = "/uploads";

const ALLOWED_EXTENSIONS: [&str; 5] = ["jpeg", "jpg", "png", "gif", "webp"];

/// A file part received from a multipart form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub async fn store(&self, dir: &Path, max_bytes: usize) -> AppResult<String> {
        store_image(
            dir,
            &self.file_name,
            self.content_type.as_deref(),
            &self.bytes,
            max_bytes,
        )
        .await
    }
}

/// Lower-cased extension when both the file name and the declared content type
/// describe an accepted image format.
pub fn image_extension(file_name: &str, content_type: Option<&str>) -> AppResult<String> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| AppError::Validation("Only image files are allowed".into()))?;

    if let Some(mime) = content_type {
        let subtype = mime.strip_prefix("image/").unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&subtype) {
            return Err(AppError::Validation("Only image files are allowed".into()));
        }
    }
    Ok(ext)
}

/// Writes an uploaded image under `dir` and returns its public URL path.
pub async fn store_image(
    dir: &Path,
    file_name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
    max_bytes: usize,
) -> AppResult<String> {
    let ext = image_extension(file_name, content_type)?;
    if bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".into()));
    }
    if bytes.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "File too large (max {max_bytes} bytes)"
        )));
    }

    let id = new_id();
    let short = id.split('-').next().unwrap_or(&id);
    let stored_name = format!("{}-{}.{}", Utc::now().timestamp_millis(), short, ext);

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|err| AppError::Internal(err.into()))?;
    tokio::fs::write(dir.join(&stored_name), bytes)
        .await
        .map_err(|err| AppError::Internal(err.into()))?;

    tracing::debug!(file = %stored_name, size = bytes.len(), "image stored");
    Ok(format!("{UPLOADS_URL_PREFIX}/{stored_name}"))
}

/// Deletes an image written by [`store_image`], given its public URL path.
pub async fn remove_image(dir: &Path, url: &str) {
    let Some(name) = url
        .strip_prefix(UPLOADS_URL_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|name| !name.contains(['/', '\\']) && !name.starts_with('.'))
    else {
        return;
    };
    if let Err(err) = tokio::fs::remove_file(dir.join(name)).await {
        tracing::warn!(error = %err, file = %name, "failed to remove image");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_image_types() {
        assert_eq!(image_extension("Photo.JPG", Some("image/jpeg")).unwrap(), "jpg");
        assert_eq!(image_extension("a.webp", None).unwrap(), "webp");
    }

    #[test]
    fn rejects_other_files() {
        assert!(image_extension("notes.txt", Some("text/plain")).is_err());
        assert!(image_extension("evil.png", Some("application/x-sh")).is_err());
        assert!(image_extension("noext", None).is_err());
    }

    #[tokio::test]
    async fn store_image_writes_file_and_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let url = store_image(dir.path(), "shoe.png", Some("image/png"), b"png", 1024)
            .await
            .unwrap();

        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".png"));
        let name = url.trim_start_matches("/uploads/");
        assert!(dir.path().join(name).exists());
    }

    #[tokio::test]
    async fn remove_image_deletes_only_inside_the_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        let url = store_image(dir.path(), "shoe.png", None, b"png", 1024)
            .await
            .unwrap();
        remove_image(dir.path(), &url).await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        std::fs::write(dir.path().join("keep.png"), b"png").unwrap();
        remove_image(dir.path(), "/uploads/../keep.png").await;
        remove_image(dir.path(), "/elsewhere/keep.png").await;
        assert!(dir.path().join("keep.png").exists());
    }

    #[tokio::test]
    async fn store_image_enforces_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let err = store_image(dir.path(), "shoe.png", None, &[0u8; 10], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
