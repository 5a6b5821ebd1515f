use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Event images stored on local disk and served back under `/uploads`.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Checks and writes an uploaded image, returning its public path.
    pub async fn save(
        &self,
        original_name: Option<&str>,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> AppResult<String> {
        if !content_type.is_some_and(is_allowed_image) {
            return Err(AppError::BadRequest("Only image files are allowed!".to_string()));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(AppError::BadRequest("Image must not exceed 5 MB.".to_string()));
        }

        let file_name = stored_file_name(original_name.unwrap_or_default());
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&file_name), bytes).await?;
        info!(file = %file_name, size = bytes.len(), "Stored event image");

        Ok(format!("{PUBLIC_PREFIX}/{file_name}"))
    }

    /// Deletes an image stored by [`save`](Self::save). Paths outside the
    /// store and files already gone are ignored.
    pub async fn remove(&self, public_path: &str) -> AppResult<()> {
        let Some(file_name) = public_path
            .strip_prefix(PUBLIC_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| !name.is_empty() && !name.contains('/') && !name.contains(".."))
        else {
            return Ok(());
        };
        match tokio::fs::remove_file(self.dir.join(file_name)).await {
            Ok(()) => {
                info!(file = %file_name, "Removed event image");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn is_allowed_image(content_type: &str) -> bool {
    matches!(
        content_type.to_ascii_lowercase().as_str(),
        "image/jpg" | "image/jpeg" | "image/png"
    )
}

/// Random name that keeps the extension of the uploaded file.
pub fn stored_file_name(original_name: &str) -> String {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    format!("{}{}", Uuid::new_v4(), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_jpeg_and_png() {
        assert!(is_allowed_image("image/png"));
        assert!(is_allowed_image("IMAGE/JPEG"));
        assert!(is_allowed_image("image/jpg"));
        assert!(!is_allowed_image("image/gif"));
        assert!(!is_allowed_image("application/pdf"));
    }

    #[test]
    fn stored_name_keeps_extension() {
        let name = stored_file_name("poster.final.png");
        assert!(name.ends_with(".png"));
        assert!(Uuid::parse_str(name.trim_end_matches(".png")).is_ok());

        let bare = stored_file_name("poster");
        assert!(Uuid::parse_str(&bare).is_ok());

        // path tricks in the extension are dropped
        assert!(!stored_file_name("x.p/ng").contains('/'));
    }

    #[tokio::test]
    async fn save_writes_file_and_returns_public_path() {
        let dir = std::env::temp_dir().join(format!("event-buddy-{}", Uuid::new_v4()));
        let store = ImageStore::new(&dir);

        let path = store
            .save(Some("cover.jpg"), Some("image/jpeg"), b"fake jpeg bytes")
            .await
            .unwrap();
        assert!(path.starts_with("/uploads/"));
        let stored = dir.join(path.trim_start_matches("/uploads/"));
        assert_eq!(tokio::fs::read(&stored).await.unwrap(), b"fake jpeg bytes");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn remove_deletes_only_stored_images() {
        let dir = std::env::temp_dir().join(format!("event-buddy-{}", Uuid::new_v4()));
        let store = ImageStore::new(&dir);
        let path = store
            .save(Some("cover.png"), Some("image/png"), b"png")
            .await
            .unwrap();

        store.remove(&path).await.unwrap();
        assert!(!dir.join(path.trim_start_matches("/uploads/")).exists());

        // second removal and foreign paths are no-ops
        store.remove(&path).await.unwrap();
        store.remove("/uploads/../Cargo.toml").await.unwrap();
        store.remove("https://cdn.example.com/a.png").await.unwrap();

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn save_rejects_wrong_type_and_oversize() {
        let store = ImageStore::new(std::env::temp_dir().join("event-buddy-unused"));
        let err = store.save(Some("a.gif"), Some("image/gif"), b"gif").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let big = vec![0u8; MAX_IMAGE_BYTES + 1];
        let err = store.save(Some("a.png"), Some("image/png"), &big).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = store.save(Some("a.png"), None, b"png").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
