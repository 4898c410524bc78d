use std::path::{Component, Path, PathBuf};

use axum::extract::multipart::Field;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

use crate::error::ApiError;
use crate::models::content_item::StoredFile;

/// Subdirectory of the upload root that holds in-flight uploads. Keeping it on
/// the same filesystem makes the final rename atomic.
const TMP_DIR: &str = ".incoming";

/// A file received from a client that has not been given its permanent name
/// yet. The temporary file is removed when this value is dropped.
#[derive(Debug)]
pub struct PendingUpload {
    temp: TempPath,
    pub original_name: String,
    pub content_type: String,
    pub size: u64,
}

impl PendingUpload {
    pub fn path(&self) -> &Path {
        &self.temp
    }

    pub fn extension(&self) -> String {
        extension_of(&self.original_name)
    }
}

/// Local filesystem storage for course media.
///
/// Stored files get a random UUID name so that no permanent path is guessable
/// from the original filename.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    upload_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend.
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        LocalStorage {
            upload_dir: upload_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.upload_dir
    }

    /// Ensure the upload directory (and its temp area) exists.
    pub async fn ensure_dir(&self) -> Result<(), ApiError> {
        tokio::fs::create_dir_all(self.upload_dir.join(TMP_DIR))
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to create upload dir: {}", e)))?;
        Ok(())
    }

    /// Absolute path of a stored file. Rejects anything that is not a single
    /// plain file name.
    pub fn path(&self, stored_name: &str) -> Result<PathBuf, ApiError> {
        let mut components = Path::new(stored_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.upload_dir.join(stored_name)),
            _ => Err(ApiError::NotFound("Media file not found".to_string())),
        }
    }

    /// Create an empty temporary file inside the upload area.
    pub async fn temp_file(&self) -> Result<TempPath, ApiError> {
        self.ensure_dir().await?;
        let dir = self.upload_dir.join(TMP_DIR);
        tokio::task::spawn_blocking(move || tempfile::NamedTempFile::new_in(dir))
            .await
            .map_err(|e| ApiError::Internal(format!("Temp file task failed: {}", e)))?
            .map(|f| f.into_temp_path())
            .map_err(|e| ApiError::Internal(format!("Failed to create temp file: {}", e)))
    }

    /// Stream a multipart field into a temporary file, enforcing `max_size`.
    pub async fn receive_field(
        &self,
        mut field: Field<'_>,
        max_size: u64,
    ) -> Result<PendingUpload, ApiError> {
        let original_name = field
            .file_name()
            .map(sanitize_file_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "unnamed".to_string());

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty() && s != "application/octet-stream")
            .unwrap_or_else(|| {
                mime_guess::from_path(&original_name)
                    .first_or_octet_stream()
                    .to_string()
            });

        let temp = self.temp_file().await?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&temp)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to open temp file: {}", e)))?;

        let mut size: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::Validation(format!("Failed to read upload: {}", e)))?
        {
            size += chunk.len() as u64;
            if size > max_size {
                return Err(ApiError::Validation(format!(
                    "File '{}' exceeds maximum size of {} bytes",
                    original_name, max_size
                )));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::Internal(format!("Failed to write upload: {}", e)))?;
        }
        file.flush()
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to write upload: {}", e)))?;

        Ok(PendingUpload {
            temp,
            original_name,
            content_type,
            size,
        })
    }

    /// Move a pending upload to a fresh random name and describe it.
    pub async fn persist(&self, upload: PendingUpload) -> Result<StoredFile, ApiError> {
        self.ensure_dir().await?;

        let ext = upload.extension();
        let stored_name = if ext.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            format!("{}.{}", uuid::Uuid::new_v4(), ext)
        };
        let dest = self.upload_dir.join(&stored_name);

        tokio::fs::rename(&upload.temp, &dest)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to store upload: {}", e)))?;
        // The temp path no longer exists; stop it from being removed on drop.
        let PendingUpload {
            temp,
            original_name,
            content_type,
            size,
        } = upload;
        let _ = temp.keep();

        tracing::debug!(stored_name = %stored_name, size, "upload stored");

        Ok(StoredFile {
            stored_name,
            original_name,
            size: size as i64,
            mime_type: content_type,
        })
    }

    /// Remove a stored file. Returns `false` when it was already gone.
    pub async fn delete(&self, stored_name: &str) -> Result<bool, ApiError> {
        let path = self.path(stored_name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ApiError::Internal(format!(
                "Failed to delete {}: {}",
                stored_name, e
            ))),
        }
    }

    /// Delete, logging instead of failing. Used where the database change must
    /// go ahead even if the file cannot be removed.
    pub async fn delete_logged(&self, stored_name: &str) {
        match self.delete(stored_name).await {
            Ok(true) => tracing::debug!(stored_name, "stored file removed"),
            Ok(false) => tracing::warn!(stored_name, "stored file already missing"),
            Err(e) => tracing::error!(stored_name, "failed to remove stored file: {}", e),
        }
    }

    pub async fn exists(&self, stored_name: &str) -> bool {
        match self.path(stored_name) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Strip directories and control characters from a client supplied name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Helper to validate allowed file extensions.
pub fn validate_extension(filename: &str, allowed: &[&str]) -> Result<(), ApiError> {
    let ext = extension_of(filename);

    if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)) {
        return Err(ApiError::Validation(format!(
            "File type '.{}' not allowed. Allowed: {:?}",
            ext, allowed
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persist_renames_to_random_name() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let temp = storage.temp_file().await.unwrap();
        tokio::fs::write(&temp, b"hello").await.unwrap();
        let temp_location = temp.to_path_buf();
        let upload = PendingUpload {
            temp,
            original_name: "Lecture 1.MP4".into(),
            content_type: "video/mp4".into(),
            size: 5,
        };

        let stored = storage.persist(upload).await.unwrap();
        assert!(stored.stored_name.ends_with(".mp4"));
        assert_ne!(stored.stored_name, "Lecture 1.MP4");
        assert_eq!(stored.original_name, "Lecture 1.MP4");
        assert!(!temp_location.exists());
        assert!(storage.exists(&stored.stored_name).await);

        assert!(storage.delete(&stored.stored_name).await.unwrap());
        assert!(!storage.delete(&stored.stored_name).await.unwrap());
    }

    #[tokio::test]
    async fn dropped_upload_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let temp = storage.temp_file().await.unwrap();
        let location = temp.to_path_buf();
        drop(PendingUpload {
            temp,
            original_name: "x.pdf".into(),
            content_type: "application/pdf".into(),
            size: 0,
        });
        assert!(!location.exists());
    }

    #[test]
    fn path_rejects_traversal() {
        let storage = LocalStorage::new("/srv/uploads");
        assert!(storage.path("../etc/passwd").is_err());
        assert!(storage.path("a/b.mp4").is_err());
        assert!(storage.path("").is_err());
        assert_eq!(
            storage.path("abc.mp4").unwrap(),
            PathBuf::from("/srv/uploads/abc.mp4")
        );
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("C:\\docs\\notes.pdf"), "notes.pdf");
        assert_eq!(sanitize_file_name("../../x.csv"), "x.csv");
        assert!(validate_extension("slides.PPTX", &["pptx"]).is_ok());
        assert!(validate_extension("run.exe", &["pdf"]).is_err());
    }
}
