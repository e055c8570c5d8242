//! Photo storage
//!
//! Uploaded report photos land on the local filesystem under
//! `<root>/reports` and are served back under `/uploads/reports/...`.
//! Filenames are generated server-side; nothing from the client's
//! filename survives except the (validated) extension.

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::AppError;

/// Extensions accepted for report photos
const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

pub struct PhotoStorage {
    root: PathBuf,
    max_bytes: usize,
}

impl PhotoStorage {
    /// Open (and create if needed) the storage root
    pub async fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Result<Self, AppError> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join("reports"))
            .await
            .map_err(|e| AppError::Storage(format!("failed to create upload dir: {}", e)))?;

        Ok(Self { root, max_bytes })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a report photo
    ///
    /// # Returns
    /// The URL path (`/uploads/reports/<name>`) to store on the report
    ///
    /// # Errors
    /// Rejects disallowed extensions and oversized payloads with
    /// `AppError::Validation` before touching the filesystem
    pub async fn store_report_photo(
        &self,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<String, AppError> {
        let extension = extension_of(original_filename)?;

        if bytes.len() > self.max_bytes {
            return Err(AppError::Validation(format!(
                "photo exceeds maximum size of {} bytes",
                self.max_bytes
            )));
        }
        if bytes.is_empty() {
            return Err(AppError::Validation("photo is empty".to_string()));
        }

        let name = format!(
            "report-{}-{}.{}",
            chrono::Utc::now().timestamp_millis(),
            rand::thread_rng().gen::<u32>(),
            extension
        );
        let path = self.root.join("reports").join(&name);

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Storage(format!("failed to write photo: {}", e)))?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "Stored report photo");
        Ok(format!("/uploads/reports/{}", name))
    }
}

fn extension_of(filename: &str) -> Result<String, AppError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| AppError::Validation("photo filename has no extension".to_string()))?;

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::Validation(format!(
            "unsupported photo type .{}; allowed: jpg, jpeg, png, gif",
            extension
        )));
    }

    Ok(extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage(max_bytes: usize) -> (PhotoStorage, tempfile::TempDir) {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let storage = PhotoStorage::new(temp_dir.path(), max_bytes).await.unwrap();
        (storage, temp_dir)
    }

    #[tokio::test]
    async fn stores_photo_and_returns_url_path() {
        let (storage, temp_dir) = storage(1024).await;

        let url = storage
            .store_report_photo("pothole.JPG", b"fake image data")
            .await
            .unwrap();

        assert!(url.starts_with("/uploads/reports/report-"));
        assert!(url.ends_with(".jpg"));

        let on_disk = temp_dir
            .path()
            .join("reports")
            .join(url.rsplit('/').next().unwrap());
        assert_eq!(tokio::fs::read(on_disk).await.unwrap(), b"fake image data");
    }

    #[tokio::test]
    async fn rejects_disallowed_extension() {
        let (storage, _guard) = storage(1024).await;

        let error = storage
            .store_report_photo("malware.exe", b"data")
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_missing_extension() {
        let (storage, _guard) = storage(1024).await;

        let error = storage.store_report_photo("noext", b"data").await.unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_oversized_photo() {
        let (storage, _guard) = storage(8).await;

        let error = storage
            .store_report_photo("big.png", &[0u8; 9])
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn generated_names_do_not_collide() {
        let (storage, _guard) = storage(1024).await;

        let a = storage.store_report_photo("a.png", b"a").await.unwrap();
        let b = storage.store_report_photo("b.png", b"b").await.unwrap();
        assert_ne!(a, b);
    }
}
