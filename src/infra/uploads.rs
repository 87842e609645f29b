//! Filesystem storage for post images under the media root.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::application::repos::{ImageStore, ImageStoreError};

/// Directory below the media root that holds post images.
pub const POSTS_DIR: &str = "posts";
const COLLISION_ATTEMPTS: usize = 4;

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error("stored file not found")]
    NotFound,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file is not a recognised image")]
    NotAnImage,
    #[error("could not find a free file name for `{0}`")]
    NameExhausted(String),
}

#[derive(Debug)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(root.join(POSTS_DIR))?;
        Ok(Self { root })
    }

    /// Reject payloads that are empty or whose header is not a known image format.
    pub fn validate_image(data: &[u8]) -> Result<(), UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }
        imagesize::image_type(data).map_err(|_| UploadStorageError::NotAnImage)?;
        Ok(())
    }

    /// Store an image and return its path relative to the media root, e.g. `posts/small.gif`.
    pub async fn store_image(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<String, UploadStorageError> {
        Self::validate_image(&data)?;

        let filename = sanitize_filename(original_name);
        for attempt in 0..COLLISION_ATTEMPTS {
            let candidate = if attempt == 0 {
                filename.clone()
            } else {
                with_suffix(&filename, &Uuid::new_v4().simple().to_string()[..7])
            };
            let stored_path = format!("{POSTS_DIR}/{candidate}");
            let absolute = self.resolve(&stored_path)?;

            let file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&absolute)
                .await;
            let mut file = match file {
                Ok(file) => file,
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            };

            if let Err(err) = file.write_all(&data).await {
                drop(file);
                let _ = fs::remove_file(&absolute).await;
                return Err(err.into());
            }
            file.flush().await?;
            return Ok(stored_path);
        }

        Err(UploadStorageError::NameExhausted(filename))
    }

    /// Read a stored file into memory. Directories and missing files are not found.
    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::metadata(&absolute).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(UploadStorageError::NotFound),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(UploadStorageError::NotFound);
            }
            Err(err) => return Err(err.into()),
        }
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

impl From<UploadStorageError> for ImageStoreError {
    fn from(err: UploadStorageError) -> Self {
        match err {
            UploadStorageError::EmptyPayload => ImageStoreError::Empty,
            UploadStorageError::NotAnImage => ImageStoreError::NotAnImage,
            other => ImageStoreError::Storage(other.to_string()),
        }
    }
}

#[async_trait]
impl ImageStore for MediaStorage {
    fn check(&self, data: &[u8]) -> Result<(), ImageStoreError> {
        Self::validate_image(data).map_err(ImageStoreError::from)
    }

    async fn store(&self, original_name: &str, data: Bytes) -> Result<String, ImageStoreError> {
        self.store_image(original_name, data)
            .await
            .map_err(ImageStoreError::from)
    }
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "image".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value.chars().all(|ch| ch.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

fn with_suffix(filename: &str, suffix: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{suffix}.{ext}"),
        None => format!("{filename}_{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
    ];

    #[test]
    fn sanitize_keeps_simple_names() {
        assert_eq!(sanitize_filename("small.gif"), "small.gif");
        assert_eq!(sanitize_filename("My Photo.JPG"), "my-photo.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename(""), "image");
    }

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(with_suffix("small.gif", "abc1234"), "small_abc1234.gif");
        assert_eq!(with_suffix("small", "abc1234"), "small_abc1234");
    }

    #[tokio::test]
    async fn stores_gif_under_posts_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = MediaStorage::new(dir.path().to_path_buf()).expect("storage");

        let path = storage
            .store_image("small.gif", Bytes::from_static(SMALL_GIF))
            .await
            .expect("stored");
        assert_eq!(path, "posts/small.gif");

        let second = storage
            .store_image("small.gif", Bytes::from_static(SMALL_GIF))
            .await
            .expect("stored again");
        assert_ne!(second, path);
        assert!(second.starts_with("posts/small_"));
        assert!(second.ends_with(".gif"));

        let read = storage.read(&path).await.expect("readable");
        assert_eq!(read.as_ref(), SMALL_GIF);
    }

    #[tokio::test]
    async fn rejects_non_images_and_empty_payloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = MediaStorage::new(dir.path().to_path_buf()).expect("storage");

        let err = storage
            .store_image("notes.txt", Bytes::from_static(b"plain text, not an image"))
            .await
            .expect_err("text rejected");
        assert!(matches!(err, UploadStorageError::NotAnImage));

        let err = storage
            .store_image("empty.gif", Bytes::new())
            .await
            .expect_err("empty rejected");
        assert!(matches!(err, UploadStorageError::EmptyPayload));
    }

    #[tokio::test]
    async fn read_rejects_traversal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = MediaStorage::new(dir.path().to_path_buf()).expect("storage");

        for path in ["../secret", "/etc/passwd", "posts/../../x", ""] {
            let err = storage.read(path).await.expect_err("rejected");
            assert!(matches!(err, UploadStorageError::InvalidPath), "{path}");
        }
    }

    #[tokio::test]
    async fn read_treats_directories_and_missing_files_as_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = MediaStorage::new(dir.path().to_path_buf()).expect("storage");

        for path in ["posts", "posts/", "posts/absent.gif"] {
            let err = storage.read(path).await.expect_err("not a file");
            assert!(matches!(err, UploadStorageError::NotFound), "{path}");
        }
    }

    #[tokio::test]
    async fn image_store_maps_validation_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = MediaStorage::new(dir.path().to_path_buf()).expect("storage");

        assert!(storage.check(SMALL_GIF).is_ok());
        assert!(matches!(storage.check(&[]), Err(ImageStoreError::Empty)));
        assert!(matches!(
            storage.check(b"plain text"),
            Err(ImageStoreError::NotAnImage)
        ));

        let path = storage
            .store("small.gif", Bytes::from_static(SMALL_GIF))
            .await
            .expect("stored");
        assert_eq!(path, "posts/small.gif");
    }
}
