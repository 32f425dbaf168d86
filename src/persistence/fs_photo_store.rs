use crate::domain;
use crate::domain::subtask::driven_ports::PhotoStoreError;
use crate::domain::subtask::PhotoUpload;
use anyhow::Context;
use chrono::Utc;
use std::path::PathBuf;

/// The public path segment uploaded photos are served from
pub const PUBLIC_PHOTO_PATH: &str = "/uploads";

/// Filesystem-backed photo storage. Files land in the configured directory
/// under generated names and are served read-only at [PUBLIC_PHOTO_PATH].
pub struct FsPhotoStore {
    root: PathBuf,
}

impl FsPhotoStore {
    pub fn new(uploads_dir: &str) -> FsPhotoStore {
        FsPhotoStore {
            root: PathBuf::from(uploads_dir),
        }
    }
}

/// Maps an incoming content type to the stored file extension. Everything
/// outside this list is rejected before any bytes hit the disk.
fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpeg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Produces a collision-resistant file name: millisecond timestamp plus a
/// random hex suffix, keeping an extension matching the image type.
fn generate_file_name(extension: &str) -> String {
    format!(
        "{}-{:08x}.{}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>(),
        extension
    )
}

impl domain::subtask::driven_ports::PhotoStore for FsPhotoStore {
    async fn store_photo(&self, upload: &PhotoUpload) -> Result<String, PhotoStoreError> {
        let Some(extension) = extension_for(&upload.content_type) else {
            return Err(PhotoStoreError::UnsupportedType {
                content_type: upload.content_type.clone(),
            });
        };

        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating the uploads directory {}", self.root.display()))?;

        let file_name = generate_file_name(extension);
        let file_path = self.root.join(&file_name);
        tokio::fs::write(&file_path, &upload.bytes)
            .await
            .with_context(|| format!("writing a photo to {}", file_path.display()))?;

        Ok(format!("{PUBLIC_PHOTO_PATH}/{file_name}"))
    }
}
