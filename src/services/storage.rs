use std::path::{Path, PathBuf};

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};

/// Destination for rendered artifacts and uploads.
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    /// Idempotently prepare the destination before a write.
    async fn ensure_directory(&self) -> Result<(), StorageError>;

    /// Write `data` under `name`, replacing any previous object.
    async fn write(&self, name: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Public URL clients use to fetch `name`.
    fn public_url(&self, name: &str) -> String;
}

/// Filesystem directory exposed through the `/static` mount.
pub struct LocalDirStorage {
    root: PathBuf,
    url_prefix: String,
}

impl LocalDirStorage {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactStorage for LocalDirStorage {
    async fn ensure_directory(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn write(&self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        tokio::fs::write(self.root.join(name), data).await?;
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        join_url(&self.url_prefix, name)
    }
}

/// Cloudflare R2 bucket (S3-compatible).
pub struct R2Storage {
    bucket: Box<Bucket>,
    key_prefix: String,
    url_prefix: String,
}

impl R2Storage {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        key_prefix: &str,
        url_prefix: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self {
            bucket,
            key_prefix: key_prefix.trim_matches('/').to_string(),
            url_prefix: url_prefix.to_string(),
        })
    }

    fn key(&self, name: &str) -> String {
        if self.key_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.key_prefix, name)
        }
    }
}

#[async_trait]
impl ArtifactStorage for R2Storage {
    async fn ensure_directory(&self) -> Result<(), StorageError> {
        // Buckets have no directories.
        Ok(())
    }

    async fn write(&self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        let content_type = content_type_for(name);
        self.bucket
            .put_object_with_content_type(self.key(name), data, content_type)
            .await?;
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        join_url(&self.url_prefix, &self.key(name))
    }
}

/// Filename of the fallback AR model under the models directory.
pub const PLACEHOLDER_MODEL: &str = "room_default.glb";

/// Minimal glTF binary header: magic, version 2, total length 12.
const PLACEHOLDER_GLB: &[u8; 12] = b"glTF\x02\x00\x00\x00\x0c\x00\x00\x00";

/// Create the static directories and seed the placeholder AR model.
///
/// An existing model file is left untouched.
pub async fn prepare_static_tree(
    dirs: &[PathBuf],
    models_dir: &Path,
) -> Result<(), StorageError> {
    for dir in dirs.iter().map(PathBuf::as_path).chain([models_dir]) {
        tokio::fs::create_dir_all(dir).await?;
    }

    let model = models_dir.join(PLACEHOLDER_MODEL);
    if !tokio::fs::try_exists(&model).await? {
        tokio::fs::write(&model, PLACEHOLDER_GLB).await?;
        tracing::info!(path = %model.display(), "Wrote placeholder AR model");
    }
    Ok(())
}

fn join_url(prefix: &str, name: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), name)
}

fn content_type_for(name: &str) -> &'static str {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("glb") => "model/gltf-binary",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_write_creates_directory_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("renders");
        let storage = LocalDirStorage::new(&root, "http://localhost:8000/static/renders/");

        storage.ensure_directory().await.unwrap();
        storage.ensure_directory().await.unwrap();
        storage.write("job-1.png", b"ABC").await.unwrap();

        assert_eq!(std::fs::read(root.join("job-1.png")).unwrap(), b"ABC");
        assert_eq!(
            storage.public_url("job-1.png"),
            "http://localhost:8000/static/renders/job-1.png"
        );
    }

    #[tokio::test]
    async fn test_local_write_without_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalDirStorage::new(tmp.path().join("absent"), "http://x");
        assert!(matches!(
            storage.write("a.png", b"x").await,
            Err(StorageError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_prepare_static_tree_seeds_model_once() {
        let tmp = tempfile::tempdir().unwrap();
        let renders = tmp.path().join("renders");
        let uploads = tmp.path().join("uploads");
        let models = tmp.path().join("models");

        prepare_static_tree(&[renders.clone(), uploads.clone()], &models)
            .await
            .unwrap();

        assert!(renders.is_dir());
        assert!(uploads.is_dir());
        let model = models.join(PLACEHOLDER_MODEL);
        assert_eq!(std::fs::read(&model).unwrap(), PLACEHOLDER_GLB);

        std::fs::write(&model, b"real model").unwrap();
        prepare_static_tree(&[renders, uploads], &models).await.unwrap();
        assert_eq!(std::fs::read(&model).unwrap(), b"real model");
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("room_default.glb"), "model/gltf-binary");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }
}
