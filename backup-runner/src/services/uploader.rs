//! Upload of backup archives to object storage.

use crate::config::S3Config;
use anyhow::Context;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::path::Path;

/// Remote folder every archive lands under.
const REMOTE_FOLDER: &str = "db-backups";

/// Destination for produced backup archives.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn put_archive(&self, archive: &Path, backup_id: &str) -> anyhow::Result<()>;
}

/// ArchiveStore backed by an S3-compatible bucket.
pub struct S3ArchiveStore {
    client: S3Client,
    bucket: String,
}

impl S3ArchiveStore {
    pub async fn from_config(config: &S3Config) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "backup-runner",
        );

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).credentials_provider(credentials);
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }

    fn object_key(backup_id: &str) -> String {
        format!("{}/backup_{}.gz", REMOTE_FOLDER, backup_id)
    }
}

#[async_trait]
impl ArchiveStore for S3ArchiveStore {
    async fn put_archive(&self, archive: &Path, backup_id: &str) -> anyhow::Result<()> {
        let key = Self::object_key(backup_id);

        let body = ByteStream::from_path(archive)
            .await
            .with_context(|| format!("Failed to open {} for upload", archive.display()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to upload s3://{}/{}", self.bucket, key))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_is_nested_under_remote_folder() {
        assert_eq!(
            S3ArchiveStore::object_key("2026-08-04_13-05"),
            "db-backups/backup_2026-08-04_13-05.gz"
        );
    }
}
