// src/media/mod.rs

pub mod refs;

pub use self::refs::{extract_media_ids, removed_media, removed_media_keeping};

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::presigning::PresigningConfig;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::MediaError;
use crate::models::{Media, MediaAccess, new_id};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    pub media_id: String,
    pub upload_url: String,
}

/// Remote media hosting. Uploads go straight from the browser to a presigned URL;
/// `seal` moves the upload into place once the owning document is saved.
///
/// Every object belongs to one tenant. `seal` and `delete` only see media stored
/// under the given `domain`; ids owned by another tenant behave as missing.
#[async_trait]
pub trait MediaService: Send + Sync {
    async fn presigned_upload(&self, domain: &str, file_name: &str) -> Result<PresignedUpload, MediaError>;

    async fn seal(&self, domain: &str, media_id: &str) -> Result<Media, MediaError>;

    /// Returns false when `domain` has nothing stored under `media_id`.
    async fn delete(&self, domain: &str, media_id: &str) -> Result<bool, MediaError>;
}

/// Deletes media, logging instead of failing. A broken media host must not stop
/// the caller's cleanup.
pub async fn delete_media_quietly(media: &dyn MediaService, domain: &str, media_id: &str) {
    match media.delete(domain, media_id).await {
        Ok(true) => log::info!("media deleted domain={domain} media_id={media_id}"),
        Ok(false) => log::warn!("media not found domain={domain} media_id={media_id}"),
        Err(e) => log::error!("media delete failed domain={domain} media_id={media_id}: {e}"),
    }
}

fn is_key_segment(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Key prefix of a tenant's sealed media: `<domain>/<mediaId>/`.
/// Uploads waiting to be sealed live under `tmp/` plus the same prefix.
pub fn media_prefix(domain: &str, media_id: &str) -> Result<String, MediaError> {
    if !is_key_segment(domain) || !is_key_segment(media_id) {
        return Err(MediaError::NotFound(media_id.to_string()));
    }
    Ok(format!("{domain}/{media_id}/"))
}

pub fn build_public_url(base: &str, bucket: &str, key: &str) -> String {
    let trimmed = base.trim_end_matches('/');

    // Simple templating: https://host/{bucket}/{key} or https://bucket.host/{key}
    if trimmed.contains("{bucket}") || trimmed.contains("{key}") {
        return trimmed.replace("{bucket}", bucket).replace("{key}", key);
    }

    if trimmed.contains(bucket) {
        format!("{}/{}", trimmed, key)
    } else {
        format!("{}/{}/{}", trimmed, bucket, key)
    }
}

fn extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin")
        .to_ascii_lowercase()
}

fn mime_type(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Objects live at `<domain>/<mediaId>/main.<ext>`; fresh uploads at
/// `tmp/<domain>/<mediaId>/main.<ext>`.
pub struct S3MediaService {
    client: S3Client,
    bucket: String,
    public_base_url: String,
    presign_expiry: Duration,
}

impl S3MediaService {
    pub fn new(client: S3Client, bucket: String, public_base_url: String, presign_expiry: Duration) -> Self {
        Self {
            client,
            bucket,
            public_base_url,
            presign_expiry,
        }
    }

    async fn keys_under(&self, prefix: &str) -> Result<Vec<(String, Option<i64>)>, MediaError> {
        let listed = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .send()
            .await
            .map_err(|e| MediaError::Storage(e.to_string()))?;

        Ok(listed
            .contents()
            .iter()
            .filter_map(|o| o.key().map(|k| (k.to_string(), o.size())))
            .collect())
    }
}

#[async_trait]
impl MediaService for S3MediaService {
    async fn presigned_upload(&self, domain: &str, file_name: &str) -> Result<PresignedUpload, MediaError> {
        let media_id = new_id();
        let ext = extension(file_name);
        let key = format!("tmp/{}main.{ext}", media_prefix(domain, &media_id)?);

        let config = PresigningConfig::expires_in(self.presign_expiry)
            .map_err(|e| MediaError::Presign(e.to_string()))?;
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(mime_type(&ext))
            .metadata("domain", domain)
            .presigned(config)
            .await
            .map_err(|e| MediaError::Presign(e.to_string()))?;

        log::info!("media presigned domain={domain} media_id={media_id}");
        Ok(PresignedUpload {
            media_id,
            upload_url: request.uri().to_string(),
        })
    }

    async fn seal(&self, domain: &str, media_id: &str) -> Result<Media, MediaError> {
        let prefix = media_prefix(domain, media_id)?;
        let uploaded = self.keys_under(&format!("tmp/{prefix}")).await?;
        let Some((tmp_key, size)) = uploaded.into_iter().next() else {
            return Err(MediaError::NotFound(media_id.to_string()));
        };

        let file_name = tmp_key.rsplit('/').next().unwrap_or("main.bin").to_string();
        let final_key = format!("{prefix}{file_name}");

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, tmp_key))
            .key(&final_key)
            .send()
            .await
            .map_err(|e| MediaError::Storage(e.to_string()))?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&tmp_key)
            .send()
            .await
            .map_err(|e| MediaError::Storage(e.to_string()))?;

        let ext = extension(&file_name);
        Ok(Media {
            media_id: media_id.to_string(),
            original_file_name: Some(file_name),
            mime_type: Some(mime_type(&ext).to_string()),
            size,
            access: MediaAccess::Public,
            file: Some(build_public_url(&self.public_base_url, &self.bucket, &final_key)),
            thumbnail: None,
            caption: None,
        })
    }

    async fn delete(&self, domain: &str, media_id: &str) -> Result<bool, MediaError> {
        let Ok(prefix) = media_prefix(domain, media_id) else {
            return Ok(false);
        };
        let mut found = false;
        for prefix in [prefix.clone(), format!("tmp/{prefix}")] {
            for (key, _) in self.keys_under(&prefix).await? {
                self.client
                    .delete_object()
                    .bucket(&self.bucket)
                    .key(&key)
                    .send()
                    .await
                    .map_err(|e| MediaError::Storage(e.to_string()))?;
                found = true;
            }
        }
        Ok(found)
    }
}
