//! Photo storage using Cloudflare R2
//!
//! Handles upload, delete, and URL derivation for photo blobs.
//! Files are served via R2 Custom Domain (CDN); thumbnails are
//! derived with Cloudflare image-resizing URL prefixes rather than
//! stored separately.

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;

use crate::error::AppError;

/// Key prefix for photo blobs inside the bucket
const PHOTO_KEY_PREFIX: &str = "photos";

/// Result of a successful blob upload
#[derive(Debug, Clone)]
pub struct UploadedBlob {
    /// Blob id, echoing the requested id
    pub stored_id: String,
    /// Public URL of the full-size photo
    pub secure_url: String,
}

/// Media gateway contract
///
/// Blob ids are the post filenames; key layout inside the bucket is
/// an implementation detail of the gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaGateway: Send + Sync {
    /// Upload a blob under the desired id.
    ///
    /// Overwrites any existing blob with the same id (used by the
    /// in-place photo replacement on post update).
    async fn upload(
        &self,
        data: Vec<u8>,
        content_type: &str,
        desired_id: &str,
    ) -> Result<UploadedBlob, AppError>;

    /// Derive the thumbnail URL for a stored blob.
    fn thumbnail_url(&self, stored_id: &str) -> String;

    /// Delete a stored blob.
    async fn delete(&self, stored_id: &str) -> Result<(), AppError>;
}

/// Media storage service
///
/// Uploads photos to Cloudflare R2 and returns public URLs.
pub struct MediaStorage {
    /// S3-compatible client for R2
    client: S3Client,
    /// Media bucket name
    bucket: String,
    /// Public URL base (Custom Domain)
    /// e.g., "https://media.picturesque.example"
    public_url: String,
    /// `cdn-cgi/image` options for thumbnail derivation
    thumbnail_transform: String,
}

impl MediaStorage {
    /// Create new media storage client
    ///
    /// # Errors
    /// Returns error if S3 client initialization fails
    pub async fn new(
        config: &crate::config::MediaStorageConfig,
        cloudflare: &crate::config::CloudflareConfig,
    ) -> Result<Self, AppError> {
        use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};

        // R2 endpoint: https://{account_id}.r2.cloudflarestorage.com
        let endpoint = format!("https://{}.r2.cloudflarestorage.com", cloudflare.account_id);

        let credentials = Credentials::new(
            &cloudflare.r2_access_key_id,
            &cloudflare.r2_secret_access_key,
            None,
            None,
            "picturesque-r2",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .endpoint_url(&endpoint)
            .credentials_provider(credentials)
            .http_client(super::build_r2_http_client())
            .build();

        let client = S3Client::from_conf(s3_config);

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            public_url: config.public_url.clone(),
            thumbnail_transform: config.thumbnail_transform.clone(),
        })
    }

    fn photo_key(&self, stored_id: &str) -> String {
        format!("{}/{}", PHOTO_KEY_PREFIX, stored_id)
    }

    /// Get public URL for an S3 key
    fn public_url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}

#[async_trait]
impl MediaGateway for MediaStorage {
    async fn upload(
        &self,
        data: Vec<u8>,
        content_type: &str,
        desired_id: &str,
    ) -> Result<UploadedBlob, AppError> {
        use aws_sdk_s3::primitives::ByteStream;

        use crate::metrics::{MEDIA_BYTES_UPLOADED, MEDIA_UPLOADS_TOTAL};

        let key = self.photo_key(desired_id);
        let byte_count = data.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .cache_control("public, max-age=31536000") // 1 year
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("R2 upload failed: {}", e)))?;

        MEDIA_UPLOADS_TOTAL.inc();
        MEDIA_BYTES_UPLOADED.inc_by(byte_count as f64);

        Ok(UploadedBlob {
            stored_id: desired_id.to_string(),
            secure_url: self.public_url_for(&key),
        })
    }

    /// Thumbnail URL via Cloudflare image resizing
    ///
    /// e.g., `https://media.example/cdn-cgi/image/width=150,height=120,fit=crop/photos/{id}`
    fn thumbnail_url(&self, stored_id: &str) -> String {
        format!(
            "{}/cdn-cgi/image/{}/{}",
            self.public_url,
            self.thumbnail_transform,
            self.photo_key(stored_id)
        )
    }

    async fn delete(&self, stored_id: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.photo_key(stored_id))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("R2 delete failed: {}", e)))?;

        Ok(())
    }
}
