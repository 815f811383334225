use crate::config::StoreConfig;
use crate::error::AppError;

/// Blob store client. Objects live at `storage/v1/object/{bucket}/{path}`;
/// the public retrieval URL is a deterministic transformation of bucket+path.
pub struct BlobStore {
    http: reqwest::Client,
    config: Option<StoreConfig>,
}

impl BlobStore {
    pub fn new(config: Option<StoreConfig>, timeout_secs: u64) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_secs))
                .build()
                .expect("Failed to build reqwest client"),
            config,
        }
    }

    fn config(&self) -> Result<&StoreConfig, AppError> {
        self.config
            .as_ref()
            .ok_or_else(|| AppError::Configuration("remote store credentials not set".to_string()))
    }

    pub fn public_url(&self, bucket: &str, path: &str) -> Result<String, AppError> {
        let cfg = self.config()?;
        Ok(format!("{}/storage/v1/object/public/{bucket}/{path}", cfg.url))
    }

    /// Store bytes at `bucket/path` and return the public URL.
    ///
    /// If the destination bucket does not exist yet, one best-effort
    /// create-bucket-then-retry pass is attempted before giving up.
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError> {
        match self.put_object(bucket, path, bytes.clone(), content_type).await {
            Ok(()) => self.public_url(bucket, path),
            Err(first) => {
                tracing::warn!("Upload to {bucket}/{path} failed, trying to create bucket: {first}");
                self.create_bucket(bucket).await?;
                self.put_object(bucket, path, bytes, content_type).await?;
                self.public_url(bucket, path)
            }
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError> {
        let cfg = self.config()?;
        let url = format!("{}/storage/v1/object/{bucket}/{path}", cfg.url);

        let resp = self
            .http
            .put(&url)
            .header("apikey", &cfg.key)
            .bearer_auth(&cfg.key)
            .header("Content-Type", content_type.to_string())
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::RemoteStore {
                status: 0,
                body: e.to_string(),
                url: url.clone(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::RemoteStore {
                status: status.as_u16(),
                body: text,
                url,
            });
        }
        Ok(())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), AppError> {
        let cfg = self.config()?;
        let url = format!("{}/storage/v1/bucket", cfg.url);

        let resp = self
            .http
            .post(&url)
            .header("apikey", &cfg.key)
            .bearer_auth(&cfg.key)
            .json(&serde_json::json!({ "name": bucket, "public": true }))
            .send()
            .await
            .map_err(|e| AppError::RemoteStore {
                status: 0,
                body: e.to_string(),
                url: url.clone(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::RemoteStore {
                status: status.as_u16(),
                body: format!("bucket create failed: {text}"),
                url,
            });
        }
        tracing::info!("Created bucket {bucket}");
        Ok(())
    }
}
