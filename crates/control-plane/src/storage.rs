//! Object-store client used to upload deployable packages.

use std::time::Duration;

use async_trait::async_trait;
use monitor::{ArtifactLocation, ArtifactStore, ServiceError};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{info, instrument};

use crate::client::check_status;
use crate::config::StorageConfig;
use crate::error::{ControlPlaneError, ControlPlaneResult};

/// Uploads objects with `PUT {url}/{bucket}/{key}`.
#[derive(Debug, Clone)]
pub struct ObjectStoreClient {
    client: Client,
    base_url: String,
}

impl ObjectStoreClient {
    pub fn new(config: &StorageConfig) -> ControlPlaneResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ControlPlaneError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_owned(),
        })
    }

    #[instrument(skip_all, fields(location = %location, bytes = body.len()))]
    pub async fn upload(&self, location: &ArtifactLocation, body: Vec<u8>) -> ControlPlaneResult<()> {
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            location.bucket,
            location.key.trim_start_matches('/')
        );
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "application/zip")
            .body(body)
            .send()
            .await?;
        check_status(response).await?;
        info!("package uploaded");
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for ObjectStoreClient {
    async fn put(&self, location: &ArtifactLocation, body: Vec<u8>) -> Result<(), ServiceError> {
        self.upload(location, body)
            .await
            .map_err(|e| e.into_service_error("put"))
    }
}
