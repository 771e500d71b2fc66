use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{info, instrument, warn};

use gapakerem_core::repository::StoreError;
use gapakerem_core::storage::ObjectStore;

use crate::app_config::ObjectStoreConfig;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Image host speaking the Cloudinary signed-upload protocol
#[derive(Clone)]
pub struct CloudinaryStore {
    client: reqwest::Client,
    upload_url: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryStore {
    pub fn new(config: &ObjectStoreConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            upload_url: config.upload_url.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }
}

/// Hex SHA-256 over the alphabetically ordered `key=value` pairs followed by
/// the API secret
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn file_name_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "proof.png",
        _ => "proof.jpg",
    }
}

#[async_trait]
impl ObjectStore for CloudinaryStore {
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn upload(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        folder: &str,
    ) -> Result<String, StoreError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("folder", folder), ("timestamp", timestamp.as_str())],
            &self.api_secret,
        );

        let file = Part::bytes(bytes)
            .file_name(file_name_for(content_type))
            .mime_str(content_type)?;
        let form = Form::new()
            .part("file", file)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self.client.post(&self.upload_url).multipart(form).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Image upload rejected with status {}: {}", status, body);
            return Err(format!("image upload rejected with status {}", status).into());
        }

        let uploaded: UploadResponse = response.json().await?;
        info!("Uploaded image to {}", uploaded.secure_url);
        Ok(uploaded.secure_url)
    }
}
