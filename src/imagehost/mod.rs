use serde::Deserialize;
use thiserror::Error;

use crate::config::ImageHostConfig;

#[derive(Debug, Error)]
pub enum ImageHostError {
    #[error("image host not configured")]
    NotConfigured,

    #[error("image host rejected upload: {0}")]
    Rejected(String),

    #[error("image host returned no secure_url")]
    MissingUrl,

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

/// Client for the external image host. The service stores only the stable
/// HTTPS URL the host returns, never the bytes.
pub struct ImageHost {
    client: reqwest::Client,
    upload_url: Option<String>,
    upload_preset: String,
}

impl ImageHost {
    pub fn from_config(config: &ImageHostConfig) -> Self {
        let upload_url = if config.cloud_name.is_empty() {
            None
        } else {
            Some(format!(
                "https://api.cloudinary.com/v1_1/{}/image/upload",
                config.cloud_name
            ))
        };

        Self {
            client: reqwest::Client::new(),
            upload_url,
            upload_preset: config.upload_preset.clone(),
        }
    }

    /// Upload image bytes with the unsigned preset and return the CDN URL.
    pub async fn upload(&self, bytes: Vec<u8>) -> Result<String, ImageHostError> {
        let upload_url = self.upload_url.as_ref().ok_or(ImageHostError::NotConfigured)?;

        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(bytes))
            .text("upload_preset", self.upload_preset.clone());

        let response = self
            .client
            .post(upload_url)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ImageHostError::Rejected(format!("{}: {}", status, body)));
        }

        let parsed: UploadResponse = response.json().await?;
        parsed.secure_url.ok_or(ImageHostError::MissingUrl)
    }
}
