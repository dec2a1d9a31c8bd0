use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};
use std::path::Path;
use tokio::fs;

use crate::config::OcrConfig;
use crate::error::OcrError;

const GOOGLE_VISION_BASE_URL: &str = "https://vision.googleapis.com";

/// Turns a prescription image into text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image_data: &[u8]) -> Result<String, OcrError>;
}

/// Performs OCR with the Google Cloud Vision `TEXT_DETECTION` feature
pub struct GoogleVisionOcr {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleVisionOcr {
    /// Create the engine from configuration, falling back to `GOOGLE_API_KEY`.
    ///
    /// Returns `None` when no key is available.
    pub fn from_config(config: &OcrConfig) -> Option<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| GOOGLE_VISION_BASE_URL.to_string());

        Some(Self::with_base_url(api_key, base_url))
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        GoogleVisionOcr {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Performs OCR on an image file
    pub async fn recognize_file(&self, image_path: &Path) -> Result<String, OcrError> {
        let image_data = fs::read(image_path).await?;
        self.recognize(&image_data).await
    }
}

#[async_trait]
impl OcrEngine for GoogleVisionOcr {
    async fn recognize(&self, image_data: &[u8]) -> Result<String, OcrError> {
        if image_data.is_empty() {
            return Err(OcrError::InvalidImage("empty image".to_string()));
        }

        let request_body = json!({
            "requests": [{
                "image": {
                    "content": STANDARD.encode(image_data)
                },
                "features": [{
                    "type": "TEXT_DETECTION"
                }]
            }]
        });

        debug!("Sending OCR request to Google Vision API");

        let response = self
            .client
            .post(format!("{}/v1/images:annotate", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .header("Accept-Encoding", "identity")
            .json(&request_body)
            .send()
            .await?;

        // Check for HTTP errors
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::Api { status, body });
        }

        let response_body: Value = response.json().await?;

        // The API returns all detected text in the first annotation
        let text = response_body["responses"][0]["fullTextAnnotation"]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        if text.trim().is_empty() {
            return Err(OcrError::NoText);
        }

        debug!("Extracted text from image: {} characters", text.len());

        Ok(text)
    }
}

/// Decode an image sent as base64, accepting `data:` URLs from browsers.
pub fn decode_image(encoded: &str) -> Result<Vec<u8>, OcrError> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| OcrError::InvalidImage(e.to_string()))?;

    if bytes.is_empty() {
        return Err(OcrError::InvalidImage("empty image".to_string()));
    }
    Ok(bytes)
}
