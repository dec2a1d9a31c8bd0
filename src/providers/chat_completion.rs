use crate::config::LlmConfig;
use crate::error::ExtractionError;
use crate::providers::{build_user_message, parse_medications, LlmProvider, MEDICATION_EXTRACTION_PROMPT};
use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Fixed so that identical text always yields the same extraction.
const TEMPERATURE: f32 = 0.0;

/// Client for OpenAI-compatible `/v1/chat/completions` endpoints
/// (OpenRouter, OpenAI, or a local proxy).
pub struct ChatCompletionProvider {
    name: String,
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    referer: Option<String>,
    title: Option<String>,
}

impl ChatCompletionProvider {
    /// Create a provider from configuration and an already resolved credential.
    pub fn new(
        name: &str,
        config: &LlmConfig,
        api_key: String,
        default_base_url: &str,
    ) -> Result<Self, ExtractionError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url.to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ExtractionError::NetworkError(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(ChatCompletionProvider {
            name: name.to_string(),
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            referer: config.referer.clone(),
            title: config.title.clone(),
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(
        api_key: String,
        base_url: String,
        model: String,
    ) -> Result<Self, ExtractionError> {
        let config = LlmConfig {
            model,
            base_url: Some(base_url),
            ..LlmConfig::default()
        };
        Self::new("openrouter", &config, api_key, OPENROUTER_BASE_URL)
    }

    fn request_body(&self, text: &str) -> Value {
        json!({
            "model": self.model,
            "temperature": TEMPERATURE,
            "max_tokens": self.max_tokens,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": MEDICATION_EXTRACTION_PROMPT},
                {"role": "user", "content": build_user_message(text)}
            ]
        })
    }
}

#[async_trait]
impl LlmProvider for ChatCompletionProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn extract_medications(&self, text: &str) -> Result<Vec<String>, ExtractionError> {
        let mut request = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(text));

        if let Some(referer) = &self.referer {
            request = request.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.title {
            request = request.header("X-Title", title);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExtractionError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("{} responded with {}: {}", self.name, status, body);
            return Err(match status {
                StatusCode::UNAUTHORIZED => ExtractionError::Unauthorized,
                StatusCode::TOO_MANY_REQUESTS => ExtractionError::RateLimited,
                _ => ExtractionError::ServiceError {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let response_body: Value = response.json().await?;
        debug!("{:?}", response_body);

        let content = response_body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                ExtractionError::MalformedResponse(
                    "response has no choices[0].message.content".to_string(),
                )
            })?;

        parse_medications(content)
    }
}
