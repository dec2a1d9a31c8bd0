mod chat_completion;
mod factory;
mod prompt;
mod response;

pub use chat_completion::{ChatCompletionProvider, OPENAI_BASE_URL, OPENROUTER_BASE_URL};
pub use factory::ProviderFactory;
pub use prompt::{build_user_message, MEDICATION_EXTRACTION_PROMPT};
pub use response::parse_medications;

use crate::error::ExtractionError;
use async_trait::async_trait;

/// Unified trait for all LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "openrouter", "openai")
    fn provider_name(&self) -> &str;

    /// Extract medication names from raw prescription text.
    ///
    /// Returned names are trimmed, non-empty, and unique case-insensitively.
    async fn extract_medications(&self, text: &str) -> Result<Vec<String>, ExtractionError>;
}
