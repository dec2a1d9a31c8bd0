use crate::config::LlmConfig;
use crate::providers::{ChatCompletionProvider, LlmProvider, OPENAI_BASE_URL, OPENROUTER_BASE_URL};
use log::{info, warn};
use std::sync::Arc;

pub struct ProviderFactory;

impl ProviderFactory {
    /// Create the configured provider.
    ///
    /// Returns `Ok(None)` when no credential is available, so the pipeline can
    /// still run on keyword extraction.
    pub fn create(config: &LlmConfig) -> Result<Option<Arc<dyn LlmProvider>>, String> {
        let (env_var, default_base_url) = match config.provider.as_str() {
            "openrouter" => ("OPENROUTER_API_KEY", OPENROUTER_BASE_URL),
            "openai" => ("OPENAI_API_KEY", OPENAI_BASE_URL),
            other => {
                return Err(format!(
                    "Unknown provider: {} (available: {})",
                    other,
                    Self::available_providers().join(", ")
                ))
            }
        };

        // Try config first, then fall back to environment variable
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(env_var).ok())
            .filter(|key| !key.trim().is_empty());

        let Some(api_key) = api_key else {
            warn!(
                "{} not found in config or environment; medication extraction will use keyword matching only",
                env_var
            );
            return Ok(None);
        };

        info!(
            "Using LLM provider '{}' with model '{}'",
            config.provider, config.model
        );
        let provider =
            ChatCompletionProvider::new(&config.provider, config, api_key, default_base_url)
                .map_err(|e| e.to_string())?;
        Ok(Some(Arc::new(provider)))
    }

    /// List all available provider names
    pub fn available_providers() -> Vec<&'static str> {
        vec!["openrouter", "openai"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key(provider: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            api_key: Some("test-key".to_string()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_create_openrouter_provider() {
        let provider = ProviderFactory::create(&config_with_key("openrouter"))
            .unwrap()
            .unwrap();
        assert_eq!(provider.provider_name(), "openrouter");
    }

    #[test]
    fn test_create_openai_provider() {
        let provider = ProviderFactory::create(&config_with_key("openai"))
            .unwrap()
            .unwrap();
        assert_eq!(provider.provider_name(), "openai");
    }

    #[test]
    fn test_create_unknown_provider() {
        let result = ProviderFactory::create(&config_with_key("unknown"));
        match result {
            Err(e) => {
                assert!(e.contains("Unknown provider"));
                assert!(e.contains("openrouter, openai"));
            }
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let mut config = config_with_key("openrouter");
        config.api_key = Some("   ".to_string());
        // Only meaningful when the environment does not provide a key
        if std::env::var("OPENROUTER_API_KEY").is_err() {
            assert!(ProviderFactory::create(&config).unwrap().is_none());
        }
    }

    #[test]
    fn test_available_providers() {
        let providers = ProviderFactory::available_providers();
        assert_eq!(providers, vec!["openrouter", "openai"]);
    }
}
