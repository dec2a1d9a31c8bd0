use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use super::stock::StockValidator;
use crate::config::{AppConfig, FallbackPolicy};
use crate::error::{ExtractionError, NormalizeError};
use crate::extractors::{dedupe_names, KeywordExtractor, NameExtractor};
use crate::model::{NormalizationOutcome, StockCheck};
use crate::providers::LlmProvider;
use crate::store::MedicationStore;

const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 8;

/// Why the LLM path produced nothing usable.
#[derive(Debug)]
enum LlmMiss {
    Failed(ExtractionError),
    Empty,
}

impl LlmMiss {
    fn fallback_note(&self) -> &'static str {
        match self {
            LlmMiss::Failed(ExtractionError::MissingCredentials | ExtractionError::Unauthorized) => {
                "Usado método alternativo por error de autenticación con IA"
            }
            LlmMiss::Failed(ExtractionError::RateLimited) => {
                "Usado método alternativo por límite de solicitudes a IA"
            }
            LlmMiss::Failed(_) => "Usado método alternativo porque la IA no respondió correctamente",
            LlmMiss::Empty => "Usado método alternativo porque la IA no identificó medicamentos",
        }
    }
}

/// Prescription normalization: LLM extraction, keyword fallback,
/// deduplication, and per-name stock validation.
pub struct Normalizer {
    provider: Option<Arc<dyn LlmProvider>>,
    fallback: Arc<dyn NameExtractor>,
    stock: StockValidator,
    policy: FallbackPolicy,
    llm_timeout: Duration,
}

impl Normalizer {
    /// Normalizer with no LLM provider, the default keyword lexicon, and
    /// default timeouts.
    pub fn new(store: Arc<dyn MedicationStore>) -> Self {
        Normalizer {
            provider: None,
            fallback: Arc::new(KeywordExtractor::default()),
            stock: StockValidator::new(store, DEFAULT_LOOKUP_TIMEOUT, DEFAULT_MAX_CONCURRENT_LOOKUPS),
            policy: FallbackPolicy::default(),
            llm_timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        provider: Option<Arc<dyn LlmProvider>>,
        store: Arc<dyn MedicationStore>,
    ) -> Self {
        let stock = StockValidator::new(
            store,
            Duration::from_millis(config.pipeline.lookup_timeout_ms),
            config.pipeline.max_concurrent_lookups,
        );
        Normalizer {
            provider,
            fallback: Arc::new(KeywordExtractor::default()),
            stock,
            policy: config.pipeline.fallback,
            llm_timeout: Duration::from_secs(config.llm.timeout_secs),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_fallback_extractor(mut self, extractor: Arc<dyn NameExtractor>) -> Self {
        self.fallback = extractor;
        self
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_stock_validator(mut self, stock: StockValidator) -> Self {
        self.stock = stock;
        self
    }

    pub fn stock(&self) -> &StockValidator {
        &self.stock
    }

    /// Run the full pipeline on raw prescription text.
    ///
    /// LLM failures never escape as errors of their own: they turn into a
    /// fallback `note` or into one of the [`NormalizeError`] conditions.
    pub async fn normalize(&self, text: &str) -> Result<NormalizationOutcome, NormalizeError> {
        if text.trim().is_empty() {
            return Err(NormalizeError::MissingInput);
        }
        info!("Normalizing prescription text: \"{}...\"", preview(text, 50));

        let (names, note) = self.extract_names(text).await?;
        let normalized_names = dedupe_names(names);
        if normalized_names.is_empty() {
            info!("No valid medications found in text");
            return Err(NormalizeError::NoMedicationsFound);
        }
        info!("Medications extracted: {:?}", normalized_names);

        let results = self.stock.validate(&normalized_names).await;

        Ok(NormalizationOutcome {
            normalized_names,
            results,
            note: note.map(str::to_string),
        })
    }

    /// Purchase availability for each name, one entry per input name.
    pub async fn check_stock(&self, names: &[String]) -> Vec<StockCheck> {
        self.stock.check(names).await
    }

    async fn extract_names(
        &self,
        text: &str,
    ) -> Result<(Vec<String>, Option<&'static str>), NormalizeError> {
        let miss = match self.call_provider(text).await {
            Ok(names) if !names.is_empty() => return Ok((names, None)),
            Ok(_) => LlmMiss::Empty,
            Err(e) => LlmMiss::Failed(e),
        };

        match (self.policy, &miss) {
            (FallbackPolicy::Uniform, _) => {
                warn!("LLM extraction unusable ({:?}); trying keyword extraction", miss);
                let names = self.fallback.extract(text);
                if names.is_empty() {
                    return Err(NormalizeError::NoMedicationsFound);
                }
                Ok((names, Some(miss.fallback_note())))
            }
            (FallbackPolicy::AuthAndRateLimit, LlmMiss::Empty) => {
                Err(NormalizeError::NoMedicationsFound)
            }
            (FallbackPolicy::AuthAndRateLimit, LlmMiss::Failed(e)) if e.is_access_denied() => {
                warn!("LLM access denied ({}); trying keyword extraction", e);
                let names = self.fallback.extract(text);
                if names.is_empty() {
                    return Err(NormalizeError::ServiceUnavailable(
                        unavailable_message(e).to_string(),
                    ));
                }
                Ok((names, Some(miss.fallback_note())))
            }
            (FallbackPolicy::AuthAndRateLimit, LlmMiss::Failed(e)) => {
                warn!("LLM extraction failed: {}", e);
                Err(NormalizeError::Internal(internal_message(e).to_string()))
            }
        }
    }

    async fn call_provider(&self, text: &str) -> Result<Vec<String>, ExtractionError> {
        let Some(provider) = &self.provider else {
            return Err(ExtractionError::MissingCredentials);
        };

        info!("Requesting medication extraction from {}", provider.provider_name());
        match tokio::time::timeout(self.llm_timeout, provider.extract_medications(text)).await {
            Ok(result) => result,
            Err(_) => Err(ExtractionError::NetworkError(format!(
                "no response within {:?}",
                self.llm_timeout
            ))),
        }
    }
}

fn unavailable_message(error: &ExtractionError) -> &'static str {
    match error {
        ExtractionError::RateLimited => {
            "Límite de solicitudes a la IA excedido. Intente de nuevo más tarde."
        }
        _ => "Error de autenticación con la IA. Verificar la clave API.",
    }
}

fn internal_message(error: &ExtractionError) -> &'static str {
    match error {
        ExtractionError::MalformedResponse(_) => {
            "La IA no devolvió JSON válido de medicamentos."
        }
        ExtractionError::NetworkError(_) | ExtractionError::ServiceError { .. } => {
            "Error al comunicarse con la IA."
        }
        _ => "Error interno en normalización",
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MedicationRecord;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider returning a canned result and counting calls.
    struct ScriptedProvider {
        reply: fn() -> Result<Vec<String>, ExtractionError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(reply: fn() -> Result<Vec<String>, ExtractionError>) -> Arc<Self> {
            Arc::new(ScriptedProvider {
                reply,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn extract_medications(&self, _text: &str) -> Result<Vec<String>, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            (self.reply)()
        }
    }

    fn store() -> Arc<dyn MedicationStore> {
        Arc::new(InMemoryStore::new(vec![
            MedicationRecord::new("Paracetamol 500mg", 10, 2.5, "Genfar"),
            MedicationRecord::new("Amoxicilina 500mg", 4, 7.8, "La Santé"),
        ]))
    }

    fn normalizer(provider: Arc<ScriptedProvider>) -> Normalizer {
        Normalizer::new(store()).with_provider(provider)
    }

    fn owned(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_llm_names_are_deduped_and_validated() {
        let provider = ScriptedProvider::new(|| Ok(owned(&["Amoxicilina", "amoxicilina", "Paracetamol"])));
        let outcome = normalizer(provider).normalize("receta").await.unwrap();

        assert_eq!(outcome.normalized_names, vec!["Amoxicilina", "Paracetamol"]);
        assert_eq!(outcome.results.len(), outcome.normalized_names.len());
        for (result, name) in outcome.results.iter().zip(&outcome.normalized_names) {
            assert!(result.name.eq_ignore_ascii_case(name));
            assert!(result.available);
        }
        assert!(outcome.note.is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_falls_back_to_keywords() {
        let provider = ScriptedProvider::new(|| Err(ExtractionError::Unauthorized));
        let outcome = normalizer(provider)
            .normalize("Paracetamol 500mg, Ibuprofeno 400mg")
            .await
            .unwrap();

        assert_eq!(outcome.normalized_names, vec!["Paracetamol", "Ibuprofeno"]);
        assert!(outcome.note.as_deref().is_some_and(|n| !n.is_empty()));
        assert!(outcome.results[0].available);
        assert!(!outcome.results[1].available);
    }

    #[tokio::test]
    async fn test_missing_provider_uses_keywords() {
        let outcome = Normalizer::new(store())
            .normalize("Tomar Amoxicilina cada 8 horas")
            .await
            .unwrap();
        assert_eq!(outcome.normalized_names, vec!["Amoxicilina"]);
        assert!(outcome.note.unwrap().contains("autenticación"));
    }

    #[tokio::test]
    async fn test_uniform_policy_covers_every_failure() {
        let failures: [fn() -> Result<Vec<String>, ExtractionError>; 4] = [
            || Err(ExtractionError::RateLimited),
            || Err(ExtractionError::ServiceError { status: 500, body: String::new() }),
            || Err(ExtractionError::MalformedResponse("x".to_string())),
            || Err(ExtractionError::NetworkError("down".to_string())),
        ];
        for reply in failures {
            let outcome = normalizer(ScriptedProvider::new(reply))
                .normalize("paracetamol 1g")
                .await
                .unwrap();
            assert_eq!(outcome.normalized_names, vec!["Paracetamol"]);
            assert!(outcome.note.is_some());
        }
    }

    #[tokio::test]
    async fn test_empty_llm_result_falls_back() {
        let provider = ScriptedProvider::new(|| Ok(Vec::new()));
        let outcome = normalizer(provider).normalize("Omeprazol 20mg").await.unwrap();
        assert_eq!(outcome.normalized_names, vec!["Omeprazol"]);
        assert!(outcome.note.is_some());
    }

    #[tokio::test]
    async fn test_nothing_recognizable_is_no_medications_found() {
        let provider = ScriptedProvider::new(|| Err(ExtractionError::NetworkError("down".to_string())));
        let err = normalizer(provider)
            .normalize("Dr. Juan Pérez, control en 15 días")
            .await
            .unwrap_err();
        assert_eq!(err, NormalizeError::NoMedicationsFound);
    }

    #[tokio::test]
    async fn test_empty_text_is_missing_input() {
        let provider = ScriptedProvider::new(|| Ok(owned(&["Paracetamol"])));
        let normalizer = normalizer(Arc::clone(&provider));
        assert_eq!(normalizer.normalize("").await.unwrap_err(), NormalizeError::MissingInput);
        assert_eq!(normalizer.normalize("  \n").await.unwrap_err(), NormalizeError::MissingInput);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_legacy_policy() {
        let legacy = |reply: fn() -> Result<Vec<String>, ExtractionError>| {
            normalizer(ScriptedProvider::new(reply)).with_policy(FallbackPolicy::AuthAndRateLimit)
        };

        let outcome = legacy(|| Err(ExtractionError::RateLimited))
            .normalize("Paracetamol")
            .await
            .unwrap();
        assert!(outcome.note.unwrap().contains("límite"));

        let err = legacy(|| Err(ExtractionError::Unauthorized))
            .normalize("sin medicamentos")
            .await
            .unwrap_err();
        assert!(matches!(err, NormalizeError::ServiceUnavailable(_)));

        let err = legacy(|| Err(ExtractionError::MalformedResponse("x".to_string())))
            .normalize("Paracetamol")
            .await
            .unwrap_err();
        assert!(matches!(err, NormalizeError::Internal(_)));

        let err = legacy(|| Ok(Vec::new())).normalize("Paracetamol").await.unwrap_err();
        assert_eq!(err, NormalizeError::NoMedicationsFound);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out_into_fallback() {
        let provider = Arc::new(ScriptedProvider {
            reply: || Ok(owned(&["Amoxicilina"])),
            delay: Duration::from_millis(500),
            calls: AtomicUsize::new(0),
        });
        let outcome = normalizer(provider)
            .with_llm_timeout(Duration::from_millis(20))
            .normalize("Paracetamol 500mg")
            .await
            .unwrap();
        assert_eq!(outcome.normalized_names, vec!["Paracetamol"]);
        assert!(outcome.note.unwrap().contains("no respondió"));
    }

    #[tokio::test]
    async fn test_deterministic_ordering() {
        let provider = ScriptedProvider::new(|| Ok(owned(&["Paracetamol", "Amoxicilina", "PARACETAMOL"])));
        let normalizer = normalizer(provider);
        let first = normalizer.normalize("receta").await.unwrap();
        let second = normalizer.normalize("receta").await.unwrap();
        assert_eq!(first.normalized_names, second.normalized_names);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_custom_fallback_extractor() {
        struct Fixed;
        impl NameExtractor for Fixed {
            fn name(&self) -> &str {
                "fixed"
            }
            fn extract(&self, _text: &str) -> Vec<String> {
                vec!["Zzzyx".to_string()]
            }
        }

        let outcome = Normalizer::new(store())
            .with_fallback_extractor(Arc::new(Fixed))
            .normalize("cualquier texto")
            .await
            .unwrap();
        assert_eq!(outcome.normalized_names, vec!["Zzzyx"]);
        assert!(!outcome.results[0].available);
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("Ácido acetilsalicílico", 5), "Ácido");
    }
}
