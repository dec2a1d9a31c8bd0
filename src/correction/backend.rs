use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{LoopError, NormalizeError};
use crate::model::{NormalizationOutcome, StockCheck};
use crate::pipelines::Normalizer;

/// The two server operations the correction loop depends on.
#[async_trait]
pub trait ScanBackend: Send + Sync {
    async fn normalize(&self, text: &str) -> Result<NormalizationOutcome, LoopError>;

    async fn validate(&self, names: &[String]) -> Result<Vec<StockCheck>, LoopError>;
}

#[async_trait]
impl ScanBackend for Normalizer {
    async fn normalize(&self, text: &str) -> Result<NormalizationOutcome, LoopError> {
        Ok(Normalizer::normalize(self, text).await?)
    }

    async fn validate(&self, names: &[String]) -> Result<Vec<StockCheck>, LoopError> {
        Ok(self.check_stock(names).await)
    }
}

/// Talks to a running storefront server over HTTP.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        HttpBackend {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, LoopError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| LoopError::Backend(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| LoopError::Backend(e.to_string()));
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v["error"].as_str().map(str::to_string))
            .unwrap_or(text);
        Err(status_to_error(status, message))
    }
}

fn status_to_error(status: StatusCode, message: String) -> LoopError {
    match status {
        StatusCode::BAD_REQUEST => NormalizeError::MissingInput.into(),
        StatusCode::UNPROCESSABLE_ENTITY => NormalizeError::NoMedicationsFound.into(),
        StatusCode::SERVICE_UNAVAILABLE => NormalizeError::ServiceUnavailable(message).into(),
        s if s.is_server_error() => NormalizeError::Internal(message).into(),
        s => LoopError::Backend(format!("unexpected status {}: {}", s, message)),
    }
}

#[async_trait]
impl ScanBackend for HttpBackend {
    async fn normalize(&self, text: &str) -> Result<NormalizationOutcome, LoopError> {
        self.post("/normalizar-receta", &json!({ "texto": text })).await
    }

    async fn validate(&self, names: &[String]) -> Result<Vec<StockCheck>, LoopError> {
        self.post("/validar-stock", &json!({ "medicamentos": names })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_http_normalize() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/normalizar-receta")
            .match_body(Matcher::Json(json!({"texto": "Paracetamol 500mg"})))
            .with_status(200)
            .with_body(
                r#"{"normalizado":["Paracetamol"],"resultados":[{"nombre":"Paracetamol","disponible":true}]}"#,
            )
            .create_async()
            .await;

        let backend = HttpBackend::new(server.url());
        let outcome = backend.normalize("Paracetamol 500mg").await.unwrap();
        assert_eq!(outcome.normalized_names, vec!["Paracetamol"]);
        assert!(outcome.results[0].available);
        assert!(outcome.note.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_validate() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/validar-stock")
            .match_body(Matcher::Json(json!({"medicamentos": ["Aspirina", "Zzzyx"]})))
            .with_status(200)
            .with_body(
                r#"[{"nombre":"Aspirina","disponible":true},{"nombre":"Zzzyx","disponible":false}]"#,
            )
            .create_async()
            .await;

        let backend = HttpBackend::new(server.url());
        let checks = backend
            .validate(&["Aspirina".to_string(), "Zzzyx".to_string()])
            .await
            .unwrap();
        assert_eq!(checks.len(), 2);
        assert!(checks[0].available);
        assert!(!checks[1].available);
    }

    #[tokio::test]
    async fn test_http_error_statuses() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/normalizar-receta")
            .with_status(503)
            .with_body(r#"{"error":"Error de autenticación con la IA. Verificar la clave API."}"#)
            .create_async()
            .await;

        let backend = HttpBackend::new(server.url());
        match backend.normalize("x").await {
            Err(LoopError::Normalize(NormalizeError::ServiceUnavailable(msg))) => {
                assert!(msg.contains("autenticación"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_to_error(StatusCode::UNPROCESSABLE_ENTITY, String::new()),
            LoopError::Normalize(NormalizeError::NoMedicationsFound)
        ));
        assert!(matches!(
            status_to_error(StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()),
            LoopError::Normalize(NormalizeError::Internal(_))
        ));
        assert!(matches!(
            status_to_error(StatusCode::NOT_FOUND, String::new()),
            LoopError::Backend(_)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let backend = HttpBackend::new("http://127.0.0.1:1");
        assert!(matches!(backend.normalize("x").await, Err(LoopError::Backend(_))));
    }
}
