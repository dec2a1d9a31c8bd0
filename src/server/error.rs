use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde_json::json;

use crate::error::{CartError, NormalizeError, OcrError, StoreError};

/// HTTP-level errors, rendered as `{ "error": message }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    BadGateway(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status, self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<NormalizeError> for ApiError {
    fn from(err: NormalizeError) -> Self {
        let message = err.to_string();
        match err {
            NormalizeError::MissingInput => ApiError::BadRequest(message),
            NormalizeError::NoMedicationsFound => ApiError::Unprocessable(message),
            NormalizeError::ServiceUnavailable(_) => ApiError::ServiceUnavailable(message),
            NormalizeError::Internal(_) => ApiError::Internal(message),
        }
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ItemNotFound(_) => {
                ApiError::NotFound("Producto no encontrado en el carrito".to_string())
            }
            CartError::IncompleteProduct | CartError::EmptyCart => {
                ApiError::BadRequest(err.to_string())
            }
        }
    }
}

impl From<OcrError> for ApiError {
    fn from(err: OcrError) -> Self {
        match err {
            OcrError::NotConfigured => {
                ApiError::ServiceUnavailable("Servicio de OCR no configurado".to_string())
            }
            OcrError::InvalidImage(_) => ApiError::BadRequest("Imagen inválida".to_string()),
            OcrError::NoText => {
                ApiError::Unprocessable("No se detectó texto en la imagen".to_string())
            }
            OcrError::Api { .. } | OcrError::Request(_) => {
                error!("OCR service failed: {}", err);
                ApiError::BadGateway("Error al comunicarse con el servicio de OCR".to_string())
            }
            OcrError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        error!("Store lookup failed: {}", err);
        ApiError::Internal("Error en la base de datos".to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_normalize_errors_map_to_statuses() {
        let (status, json) = body_of(NormalizeError::MissingInput.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Falta el texto de la receta");

        let (status, _) = body_of(NormalizeError::NoMedicationsFound.into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, json) =
            body_of(NormalizeError::ServiceUnavailable("sin IA".to_string()).into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "sin IA");

        let (status, _) = body_of(NormalizeError::Internal("x".to_string()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_ocr_errors_map_to_statuses() {
        let (status, _) = body_of(OcrError::NotConfigured.into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let api = OcrError::Api {
            status: 403,
            body: "forbidden".to_string(),
        };
        let (status, json) = body_of(api.into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!json["error"].as_str().unwrap().contains("forbidden"));

        let (status, _) = body_of(OcrError::InvalidImage("bad".to_string()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_error_hides_details() {
        let (status, json) = body_of(StoreError::LockPoisoned.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Error en la base de datos");
    }
}
