use std::time::Duration;

use thiserror::Error;

/// Errors raised by an LLM provider while extracting medication names
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// No credential was configured for the provider
    #[error("No API key configured for the LLM provider")]
    MissingCredentials,

    /// The provider rejected the credential (HTTP 401)
    #[error("LLM provider rejected the credential")]
    Unauthorized,

    /// The provider throttled the request (HTTP 429)
    #[error("LLM provider rate limit exceeded")]
    RateLimited,

    /// Any other non-success status
    #[error("LLM provider error ({status}): {body}")]
    ServiceError { status: u16, body: String },

    /// Success status, but the content is not a usable medication list
    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    /// Transport failure or timeout
    #[error("Network error talking to LLM provider: {0}")]
    NetworkError(String),
}

impl ExtractionError {
    /// Whether the failure came from the credential or the provider's quota,
    /// as opposed to the provider misbehaving.
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            ExtractionError::MissingCredentials
                | ExtractionError::Unauthorized
                | ExtractionError::RateLimited
        )
    }
}

impl From<reqwest::Error> for ExtractionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ExtractionError::MalformedResponse(err.to_string())
        } else {
            ExtractionError::NetworkError(err.to_string())
        }
    }
}

/// Errors raised by the medication store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store connection lock poisoned")]
    LockPoisoned,

    #[error("Lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("Lookup task failed: {0}")]
    TaskFailed(String),
}

/// Terminal conditions of a normalization request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// The request carried no prescription text
    #[error("Falta el texto de la receta")]
    MissingInput,

    /// The LLM could not be used and nothing could be recovered from the text
    #[error("{0}")]
    ServiceUnavailable(String),

    /// The LLM misbehaved and the active policy does not fall back
    #[error("{0}")]
    Internal(String),

    /// Extraction finished without a single usable name
    #[error("No se encontraron medicamentos válidos en el texto. Por favor, introdúzcalos manualmente.")]
    NoMedicationsFound,
}

/// Errors raised while recognizing text in a prescription image
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR service is not configured (missing GOOGLE_API_KEY)")]
    NotConfigured,

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("OCR request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("OCR API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("No text detected in image")]
    NoText,
}

/// Errors raised by the session cart
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("Datos incompletos del producto")]
    IncompleteProduct,

    #[error("Producto no encontrado en el carrito: {0}")]
    ItemNotFound(String),

    #[error("El carrito está vacío")]
    EmptyCart,
}

/// Errors that stop the application from starting or running
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Usage: {0}")]
    Usage(String),
}

/// Errors surfaced by the prescription correction loop
#[derive(Error, Debug)]
pub enum LoopError {
    /// A scan, normalization, or validation is already in flight
    #[error("Another request is already in progress")]
    Busy,

    /// The action is not allowed in the current state
    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    #[error("No hay texto para procesar")]
    EmptyText,

    /// The request was abandoned by `cancel()`; its result was discarded
    #[error("Request cancelled")]
    Cancelled,

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),

    /// The backend could not be reached or answered unexpectedly
    #[error("Backend error: {0}")]
    Backend(String),
}
