pub mod cart;
pub mod config;
pub mod correction;
pub mod error;
pub mod extractors;
pub mod model;
pub mod ocr;
pub mod pipelines;
pub mod providers;
pub mod server;
pub mod store;

pub use cart::{CartItem, CartService, Order, ProductInput};
pub use config::{load_config, AppConfig, FallbackPolicy};
pub use correction::{
    CorrectionLoop, CorrectionSession, HttpBackend, LoopState, ResultsView, ScanBackend,
};
pub use error::{
    AppError, CartError, ExtractionError, LoopError, NormalizeError, OcrError, StoreError,
};
pub use model::{MedicationRecord, NormalizationOutcome, StockCheck, ValidationResult};
pub use ocr::{GoogleVisionOcr, OcrEngine};
pub use pipelines::{Normalizer, StockValidator};
pub use providers::{LlmProvider, ProviderFactory};
pub use server::{app_router, AppState};
pub use store::{InMemoryStore, MedicationStore, SqliteStore};
