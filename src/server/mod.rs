//! HTTP API for the storefront and the prescription scanner.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::SESSION_HEADER;

use std::path::Path;
use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::cart::CartService;
use crate::config::ServerConfig;
use crate::ocr::OcrEngine;
use crate::pipelines::Normalizer;

#[derive(Clone)]
pub struct AppState {
    pub normalizer: Arc<Normalizer>,
    pub carts: Arc<CartService>,
    pub ocr: Option<Arc<dyn OcrEngine>>,
}

impl AppState {
    pub fn new(normalizer: Normalizer) -> Self {
        AppState {
            normalizer: Arc::new(normalizer),
            carts: Arc::new(CartService::new()),
            ocr: None,
        }
    }

    pub fn with_carts(mut self, carts: CartService) -> Self {
        self.carts = Arc::new(carts);
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }
}

/// Build the application router. When `static_dir` is set, unmatched paths
/// are served from it.
pub fn app_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/validar-stock", post(handlers::validate_stock))
        .route("/normalizar-receta", post(handlers::normalize_prescription))
        .route("/escanear-receta", post(handlers::scan_prescription))
        .route("/api/medicamentos", get(handlers::search_medications))
        .route("/api/carrito", get(handlers::get_cart))
        .route("/api/carrito/agregar", post(handlers::add_to_cart))
        .route("/api/carrito/actualizar/:id", put(handlers::update_cart_item))
        .route("/api/carrito/eliminar/:id", delete(handlers::remove_cart_item))
        .route("/api/carrito/limpiar", delete(handlers::clear_cart))
        .route("/api/checkout", post(handlers::checkout));

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.with_state(state).layer(CorsLayer::permissive())
}

pub async fn serve(config: &ServerConfig, state: AppState) -> std::io::Result<()> {
    let app = app_router(state, config.static_dir.as_deref().map(Path::new));
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await
}
