use std::env;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use recetascan::error::AppError;
use recetascan::ocr::OcrEngine;
use recetascan::server::{self, AppState};
use recetascan::store::MedicationStore;
use recetascan::{
    load_config, AppConfig, CartService, GoogleVisionOcr, Normalizer, ProviderFactory, SqliteStore,
};

const USAGE: &str = "recetascan [normalize <prescription.txt>]";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let config = load_config()?;

    match args.first().map(String::as_str) {
        None => run_server(&config).await,
        Some("normalize") => {
            let path = args.get(1).ok_or_else(|| AppError::Usage(USAGE.to_string()))?;
            normalize_file(&config, path).await
        }
        Some(_) => Err(AppError::Usage(USAGE.to_string())),
    }
}

fn open_store(config: &AppConfig) -> Result<Arc<dyn MedicationStore>, AppError> {
    let store = SqliteStore::open(&config.store.path)?;
    store.ensure_schema()?;
    if config.store.seed {
        store.seed_demo_catalog()?;
    }
    Ok(Arc::new(store))
}

fn build_normalizer(config: &AppConfig) -> Result<Normalizer, AppError> {
    let provider = ProviderFactory::create(&config.llm).map_err(AppError::Usage)?;
    if provider.is_none() {
        warn!("No LLM provider available; prescriptions will use keyword extraction");
    }
    Ok(Normalizer::from_config(config, provider, open_store(config)?))
}

async fn run_server(config: &AppConfig) -> Result<(), AppError> {
    let carts = CartService::with_idle_ttl(Duration::from_secs(config.server.cart_idle_ttl_secs));
    let mut state = AppState::new(build_normalizer(config)?).with_carts(carts);
    match GoogleVisionOcr::from_config(&config.ocr) {
        Some(ocr) => state = state.with_ocr(Arc::new(ocr) as Arc<dyn OcrEngine>),
        None => info!("OCR disabled: no Google Vision API key configured"),
    }

    server::serve(&config.server, state).await?;
    Ok(())
}

async fn normalize_file(config: &AppConfig, path: &str) -> Result<(), AppError> {
    let text = tokio::fs::read_to_string(path).await?;
    let outcome = build_normalizer(config)?.normalize(&text).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
