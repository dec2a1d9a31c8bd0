use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::StoreError;
use crate::model::{MedicationRecord, StockCheck, ValidationResult};
use crate::store::MedicationStore;

const STORE_FAILURE_MESSAGE: &str = "Error en la base de datos";
const STORE_TIMEOUT_MESSAGE: &str = "Tiempo de espera agotado al consultar el stock";

/// Runs store lookups for a list of names with bounded concurrency.
///
/// Every name gets exactly one result, in input order. A failing or slow
/// lookup degrades to an error entry for that name only.
#[derive(Clone)]
pub struct StockValidator {
    store: Arc<dyn MedicationStore>,
    lookup_timeout: Duration,
    max_concurrent: usize,
}

impl StockValidator {
    pub fn new(store: Arc<dyn MedicationStore>, lookup_timeout: Duration, max_concurrent: usize) -> Self {
        StockValidator {
            store,
            lookup_timeout,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Single lookup on the blocking pool, bounded by the lookup timeout.
    pub async fn lookup(&self, fragment: &str) -> Result<Vec<MedicationRecord>, StoreError> {
        lookup_with_timeout(Arc::clone(&self.store), fragment.to_string(), self.lookup_timeout).await
    }

    pub async fn validate(&self, names: &[String]) -> Vec<ValidationResult> {
        if names.is_empty() {
            return Vec::new();
        }

        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for (index, name) in names.iter().cloned().enumerate() {
            let store = Arc::clone(&self.store);
            let permits = Arc::clone(&permits);
            let timeout = self.lookup_timeout;

            tasks.spawn(async move {
                // The semaphore is never closed, so acquisition only fails on shutdown
                let _permit = permits.acquire_owned().await.ok();
                let result = match lookup_with_timeout(store, name.clone(), timeout).await {
                    Ok(matches) => {
                        debug!("Lookup '{}': {} match(es)", name, matches.len());
                        ValidationResult::found(name, matches)
                    }
                    Err(StoreError::Timeout(elapsed)) => {
                        warn!("Lookup '{}' timed out after {:?}", name, elapsed);
                        ValidationResult::failed(name, STORE_TIMEOUT_MESSAGE)
                    }
                    Err(e) => {
                        warn!("Lookup '{}' failed: {}", name, e);
                        ValidationResult::failed(name, STORE_FAILURE_MESSAGE)
                    }
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<ValidationResult>> = vec![None; names.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!("Stock lookup task did not complete: {}", e),
            }
        }

        // Reassemble by index; a task that panicked still yields an entry
        slots
            .into_iter()
            .zip(names)
            .map(|(slot, name)| {
                slot.unwrap_or_else(|| ValidationResult::failed(name.clone(), STORE_FAILURE_MESSAGE))
            })
            .collect()
    }

    /// Purchase availability per name, as served by `/validar-stock`.
    pub async fn check(&self, names: &[String]) -> Vec<StockCheck> {
        self.validate(names).await.iter().map(StockCheck::from).collect()
    }
}

async fn lookup_with_timeout(
    store: Arc<dyn MedicationStore>,
    fragment: String,
    timeout: Duration,
) -> Result<Vec<MedicationRecord>, StoreError> {
    let task = tokio::task::spawn_blocking(move || store.lookup(&fragment));
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(StoreError::TaskFailed(join_error.to_string())),
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}
