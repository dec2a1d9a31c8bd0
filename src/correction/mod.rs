//! Human-in-the-loop correction of a scanned prescription.
//!
//! [`CorrectionSession`] is the state machine; [`CorrectionLoop`] drives it
//! against a [`ScanBackend`] and an optional OCR engine, one request at a time.

mod backend;
mod session;

pub use backend::{HttpBackend, ScanBackend};
pub use session::{split_entries, CorrectionSession, LoopState, ResultsView, Ticket};

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use tokio::sync::watch;

use crate::error::{LoopError, OcrError};
use crate::model::{NormalizationOutcome, StockCheck};
use crate::ocr::OcrEngine;

pub struct CorrectionLoop {
    backend: Arc<dyn ScanBackend>,
    ocr: Option<Arc<dyn OcrEngine>>,
    session: Mutex<CorrectionSession>,
    cancelled: watch::Sender<u64>,
}

impl CorrectionLoop {
    pub fn new(backend: Arc<dyn ScanBackend>) -> Self {
        let (cancelled, _) = watch::channel(0);
        CorrectionLoop {
            backend,
            ocr: None,
            session: Mutex::new(CorrectionSession::new()),
            cancelled,
        }
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    /// Copy of the current session state.
    pub fn snapshot(&self) -> CorrectionSession {
        self.session().clone()
    }

    pub fn set_text(&self, text: impl Into<String>) -> Result<(), LoopError> {
        self.session().set_raw_text(text)
    }

    pub fn edit(&self, text: impl Into<String>) -> Result<(), LoopError> {
        self.session().edit(text)
    }

    pub fn open_manual_correction(&self) -> Result<(), LoopError> {
        self.session().open_manual_correction()
    }

    /// Recognize text in an image and make it the prescription text.
    pub async fn scan(&self, image: &[u8]) -> Result<String, LoopError> {
        let ticket = self.session().begin_scan()?;
        let result = match &self.ocr {
            Some(ocr) => {
                self.until_cancelled(ticket, async {
                    Ok(ocr.recognize(image).await?)
                })
                .await
            }
            None => Err(OcrError::NotConfigured.into()),
        };
        self.session().finish_scan(ticket, result)
    }

    /// Send the prescription text through normalization; on success the
    /// suggested names are loaded into the correction area.
    pub async fn normalize(&self) -> Result<NormalizationOutcome, LoopError> {
        let (ticket, text) = self.session().begin_normalize()?;
        info!("Correction loop: normalizing {} characters", text.len());
        let result = self
            .until_cancelled(ticket, self.backend.normalize(&text))
            .await;
        self.session().finish_normalize(ticket, result)
    }

    /// Check stock for the user-corrected list, skipping the LLM.
    pub async fn resubmit(&self) -> Result<Vec<StockCheck>, LoopError> {
        let (ticket, names) = self.session().begin_validate()?;
        info!("Correction loop: validating {} corrected name(s)", names.len());
        let result = self
            .until_cancelled(ticket, self.backend.validate(&names))
            .await;
        self.session().finish_validate(ticket, result)
    }

    /// Abandon the in-flight request, or discard unsent corrections.
    pub fn cancel(&self) {
        let mut session = self.session();
        session.cancel();
        self.cancelled.send_replace(session.generation());
        debug!("Correction loop cancelled at generation {}", session.generation());
    }

    async fn until_cancelled<T, F>(&self, ticket: Ticket, request: F) -> Result<T, LoopError>
    where
        F: Future<Output = Result<T, LoopError>>,
    {
        let mut cancelled = self.cancelled.subscribe();
        tokio::select! {
            result = request => result,
            _ = async { cancelled.wait_for(|generation| *generation >= ticket.0).await.map(|_| ()) } => {
                Err(LoopError::Cancelled)
            }
        }
    }

    // Never held across an await point.
    fn session(&self) -> MutexGuard<'_, CorrectionSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
