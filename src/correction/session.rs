use crate::error::LoopError;
use crate::model::{NormalizationOutcome, StockCheck};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Idle,
    Scanning,
    Normalizing,
    AwaitingCorrection,
    Validating,
}

impl LoopState {
    fn describe(self) -> &'static str {
        match self {
            LoopState::Idle => "idle",
            LoopState::Scanning => "scanning",
            LoopState::Normalizing => "normalizing",
            LoopState::AwaitingCorrection => "awaiting correction",
            LoopState::Validating => "validating",
        }
    }

    pub fn in_flight(self) -> bool {
        matches!(
            self,
            LoopState::Scanning | LoopState::Normalizing | LoopState::Validating
        )
    }
}

/// What the results panel currently shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResultsView {
    #[default]
    Empty,
    /// Suggestion from the normalization pipeline
    Normalized(NormalizationOutcome),
    /// Stock check of the user-corrected list
    Revalidated(Vec<StockCheck>),
}

/// Identifies one in-flight request; completions carrying an old ticket are
/// discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(pub(crate) u64);

/// Pure state machine behind the correction loop. Holds a single result
/// buffer, so at most one request may be in flight.
#[derive(Debug, Clone, Default)]
pub struct CorrectionSession {
    state: LoopState,
    raw_text: String,
    correction_text: String,
    view: ResultsView,
    last_error: Option<String>,
    generation: u64,
}

impl CorrectionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn correction_text(&self) -> &str {
        &self.correction_text
    }

    pub fn view(&self) -> &ResultsView {
        &self.view
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Manual editing is offered whenever nothing is in flight.
    pub fn can_edit_manually(&self) -> bool {
        !self.state().in_flight()
    }

    /// Replace the OCR text area.
    pub fn set_raw_text(&mut self, text: impl Into<String>) -> Result<(), LoopError> {
        self.require(LoopState::Idle, "edit the prescription text")?;
        self.raw_text = text.into();
        Ok(())
    }

    pub fn begin_scan(&mut self) -> Result<Ticket, LoopError> {
        self.require(LoopState::Idle, "scan an image")?;
        Ok(self.enter(LoopState::Scanning))
    }

    pub fn finish_scan(
        &mut self,
        ticket: Ticket,
        result: Result<String, LoopError>,
    ) -> Result<String, LoopError> {
        self.accept(ticket, LoopState::Scanning)?;
        self.state = LoopState::Idle;
        match result {
            Ok(text) => {
                self.raw_text = text.clone();
                Ok(text)
            }
            Err(e) => Err(self.record(e)),
        }
    }

    /// Start normalizing the current raw text; returns the text to send.
    pub fn begin_normalize(&mut self) -> Result<(Ticket, String), LoopError> {
        self.require(LoopState::Idle, "normalize")?;
        let text = self.raw_text.trim().to_string();
        if text.is_empty() {
            return Err(LoopError::EmptyText);
        }
        Ok((self.enter(LoopState::Normalizing), text))
    }

    pub fn finish_normalize(
        &mut self,
        ticket: Ticket,
        result: Result<NormalizationOutcome, LoopError>,
    ) -> Result<NormalizationOutcome, LoopError> {
        self.accept(ticket, LoopState::Normalizing)?;
        match result {
            Ok(outcome) => {
                self.state = LoopState::AwaitingCorrection;
                self.correction_text = outcome.normalized_names.join("\n");
                self.view = ResultsView::Normalized(outcome.clone());
                Ok(outcome)
            }
            Err(e) => {
                self.state = LoopState::Idle;
                Err(self.record(e))
            }
        }
    }

    /// Open the correction area without a suggestion, seeded with the raw
    /// text when nothing was suggested yet.
    pub fn open_manual_correction(&mut self) -> Result<(), LoopError> {
        self.require(LoopState::Idle, "open manual correction")?;
        if self.correction_text.trim().is_empty() {
            self.correction_text = split_entries(&self.raw_text).join("\n");
        }
        self.state = LoopState::AwaitingCorrection;
        Ok(())
    }

    pub fn edit(&mut self, text: impl Into<String>) -> Result<(), LoopError> {
        self.require(LoopState::AwaitingCorrection, "edit the correction")?;
        self.correction_text = text.into();
        Ok(())
    }

    /// Start validating the corrected text; returns the names to check.
    pub fn begin_validate(&mut self) -> Result<(Ticket, Vec<String>), LoopError> {
        self.require(LoopState::AwaitingCorrection, "validate corrections")?;
        let names = split_entries(&self.correction_text);
        if names.is_empty() {
            return Err(LoopError::EmptyText);
        }
        Ok((self.enter(LoopState::Validating), names))
    }

    pub fn finish_validate(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<StockCheck>, LoopError>,
    ) -> Result<Vec<StockCheck>, LoopError> {
        self.accept(ticket, LoopState::Validating)?;
        self.state = LoopState::Idle;
        match result {
            Ok(checks) => {
                self.view = ResultsView::Revalidated(checks.clone());
                Ok(checks)
            }
            Err(e) => Err(self.record(e)),
        }
    }

    /// Abandon whatever is in flight, or discard edits while awaiting
    /// correction. Returns to `Idle` in every case.
    pub fn cancel(&mut self) {
        match self.state() {
            LoopState::Idle => return,
            LoopState::AwaitingCorrection => self.correction_text.clear(),
            _ => {}
        }
        self.generation += 1;
        self.state = LoopState::Idle;
    }

    fn require(&self, expected: LoopState, action: &'static str) -> Result<(), LoopError> {
        let current = self.state();
        if current == expected {
            Ok(())
        } else if current.in_flight() {
            Err(LoopError::Busy)
        } else {
            Err(LoopError::InvalidState {
                action,
                state: current.describe(),
            })
        }
    }

    fn enter(&mut self, state: LoopState) -> Ticket {
        self.generation += 1;
        self.state = state;
        self.last_error = None;
        Ticket(self.generation)
    }

    fn accept(&self, ticket: Ticket, expected: LoopState) -> Result<(), LoopError> {
        if ticket.0 == self.generation && self.state() == expected {
            Ok(())
        } else {
            Err(LoopError::Cancelled)
        }
    }

    fn record(&mut self, error: LoopError) -> LoopError {
        self.last_error = Some(error.to_string());
        error
    }
}

/// Split free-form corrected text into one entry per line, comma, or period.
pub fn split_entries(text: &str) -> Vec<String> {
    text.split(['\n', ',', '.'])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
