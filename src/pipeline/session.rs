//! Scan cycle state machine driving a presenter.
//!
//! ```text
//! Idle ─start_capture→ Capturing ─submit_capture(Some)→ Analyzing ─→ Displaying | ErrorShown
//!                        ↑  └─ submit_capture(None): stays ─┘              │
//! Idle ←──────────────── back_to_home ─────────────────────────────────────┘
//! ```
//!
//! Only one scan can be in flight: a new capture is reachable only after
//! the previous cycle returned home. Dropping a `submit_capture` future
//! leaves the session in `Analyzing`; `back_to_home` recovers from there.

use thiserror::Error;

use super::capture::{CaptureError, CaptureSource, ImagePayload};
use super::normalizer::Resolution;
use super::scan::{ScanPipeline, ScanReport};
use crate::models::MedicineRecord;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },

    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanState {
    Idle,
    Capturing,
    Analyzing,
    Displaying(MedicineRecord),
    ErrorShown(String),
}

impl ScanState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Capturing => "capturing",
            Self::Analyzing => "analyzing",
            Self::Displaying(_) => "displaying",
            Self::ErrorShown(_) => "error_shown",
        }
    }
}

/// Presentation layer callbacks.
pub trait Presenter {
    fn set_analyzing(&mut self, analyzing: bool);
    fn show_record(&mut self, record: &MedicineRecord);
    fn show_error(&mut self, message: &str);
}

pub struct ScanSession<P: Presenter> {
    pipeline: ScanPipeline,
    presenter: P,
    state: ScanState,
}

impl<P: Presenter> ScanSession<P> {
    pub fn new(pipeline: ScanPipeline, presenter: P) -> Self {
        Self {
            pipeline,
            presenter,
            state: ScanState::Idle,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            state: self.state.label(),
            action,
        }
    }

    /// Open the capture screen.
    pub fn start_capture(&mut self) -> Result<(), SessionError> {
        if self.state != ScanState::Idle {
            return Err(self.invalid("start capture"));
        }
        self.state = ScanState::Capturing;
        Ok(())
    }

    /// Feed the captured image through the pipeline. `None` is a cancelled
    /// capture: nothing happens and the capture screen stays open.
    pub async fn submit_capture(
        &mut self,
        image: Option<ImagePayload>,
    ) -> Result<Option<ScanReport>, SessionError> {
        if self.state != ScanState::Capturing {
            return Err(self.invalid("submit a capture"));
        }
        let Some(image) = image else {
            tracing::debug!("Capture cancelled");
            return Ok(None);
        };

        self.state = ScanState::Analyzing;
        self.presenter.set_analyzing(true);
        let report = self.pipeline.run(&image).await;
        self.presenter.set_analyzing(false);

        self.state = match &report.resolution {
            Resolution::Display { record, .. } => {
                self.presenter.show_record(record);
                ScanState::Displaying(record.clone())
            }
            Resolution::ShowError { message, .. } => {
                self.presenter.show_error(message);
                ScanState::ErrorShown(message.clone())
            }
        };
        Ok(Some(report))
    }

    /// Pull one image from `source` and submit it.
    pub async fn capture_from(
        &mut self,
        source: &dyn CaptureSource,
    ) -> Result<Option<ScanReport>, SessionError> {
        if self.state != ScanState::Capturing {
            return Err(self.invalid("capture"));
        }
        let image = source.capture().await?;
        self.submit_capture(image).await
    }

    /// Discard the current result or capture screen. Reached in `Analyzing`
    /// only when the scan future was dropped; its result is abandoned.
    pub fn back_to_home(&mut self) -> Result<(), SessionError> {
        if self.state == ScanState::Analyzing {
            tracing::debug!("Abandoning pending analysis");
            self.presenter.set_analyzing(false);
        }
        self.state = ScanState::Idle;
        Ok(())
    }
}
