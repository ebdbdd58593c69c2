pub mod analysis;
pub mod capture;
pub mod normalizer;
pub mod persistence;
pub mod scan;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use analysis::{AnalysisError, AnalysisOutcome, MedicineAnalyzer, MissingCredentialPolicy};
pub use capture::{CaptureError, CaptureSource, ImagePayload};
pub use normalizer::{normalize, FailurePolicy, Resolution, ScanErrorKind};
pub use persistence::{spawn_persist, PersistenceError, PersistenceSink};
pub use scan::{ScanPipeline, ScanReport};
pub use session::{Presenter, ScanSession, ScanState, SessionError};
