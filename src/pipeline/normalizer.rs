//! Result normalizer: decides what the user sees for an analysis outcome.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::analysis::{demo, AnalysisError, AnalysisOutcome, Provenance};
use crate::models::MedicineRecord;

/// What to do when analysis fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Show a retry-prompting message.
    #[default]
    ShowError,
    /// Show the labelled fallback record instead.
    UseDemoData,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShowError => write!(f, "show_error"),
            Self::UseDemoData => write!(f, "use_demo_data"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "show_error" | "showerror" | "error" => Ok(Self::ShowError),
            "use_demo_data" | "usedemodata" | "demo" => Ok(Self::UseDemoData),
            _ => Err(()),
        }
    }
}

/// User-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanErrorKind {
    ImageIllegible,
    ExtractionEmpty,
    BackendUnreachable,
    ResponseMalformed,
    MissingCredential,
}

impl ScanErrorKind {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ImageIllegible => "image_illegible",
            Self::ExtractionEmpty => "extraction_empty",
            Self::BackendUnreachable => "backend_unreachable",
            Self::ResponseMalformed => "response_malformed",
            Self::MissingCredential => "missing_credential",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ImageIllegible => {
                "The image is not clear enough. Please take another photo with better \
                 lighting and focus on the medicine label."
            }
            Self::ExtractionEmpty => {
                "Failed to extract text from the image. Please try again with the label \
                 in focus."
            }
            Self::ResponseMalformed => {
                "Failed to analyze the medicine. The response was not properly formatted. \
                 Please try again."
            }
            Self::BackendUnreachable | Self::MissingCredential => {
                "An error occurred while analyzing the medicine image. Please try again."
            }
        }
    }
}

impl From<&AnalysisError> for ScanErrorKind {
    fn from(e: &AnalysisError) -> Self {
        match e {
            AnalysisError::ExtractionEmpty => Self::ExtractionEmpty,
            AnalysisError::BackendUnreachable { .. } | AnalysisError::BackendStatus { .. } => {
                Self::BackendUnreachable
            }
            AnalysisError::ResponseMalformed(_) => Self::ResponseMalformed,
            AnalysisError::MissingCredential(_) => Self::MissingCredential,
        }
    }
}

/// What the presentation layer is told to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Display {
        record: MedicineRecord,
        /// False for demonstration records.
        persist: bool,
    },
    ShowError {
        kind: ScanErrorKind,
        message: String,
    },
}

impl Resolution {
    pub fn should_persist(&self) -> bool {
        matches!(self, Self::Display { persist: true, .. })
    }

    pub fn record(&self) -> Option<&MedicineRecord> {
        match self {
            Self::Display { record, .. } => Some(record),
            Self::ShowError { .. } => None,
        }
    }
}

/// Map an outcome to exactly one of: a record to display, or an error to show.
pub fn normalize(outcome: AnalysisOutcome, policy: FailurePolicy) -> Resolution {
    match outcome {
        AnalysisOutcome::Success { record, provenance } => Resolution::Display {
            persist: matches!(provenance, Provenance::Backend(_)),
            record,
        },
        AnalysisOutcome::Rejected(reason) => Resolution::ShowError {
            kind: ScanErrorKind::ImageIllegible,
            message: reason.message().to_string(),
        },
        AnalysisOutcome::Failed(error) => {
            let kind = ScanErrorKind::from(&error);
            match policy {
                FailurePolicy::ShowError => Resolution::ShowError {
                    kind,
                    message: kind.user_message().to_string(),
                },
                FailurePolicy::UseDemoData => {
                    tracing::info!(error = %error, "Substituting fallback record for failed analysis");
                    Resolution::Display {
                        record: demo::fallback_record(),
                        persist: false,
                    }
                }
            }
        }
    }
}
