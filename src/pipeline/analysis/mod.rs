//! Analysis backends: image (or OCR text) in, medicine record or typed failure out.
//!
//! Two interchangeable strategies implement `MedicineAnalyzer`:
//! - `GeminiVisionAnalyzer`: one multimodal call with the image itself
//! - `OcrTextAnalyzer`: local OCR, then a chat-completion call on the text
//!
//! `build_analyzer` picks one from configuration; nothing downstream knows
//! which strategy ran.

pub mod demo;
pub mod gemini;
pub mod ocr;
pub mod openai;
pub mod parser;
pub mod prompt;
pub mod transport;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AnalysisStrategy, ScanConfig};
use crate::models::MedicineRecord;
use crate::pipeline::capture::ImagePayload;

pub use gemini::GeminiVisionAnalyzer;
pub use ocr::{OcrEngine, OcrError, OcrTextAnalyzer, TesseractCli};
pub use openai::{OpenAiChatClient, TextCompletionClient};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("OCR produced no text")]
    ExtractionEmpty,

    #[error("Backend unreachable at {endpoint}: {detail}")]
    BackendUnreachable { endpoint: String, detail: String },

    #[error("Backend returned error (status {status}): {body}")]
    BackendStatus { status: u16, body: String },

    #[error("Malformed backend response: {0}")]
    ResponseMalformed(String),

    #[error("Credential {0} is not configured")]
    MissingCredential(&'static str),
}

/// Why a backend declined to produce a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    ImageIllegible,
}

impl RejectionReason {
    /// Literal message shown to the user.
    pub fn message(&self) -> &'static str {
        match self {
            Self::ImageIllegible => {
                "The image is not clear enough. Please take another photo with better \
                 lighting and focus on the medicine label."
            }
        }
    }
}

/// Where a successful record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Produced by the named backend.
    Backend(&'static str),
    /// Fixed demonstration data; never persisted.
    Demo,
}

/// Result of one analysis call.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Success {
        record: MedicineRecord,
        provenance: Provenance,
    },
    Rejected(RejectionReason),
    Failed(AnalysisError),
}

/// What a backend does when its credential is not configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCredentialPolicy {
    /// Emit the clearly-labelled placeholder record.
    #[default]
    UseDemoData,
    /// Emit `Failed(MissingCredential)`.
    Fail,
}

impl fmt::Display for MissingCredentialPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UseDemoData => write!(f, "use_demo_data"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

impl FromStr for MissingCredentialPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "use_demo_data" | "usedemodata" | "demo" => Ok(Self::UseDemoData),
            "fail" => Ok(Self::Fail),
            _ => Err(()),
        }
    }
}

impl MissingCredentialPolicy {
    /// Outcome for a backend whose credential is absent. Exactly one of
    /// placeholder record or failure, never both.
    pub fn resolve(self, credential: &'static str, backend: &'static str) -> AnalysisOutcome {
        tracing::warn!(backend, credential, policy = %self, "Backend credential missing");
        match self {
            Self::UseDemoData => AnalysisOutcome::Success {
                record: demo::placeholder_record(),
                provenance: Provenance::Demo,
            },
            Self::Fail => AnalysisOutcome::Failed(AnalysisError::MissingCredential(credential)),
        }
    }
}

/// Capability shared by every backend strategy.
#[async_trait]
pub trait MedicineAnalyzer: Send + Sync {
    /// Short backend name for logs and provenance.
    fn name(&self) -> &'static str;

    async fn analyze(&self, image: &ImagePayload) -> AnalysisOutcome;
}

/// Fold a backend call result into an outcome, routing a missing credential
/// through the configured policy.
pub(crate) fn settle(
    result: Result<AnalysisOutcome, AnalysisError>,
    policy: MissingCredentialPolicy,
    backend: &'static str,
) -> AnalysisOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(AnalysisError::MissingCredential(credential)) => policy.resolve(credential, backend),
        Err(e) => {
            tracing::warn!(backend, error = %e, "Analysis failed");
            AnalysisOutcome::Failed(e)
        }
    }
}

/// Build the analyzer selected by `config.strategy`.
pub fn build_analyzer(config: &ScanConfig) -> Result<Arc<dyn MedicineAnalyzer>, reqwest::Error> {
    let client = transport::http_client(config.http_timeout)?;
    let analyzer: Arc<dyn MedicineAnalyzer> = match config.strategy {
        AnalysisStrategy::Vision => Arc::new(GeminiVisionAnalyzer::new(
            client,
            &config.gemini,
            config.on_missing_credential,
        )),
        AnalysisStrategy::Ocr => Arc::new(OcrTextAnalyzer::new(
            Arc::new(TesseractCli::new(
                &config.ocr.binary,
                &config.ocr.lang,
                config.http_timeout,
            )),
            Arc::new(OpenAiChatClient::new(client, &config.llm)),
            config.on_missing_credential,
        )),
    };
    tracing::info!(
        strategy = %config.strategy,
        backend = analyzer.name(),
        on_missing_credential = %config.on_missing_credential,
        "Analysis backend ready"
    );
    Ok(analyzer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_policy_yields_placeholder_only() {
        let outcome = MissingCredentialPolicy::UseDemoData.resolve("GEMINI_API_KEY", "gemini");
        match outcome {
            AnalysisOutcome::Success { record, provenance } => {
                assert_eq!(provenance, Provenance::Demo);
                assert!(record.name.contains("Demo Mode"));
            }
            other => panic!("expected demo record, got {other:?}"),
        }
    }

    #[test]
    fn fail_policy_yields_failure_only() {
        let outcome = MissingCredentialPolicy::Fail.resolve("LLM_API_KEY", "openai");
        assert_eq!(
            outcome,
            AnalysisOutcome::Failed(AnalysisError::MissingCredential("LLM_API_KEY"))
        );
    }

    #[test]
    fn settle_passes_other_errors_through() {
        let outcome = settle(
            Err(AnalysisError::ResponseMalformed("bad".into())),
            MissingCredentialPolicy::UseDemoData,
            "gemini",
        );
        assert_eq!(
            outcome,
            AnalysisOutcome::Failed(AnalysisError::ResponseMalformed("bad".into()))
        );
    }

    #[test]
    fn settle_routes_missing_credential_through_policy() {
        let outcome = settle(
            Err(AnalysisError::MissingCredential("GEMINI_API_KEY")),
            MissingCredentialPolicy::Fail,
            "gemini",
        );
        assert!(matches!(
            outcome,
            AnalysisOutcome::Failed(AnalysisError::MissingCredential("GEMINI_API_KEY"))
        ));
    }

    #[test]
    fn policy_parses_config_values() {
        assert_eq!(
            "use_demo_data".parse::<MissingCredentialPolicy>(),
            Ok(MissingCredentialPolicy::UseDemoData)
        );
        assert_eq!(
            "FAIL".parse::<MissingCredentialPolicy>(),
            Ok(MissingCredentialPolicy::Fail)
        );
        assert!("sometimes".parse::<MissingCredentialPolicy>().is_err());
    }

    #[test]
    fn builds_selected_strategy() {
        let mut config = ScanConfig::default();
        assert_eq!(build_analyzer(&config).unwrap().name(), "gemini-vision");

        config.strategy = AnalysisStrategy::Ocr;
        assert_eq!(build_analyzer(&config).unwrap().name(), "ocr-text");
    }
}
