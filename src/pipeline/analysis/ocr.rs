//! Two-stage strategy: local OCR, then a text-only completion on the result.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::Instrument;

use super::openai::TextCompletionClient;
use super::parser::parse_text_payload;
use super::prompt::build_text_prompt;
use super::{
    settle, AnalysisError, AnalysisOutcome, MedicineAnalyzer, MissingCredentialPolicy, Provenance,
};
use crate::pipeline::capture::ImagePayload;

const BACKEND: &str = "ocr-text";

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to launch OCR engine `{binary}`: {source}")]
    Launch {
        binary: String,
        source: std::io::Error,
    },

    #[error("OCR engine exited with {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("OCR engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Image in, recognized text out.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn extract_text(&self, image: &ImagePayload) -> Result<String, OcrError>;
}

/// Runs the `tesseract` CLI, piping the image through stdin and reading
/// plain text from stdout. The process is killed once `timeout` elapses.
pub struct TesseractCli {
    binary: String,
    lang: String,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(binary: &str, lang: &str, timeout: Duration) -> Self {
        Self {
            binary: binary.to_string(),
            lang: lang.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn extract_text(&self, image: &ImagePayload) -> Result<String, OcrError> {
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", &self.lang])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| OcrError::Launch {
                binary: self.binary.clone(),
                source,
            })?;

        let mut stdin = child.stdin.take();
        let bytes = image.bytes();
        let write = async move {
            if let Some(stdin) = stdin.as_mut() {
                match stdin.write_all(bytes).await {
                    // The engine may stop reading early; its exit status decides.
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    other => other?,
                }
            }
            drop(stdin);
            Ok::<_, std::io::Error>(())
        };

        let run = async { tokio::try_join!(write, child.wait_with_output()) };
        let (_, output) = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| OcrError::Timeout(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(OcrError::Exit {
                code: output.status.code(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// OCR followed by a text completion. The completion is never requested when
/// OCR yields no text.
pub struct OcrTextAnalyzer {
    ocr: Arc<dyn OcrEngine>,
    llm: Arc<dyn TextCompletionClient>,
    on_missing_credential: MissingCredentialPolicy,
}

impl OcrTextAnalyzer {
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        llm: Arc<dyn TextCompletionClient>,
        on_missing_credential: MissingCredentialPolicy,
    ) -> Self {
        Self {
            ocr,
            llm,
            on_missing_credential,
        }
    }

    async fn analyze_inner(&self, image: &ImagePayload) -> Result<AnalysisOutcome, AnalysisError> {
        let text = match self.ocr.extract_text(image).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "OCR engine failed, treating as empty extraction");
                String::new()
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(AnalysisError::ExtractionEmpty);
        }
        tracing::debug!(chars = text.chars().count(), "OCR extracted text");

        let generated = self.llm.complete(&build_text_prompt(text)).await?;
        let record = parse_text_payload(&generated)?;
        Ok(AnalysisOutcome::Success {
            record,
            provenance: Provenance::Backend(BACKEND),
        })
    }
}

#[async_trait]
impl MedicineAnalyzer for OcrTextAnalyzer {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn analyze(&self, image: &ImagePayload) -> AnalysisOutcome {
        let span = tracing::info_span!("ocr_text", image_size = image.len());
        async {
            let result = self.analyze_inner(image).await;
            settle(result, self.on_missing_credential, BACKEND)
        }
        .instrument(span)
        .await
    }
}
