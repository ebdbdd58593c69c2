//! Vision-direct strategy: one `generateContent` call carrying the image.

use async_trait::async_trait;
use serde::Serialize;
use tracing::Instrument;

use super::parser::{parse_vision_payload, unwrap_gemini_envelope, VisionVerdict};
use super::prompt::VISION_PROMPT;
use super::transport::send_for_body;
use super::{
    settle, AnalysisError, AnalysisOutcome, MedicineAnalyzer, MissingCredentialPolicy, Provenance,
    RejectionReason,
};
use crate::config::GeminiConfig;
use crate::pipeline::capture::ImagePayload;

const BACKEND: &str = "gemini-vision";
const CREDENTIAL: &str = "GEMINI_API_KEY";

/// Gemini multimodal backend.
pub struct GeminiVisionAnalyzer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    on_missing_credential: MissingCredentialPolicy,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 2],
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    /// Base64 without any data-URL prefix.
    data: String,
}

/// Low temperature: extraction, not creativity.
#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 1024,
        }
    }
}

impl GeminiVisionAnalyzer {
    pub fn new(
        client: reqwest::Client,
        config: &GeminiConfig,
        on_missing_credential: MissingCredentialPolicy,
    ) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            on_missing_credential,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    /// Returns the generated text inside the envelope.
    async fn generate(&self, image: &ImagePayload) -> Result<String, AnalysisError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AnalysisError::MissingCredential(CREDENTIAL))?;

        let body = GenerateContentRequest {
            contents: [Content {
                parts: [
                    Part::Text {
                        text: VISION_PROMPT,
                    },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: image.mime_type(),
                            data: image.to_base64(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig::default(),
        };

        let endpoint = self.endpoint();
        let request = self
            .client
            .post(&endpoint)
            .query(&[("key", api_key)])
            .json(&body);

        let raw = send_for_body(request, &endpoint).await?;
        unwrap_gemini_envelope(&raw)
    }

    async fn analyze_inner(&self, image: &ImagePayload) -> Result<AnalysisOutcome, AnalysisError> {
        let text = self.generate(image).await?;
        Ok(match parse_vision_payload(&text)? {
            VisionVerdict::Clear(record) => AnalysisOutcome::Success {
                record,
                provenance: Provenance::Backend(BACKEND),
            },
            VisionVerdict::Illegible => {
                tracing::info!("Vision backend reported an illegible image");
                AnalysisOutcome::Rejected(RejectionReason::ImageIllegible)
            }
        })
    }
}

#[async_trait]
impl MedicineAnalyzer for GeminiVisionAnalyzer {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn analyze(&self, image: &ImagePayload) -> AnalysisOutcome {
        let span = tracing::info_span!(
            "gemini_vision",
            model = %self.model,
            image_size = image.len(),
            mime = %image.mime_type(),
        );
        async {
            let start = std::time::Instant::now();
            let outcome = settle(self.analyze_inner(image).await, self.on_missing_credential, BACKEND);
            tracing::debug!(elapsed_ms = %start.elapsed().as_millis(), "Vision analysis finished");
            outcome
        }
        .instrument(span)
        .await
    }
}
