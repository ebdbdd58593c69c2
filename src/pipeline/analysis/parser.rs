//! Response parsing: provider envelope → inner text → strict JSON → record.
//!
//! Envelope problems and inner-JSON problems are both `ResponseMalformed`, with
//! different messages; network failures never reach this module.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::AnalysisError;
use crate::models::{MedicineRecord, RawMedicine};

/// A single Markdown fence around the whole payload (```json ... ```).
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\A```[A-Za-z]*[ \t]*\r?\n?(.*?)\r?\n?```\z").unwrap());

/// Verdict of the vision backend.
#[derive(Debug, Clone, PartialEq)]
pub enum VisionVerdict {
    Clear(MedicineRecord),
    Illegible,
}

// ──────────────────────────────────────────────
// Envelopes
// ──────────────────────────────────────────────

/// `generateContent` response: `candidates[0].content.parts[0].text`.
#[derive(Deserialize)]
struct GeminiEnvelope {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

/// Chat-completions response: `choices[0].message.content`.
#[derive(Deserialize)]
struct ChatEnvelope {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub fn unwrap_gemini_envelope(body: &str) -> Result<String, AnalysisError> {
    let envelope: GeminiEnvelope = serde_json::from_str(body)
        .map_err(|e| AnalysisError::ResponseMalformed(format!("envelope is not JSON: {e}")))?;

    envelope
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| {
            AnalysisError::ResponseMalformed("envelope has no candidates[0].content.parts[0].text".into())
        })
}

pub fn unwrap_chat_envelope(body: &str) -> Result<String, AnalysisError> {
    let envelope: ChatEnvelope = serde_json::from_str(body)
        .map_err(|e| AnalysisError::ResponseMalformed(format!("envelope is not JSON: {e}")))?;

    envelope
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| {
            AnalysisError::ResponseMalformed("envelope has no choices[0].message.content".into())
        })
}

// ──────────────────────────────────────────────
// Inner payload
// ──────────────────────────────────────────────

/// Strip one enclosing code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    CODE_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str().trim())
}

fn parse_raw(inner: &str) -> Result<RawMedicine, AnalysisError> {
    serde_json::from_str(strip_code_fence(inner)).map_err(|e| {
        AnalysisError::ResponseMalformed(format!("generated text is not valid JSON: {e}"))
    })
}

/// Parse vision-backend output. The clarity gate is checked before any
/// other field: an unclear image is rejected whatever else came back.
pub fn parse_vision_payload(inner: &str) -> Result<VisionVerdict, AnalysisError> {
    let raw = parse_raw(inner)?;
    if raw.is_image_clear != Some(true) {
        return Ok(VisionVerdict::Illegible);
    }
    raw.into_record()
        .map(VisionVerdict::Clear)
        .map_err(|e| AnalysisError::ResponseMalformed(e.to_string()))
}

/// Parse text-backend output (no clarity flag).
pub fn parse_text_payload(inner: &str) -> Result<MedicineRecord, AnalysisError> {
    parse_raw(inner)?
        .into_record()
        .map_err(|e| AnalysisError::ResponseMalformed(e.to_string()))
}
