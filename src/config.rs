//! Runtime configuration: backend selection, credentials, fallback policies.
//!
//! Everything is read from the process environment (plus an optional `.env`
//! file). A missing credential is not a configuration error: each backend
//! handles it at call time according to `on_missing_credential`.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::analysis::MissingCredentialPolicy;
use crate::pipeline::normalizer::FailurePolicy;

/// Application-level constants
pub const APP_NAME: &str = "Medscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8787);
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SCAN_TABLE: &str = "medicines";
pub const DEFAULT_TESSERACT_BIN: &str = "tesseract";
pub const DEFAULT_TESSERACT_LANG: &str = "eng";

/// `EnvFilter` directive used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,medscan_lib=debug"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Which analysis backend handles a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStrategy {
    /// One multimodal call: image in, record out.
    #[default]
    Vision,
    /// Local OCR first, then a text-completion call on the extracted text.
    Ocr,
}

impl fmt::Display for AnalysisStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vision => write!(f, "vision"),
            Self::Ocr => write!(f, "ocr"),
        }
    }
}

impl FromStr for AnalysisStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vision" | "gemini" => Ok(Self::Vision),
            "ocr" | "ocr_text" | "two_stage" => Ok(Self::Ocr),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub table: String,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub binary: String,
    pub lang: String,
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub strategy: AnalysisStrategy,
    pub on_missing_credential: MissingCredentialPolicy,
    pub on_failure: FailurePolicy,
    pub gemini: GeminiConfig,
    pub llm: ChatConfig,
    pub supabase: SupabaseConfig,
    pub ocr: OcrConfig,
    pub bind_addr: SocketAddr,
    pub http_timeout: Duration,
}

impl ScanConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env file"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` delegates here; tests
    /// pass a map so they never touch the real environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        // Vite-era deployments used VITE_-prefixed names; accept both.
        let get_either = |key: &str| get(key).or_else(|| get(&format!("VITE_{key}")));

        let bind_addr = match get("MEDSCAN_BIND") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "MEDSCAN_BIND",
                value: raw,
            })?,
            None => DEFAULT_BIND_ADDR,
        };

        let http_timeout_secs = match get("MEDSCAN_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: "MEDSCAN_HTTP_TIMEOUT_SECS",
                value: raw,
            })?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            strategy: parse_or_default("MEDSCAN_STRATEGY", get("MEDSCAN_STRATEGY")),
            on_missing_credential: parse_or_default(
                "MEDSCAN_ON_MISSING_CREDENTIAL",
                get("MEDSCAN_ON_MISSING_CREDENTIAL"),
            ),
            on_failure: parse_or_default("MEDSCAN_ON_FAILURE", get("MEDSCAN_ON_FAILURE")),
            gemini: GeminiConfig {
                api_key: get_either("GEMINI_API_KEY"),
                base_url: get("GEMINI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            },
            llm: ChatConfig {
                api_key: get_either("LLM_API_KEY"),
                base_url: get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
                model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            },
            supabase: SupabaseConfig {
                url: get_either("SUPABASE_URL"),
                anon_key: get_either("SUPABASE_ANON_KEY"),
                table: get("SUPABASE_TABLE").unwrap_or_else(|| DEFAULT_SCAN_TABLE.to_string()),
            },
            ocr: OcrConfig {
                binary: get("TESSERACT_BIN").unwrap_or_else(|| DEFAULT_TESSERACT_BIN.to_string()),
                lang: get("TESSERACT_LANG").unwrap_or_else(|| DEFAULT_TESSERACT_LANG.to_string()),
            },
            bind_addr,
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            strategy: AnalysisStrategy::default(),
            on_missing_credential: MissingCredentialPolicy::default(),
            on_failure: FailurePolicy::default(),
            gemini: GeminiConfig {
                api_key: None,
                base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
                model: DEFAULT_GEMINI_MODEL.to_string(),
            },
            llm: ChatConfig {
                api_key: None,
                base_url: DEFAULT_LLM_BASE_URL.to_string(),
                model: DEFAULT_LLM_MODEL.to_string(),
            },
            supabase: SupabaseConfig {
                url: None,
                anon_key: None,
                table: DEFAULT_SCAN_TABLE.to_string(),
            },
            ocr: OcrConfig {
                binary: DEFAULT_TESSERACT_BIN.to_string(),
                lang: DEFAULT_TESSERACT_LANG.to_string(),
            },
            bind_addr: DEFAULT_BIND_ADDR,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

/// Parse an enum-valued setting, falling back to its default on bad input.
fn parse_or_default<T>(key: &str, raw: Option<String>) -> T
where
    T: FromStr + Default + fmt::Debug,
{
    let Some(raw) = raw else {
        return T::default();
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            let fallback = T::default();
            tracing::warn!(key, value = %raw, fallback = ?fallback, "Unrecognized setting, using default");
            fallback
        }
    }
}
